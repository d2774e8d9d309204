//! A complete simulation input: train, path, speed limits, stops and an optional allowance.

use crate::allowances::Allowance;
use crate::envelope::Envelope;
use crate::imports::*;
use crate::pipelines::{max_effort_envelope, max_speed_envelope, MaxSpeedProfile};
use crate::sim::{EnvelopeSimContext, EnvelopeSimPath, RollingStock};

fn default_time_step() -> f64 {
    2.
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    pub rolling_stock: RollingStock,
    pub path: EnvelopeSimPath,
    pub speed_profile: MaxSpeedProfile,
    /// Positions where the train stops, m. Add the path length to stop at the end.
    #[serde(default)]
    pub stops: Vec<f64>,
    /// m/s
    #[serde(default)]
    pub initial_speed: f64,
    /// Integration time step, s
    #[serde(default = "default_time_step")]
    pub time_step: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowance: Option<Allowance>,
}

impl SerdeAPI for Scenario {
    fn init(&mut self) -> anyhow::Result<()> {
        self.rolling_stock.init()?;
        self.path.init()?;
        self.speed_profile.init()?;
        if let Some(allowance) = self.allowance.as_mut() {
            allowance.init()?;
        }
        init_validated(self)
    }
}

impl ObjState for Scenario {
    fn validate(&self) -> ValidationResults {
        let mut errors = ValidationErrors::new();
        validate_field(&mut errors, &self.rolling_stock, "Rolling stock");
        validate_field(&mut errors, &self.path, "Path");
        validate_field(&mut errors, &self.speed_profile, "Speed profile");
        if let Some(allowance) = &self.allowance {
            validate_field(&mut errors, allowance, "Allowance");
        }
        chk_num_gez_fin(&mut errors, self.initial_speed, "Initial speed");
        chk_num_gtz_fin(&mut errors, self.time_step, "Time step");
        early_err!(errors, "Scenario");

        let length = self.path.length();
        if !are_positions_equal(self.speed_profile.end_pos(), length) {
            errors.push(anyhow!(
                "Speed profile ends at {} but the path is {} long",
                self.speed_profile.end_pos(),
                length
            ));
        }
        for stop in &self.stops {
            if !(*stop >= 0. && *stop <= length) {
                errors.push(anyhow!("Stop at {stop} is outside the path [0, {length}]"));
            }
        }
        if let Some(allowance) = &self.allowance {
            if allowance.end_pos > length + POSITION_EPSILON {
                errors.push(anyhow!(
                    "Allowance ends at {} but the path is {} long",
                    allowance.end_pos,
                    length
                ));
            }
        }
        errors.make_err()
    }
}

/// Envelopes computed for a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutput {
    /// fastest curve allowed by the speed limits and stops
    pub max_speed: Envelope,
    /// fastest curve the train can run
    pub max_effort: Envelope,
    /// max effort curve with the allowance applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_allowance: Option<Envelope>,
    /// total time the allowance aims at, s
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_time: Option<f64>,
}

impl SerdeAPI for ScenarioOutput {}

impl ScenarioOutput {
    /// The envelope the train actually runs
    pub fn final_envelope(&self) -> &Envelope {
        self.with_allowance.as_ref().unwrap_or(&self.max_effort)
    }

    pub fn summary(&self, name: &str) -> ScenarioSummary {
        let envelope = self.final_envelope();
        ScenarioSummary {
            name: name.to_string(),
            distance: envelope.total_distance(),
            base_time: self.max_effort.total_time(),
            target_time: self.target_time,
            total_time: envelope.total_time(),
            max_speed: envelope.max_speed(),
        }
    }
}

/// One line of a batch report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSummary {
    pub name: String,
    /// m
    pub distance: f64,
    /// running time without allowance, s
    pub base_time: f64,
    /// s
    pub target_time: Option<f64>,
    /// s
    pub total_time: f64,
    /// m/s
    pub max_speed: f64,
}

impl Scenario {
    pub fn context(&self) -> anyhow::Result<EnvelopeSimContext> {
        EnvelopeSimContext::new(self.rolling_stock.clone(), self.path.clone(), self.time_step)
            .with_context(|| format!("Invalid simulation context in scenario {:?}", self.name))
    }

    /// Builds the max speed and max effort envelopes, then applies the allowance if any
    pub fn simulate(&self, context: &EnvelopeSimContext) -> EnvelopeResult<ScenarioOutput> {
        let max_speed = max_speed_envelope::from(context, &self.stops, &self.speed_profile)?;
        let max_effort = max_effort_envelope::from(context, self.initial_speed, &max_speed)?;
        let (with_allowance, target_time) = match &self.allowance {
            Some(allowance) => (
                Some(allowance.apply(&max_effort, context)?),
                Some(allowance.target_time(&max_effort)?),
            ),
            None => (None, None),
        };
        Ok(ScenarioOutput {
            max_speed,
            max_effort,
            with_allowance,
            target_time,
        })
    }

    pub fn run(&self) -> anyhow::Result<ScenarioOutput> {
        let context = self.context()?;
        self.simulate(&context)
            .with_context(|| format!("Scenario {:?} failed", self.name))
    }

    /// The mock train on a flat path, limited to `speed` and stopping at the end
    pub fn flat(length: f64, speed: f64) -> anyhow::Result<Self> {
        let scenario = Self {
            name: format!("flat {length} m"),
            rolling_stock: RollingStock::mock(),
            path: EnvelopeSimPath::flat(length)?,
            speed_profile: MaxSpeedProfile::constant(length, speed),
            stops: vec![length],
            initial_speed: 0.,
            time_step: default_time_step(),
            allowance: None,
        };
        init_validated(&scenario)?;
        Ok(scenario)
    }
}
