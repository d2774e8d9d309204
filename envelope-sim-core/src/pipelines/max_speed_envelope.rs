//! Stage 1: the fastest curve allowed by speed limits, braking capability and stops.

use crate::envelope::{
    ConstrainedEnvelopePartBuilder, Envelope, EnvelopeAttrs, EnvelopeCursor, EnvelopePart,
    EnvelopePartBuilder, EnvelopePartConstraint, EnvelopeProfile, OverlayEnvelopeBuilder,
    PhysicalMeaning,
};
use crate::imports::*;
use crate::sim::{overlays, EnvelopeSimContext};

/// A speed limit over `[begin, end]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedRange {
    /// m
    pub begin: f64,
    /// m
    pub end: f64,
    /// m/s
    pub speed: f64,
}

impl ObjState for SpeedRange {
    fn validate(&self) -> ValidationResults {
        let mut errors = ValidationErrors::new();
        chk_num_gez_fin(&mut errors, self.begin, "Begin");
        chk_num_gtz_fin(&mut errors, self.speed, "Speed");
        if !(self.end > self.begin) {
            errors.push(anyhow!(
                "Speed range end {} must be after its begin {}",
                self.end,
                self.begin
            ));
        }
        errors.make_err()
    }
}

/// Most restrictive speed profile along the path, as contiguous speed ranges
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaxSpeedProfile {
    pub ranges: Vec<SpeedRange>,
}

impl SerdeAPI for MaxSpeedProfile {
    fn init(&mut self) -> anyhow::Result<()> {
        init_validated(self)
    }
}

impl ObjState for MaxSpeedProfile {
    fn validate(&self) -> ValidationResults {
        let mut errors = ValidationErrors::new();
        if self.ranges.is_empty() {
            errors.push(anyhow!("Max speed profile must have at least one range"));
        }
        validate_slice(&mut errors, &self.ranges, "Speed range");
        early_err!(errors, "Max speed profile");
        if self.ranges[0].begin != 0. {
            errors.push(anyhow!(
                "Max speed profile must begin at 0, begins at {}",
                self.ranges[0].begin
            ));
        }
        for pair in self.ranges.windows(2) {
            if !are_positions_equal(pair[0].end, pair[1].begin) {
                errors.push(anyhow!(
                    "Speed ranges must be contiguous, a range ends at {} and the next begins at {}",
                    pair[0].end,
                    pair[1].begin
                ));
            }
        }
        errors.make_err()
    }
}

impl MaxSpeedProfile {
    /// A single speed limit over `[0, length]`
    pub fn constant(length: f64, speed: f64) -> Self {
        Self {
            ranges: vec![SpeedRange {
                begin: 0.,
                end: length,
                speed,
            }],
        }
    }

    pub fn end_pos(&self) -> f64 {
        self.ranges.last().map_or(0., |range| range.end)
    }

    /// Constant speed envelope of the profile, capped at `max_speed`
    pub fn to_envelope(&self, max_speed: f64) -> EnvelopeResult<Envelope> {
        let attrs =
            EnvelopeAttrs::new(EnvelopeProfile::ConstantSpeed).with_meaning(PhysicalMeaning::SpeedLimit);
        let parts = self
            .ranges
            .iter()
            .map(|range| EnvelopePart::constant(attrs, range.begin, range.end, range.speed.min(max_speed)))
            .collect::<EnvelopeResult<Vec<_>>>()?;
        Envelope::new(parts)
    }
}

fn braking_builder(meaning: PhysicalMeaning) -> EnvelopePartBuilder {
    let mut builder = EnvelopePartBuilder::new();
    builder.set_profile(EnvelopeProfile::Braking);
    builder.set_meaning(meaning);
    builder
}

/// Brakes backward from `(position, speed)` under the current envelope and overlays the curve on it
fn add_braking_curve(
    context: &EnvelopeSimContext,
    overlay: &mut OverlayEnvelopeBuilder,
    position: f64,
    speed: f64,
    meaning: PhysicalMeaning,
) -> EnvelopeResult<()> {
    let part = {
        let ceiling = overlay.envelope();
        let mut builder = ConstrainedEnvelopePartBuilder::new(
            braking_builder(meaning),
            vec![
                EnvelopePartConstraint::SpeedFloor(0.),
                EnvelopePartConstraint::ceiling(ceiling),
            ],
        );
        overlays::decelerate(context, position, speed, &mut builder, -1.);
        builder.build()?
    };
    if let Some(part) = part {
        overlay.add_part(part)?;
    }
    Ok(())
}

/// Builds the max speed envelope: the speed profile capped at the rolling stock max
/// speed, with braking curves before each speed reduction and each stop.
///
/// # Arguments
///
/// * `context` - rolling stock, path and time step
/// * `stops` - positions at which the train must stop, including the end of the path if required
/// * `profile` - speed limits along the path
pub fn from(
    context: &EnvelopeSimContext,
    stops: &[f64],
    profile: &MaxSpeedProfile,
) -> EnvelopeResult<Envelope> {
    let speed_limits = profile.to_envelope(context.rolling_stock.max_speed)?;
    let mut overlay = OverlayEnvelopeBuilder::new(speed_limits.clone());

    // speed reductions, from the end of the path
    let mut cursor = EnvelopeCursor::backward(&speed_limits);
    while cursor.find_part_transition(|_, speed, _, previous_speed| previous_speed > speed) {
        let (position, speed) = (cursor.position(), cursor.speed());
        sim_debug!("braking curve for the speed reduction at {position} to {speed}");
        add_braking_curve(context, &mut overlay, position, speed, PhysicalMeaning::SpeedLimit)?;
        if !cursor.next_part() {
            break;
        }
    }

    // stops, from the end of the path
    let mut stops = stops.to_vec();
    stops.sort_by(|a, b| b.total_cmp(a));
    for stop in stops {
        if stop < speed_limits.begin_pos() - POSITION_EPSILON
            || stop > speed_limits.end_pos() + POSITION_EPSILON
        {
            return Err(EnvelopeError::InvalidPart(format!(
                "stop at {stop} is outside the path [{}, {}]",
                speed_limits.begin_pos(),
                speed_limits.end_pos()
            )));
        }
        if stop <= speed_limits.begin_pos() {
            continue;
        }
        sim_debug!("braking curve for the stop at {stop}");
        add_braking_curve(context, &mut overlay, stop, 0., PhysicalMeaning::Stop)?;
    }
    Ok(overlay.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use crate::utils::almost_eq;

    impl Cases for MaxSpeedProfile {
        fn real_cases() -> Vec<Self> {
            vec![
                MaxSpeedProfile::constant(1000., 30.),
                MaxSpeedProfile {
                    ranges: vec![
                        SpeedRange { begin: 0., end: 500., speed: 30. },
                        SpeedRange { begin: 500., end: 1000., speed: 10. },
                    ],
                },
            ]
        }
        fn invalid_cases() -> Vec<Self> {
            vec![
                MaxSpeedProfile::default(),
                MaxSpeedProfile {
                    ranges: vec![
                        SpeedRange { begin: 0., end: 500., speed: 30. },
                        SpeedRange { begin: 600., end: 1000., speed: 10. },
                    ],
                },
                MaxSpeedProfile::constant(1000., 0.),
            ]
        }
    }

    #[test]
    fn test_profile_cases() {
        test_cases::<MaxSpeedProfile>();
    }

    #[test]
    fn test_capped_by_rolling_stock() {
        let context = flat_context(10_000.);
        let envelope = from(&context, &[], &MaxSpeedProfile::constant(10_000., 100.)).unwrap();
        assert_eq!(envelope.len(), 1);
        assert_eq!(envelope.max_speed(), context.rolling_stock.max_speed);
    }

    #[test]
    fn test_stop_braking_curve() {
        let context = flat_context(10_000.);
        let envelope = from(&context, &[10_000.], &MaxSpeedProfile::constant(10_000., 30.)).unwrap();
        assert_eq!(envelope.len(), 2);
        assert!(envelope.is_continuous());
        let braking = envelope.get(1);
        assert!(braking.has_profile(EnvelopeProfile::Braking));
        assert!(braking.has_meaning(PhysicalMeaning::Stop));
        assert_eq!(braking.end_speed(), 0.);
        // constant deceleration of 0.5 m/s²
        assert!(almost_eq(braking.begin_pos(), 10_000. - 900., Some(1e-6)));
    }

    #[test]
    fn test_speed_reduction() {
        let context = flat_context(10_000.);
        let profile = MaxSpeedProfile {
            ranges: vec![
                SpeedRange { begin: 0., end: 5_000., speed: 30. },
                SpeedRange { begin: 5_000., end: 8_000., speed: 10. },
                SpeedRange { begin: 8_000., end: 10_000., speed: 20. },
            ],
        };
        let envelope = from(&context, &[], &profile).unwrap();
        // the speed increase at 8 km stays a jump
        assert!(!envelope.is_continuous());
        assert!(almost_eq(
            envelope.interpolate_speed_left_dir(5_000., 1.),
            10.,
            Some(1e-9)
        ));
        assert!(almost_eq(
            envelope.interpolate_speed_left_dir(5_000. - 800., 1.),
            30.,
            Some(1e-6)
        ));
        assert!(envelope.interpolate_speed_left_dir(4_500., 1.) < 30.);
        assert_eq!(envelope.interpolate_speed_right_dir(8_000., 1.), 20.);
    }

    #[test]
    fn test_stop_out_of_path() {
        let context = flat_context(1_000.);
        assert!(from(&context, &[2_000.], &MaxSpeedProfile::constant(1_000., 30.)).is_err());
    }
}
