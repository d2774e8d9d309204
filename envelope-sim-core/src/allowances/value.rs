use crate::imports::*;

/// Amount of running time an allowance adds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "value_type")]
pub enum AllowanceValue {
    /// Constant added time, s
    FixedTime { seconds: f64 },
    /// Share of the base running time, %
    Percentage { percentage: f64 },
    /// Added time per distance, min / 100 km
    TimePerDistance { minutes: f64 },
}

impl ObjState for AllowanceValue {
    fn validate(&self) -> ValidationResults {
        let mut errors = ValidationErrors::new();
        match self {
            Self::FixedTime { seconds } => chk_num_gez_fin(&mut errors, *seconds, "Fixed time"),
            Self::Percentage { percentage } => {
                chk_num_gez_fin(&mut errors, *percentage, "Percentage")
            }
            Self::TimePerDistance { minutes } => {
                chk_num_gez_fin(&mut errors, *minutes, "Time per distance")
            }
        }
        errors.make_err()
    }
}

impl AllowanceValue {
    /// Added time, s
    ///
    /// # Arguments
    ///
    /// * `base_time` - running time without the allowance, s
    /// * `distance` - distance the allowance applies to, m
    pub fn allowance_time(&self, base_time: f64, distance: f64) -> f64 {
        match self {
            Self::FixedTime { seconds } => *seconds,
            Self::Percentage { percentage } => base_time * percentage / 100.,
            Self::TimePerDistance { minutes } => distance / 100_000. * minutes * 60.,
        }
    }

    /// Added time as a share of the base time
    pub fn allowance_ratio(&self, base_time: f64, distance: f64) -> f64 {
        self.allowance_time(base_time, distance) / base_time
    }

    /// Share of the added time a section receives. Fixed and percentage values are
    /// distributed by running time, time per distance values by distance.
    pub fn section_ratio(
        &self,
        section_time: f64,
        base_time: f64,
        section_distance: f64,
        base_distance: f64,
    ) -> f64 {
        match self {
            Self::FixedTime { .. } | Self::Percentage { .. } => section_time / base_time,
            Self::TimePerDistance { .. } => section_distance / base_distance,
        }
    }
}
