pub use crate::allowances::{
    Allowance, AllowanceDistribution, AllowanceRange, AllowanceValue, LinearCore, MarecoCore,
};
pub use crate::envelope::{
    Envelope, EnvelopeAttrs, EnvelopePart, EnvelopePoint, EnvelopeProfile, PhysicalMeaning,
};
pub use crate::error::{AllowanceLocation, ConvergenceError, EnvelopeError, EnvelopeResult};
pub use crate::pipelines::{max_effort_envelope, max_speed_envelope, MaxSpeedProfile, SpeedRange};
pub use crate::scenario::{Scenario, ScenarioOutput, ScenarioSummary};
pub use crate::search::DoubleBinarySearch;
pub use crate::sim::{
    EnvelopeSimContext, EnvelopeSimPath, GammaType, RollingStock, TractiveEffortPoint,
};
pub use crate::traits::{init_validated, SerdeAPI};
pub use crate::validate::ObjState;
