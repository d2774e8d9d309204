//! Running time allowances: slow the train down over a region of an envelope so that
//! it runs in a longer target time.
//!
//! The region is split in user ranges, each range is split at stops in sections, and
//! each section is searched independently for the input of an [`AllowanceCore`] which
//! reaches the target time.

use crate::envelope::Envelope;
use crate::imports::*;
use crate::sim::{EnvelopeSimContext, RollingStock};

pub mod allowance;
pub mod iteration;
pub mod linear;
pub mod mareco;
pub mod range;
pub mod value;

pub use allowance::{Allowance, MAX_ITERATIONS};
pub use linear::LinearCore;
pub use mareco::MarecoCore;
pub use range::AllowanceRange;
pub use value::AllowanceValue;

/// How an allowance distributes the added time over a section
pub trait AllowanceCore {
    /// Slowed down envelope of a section for a given search input, without junctions
    /// to the imposed edge speeds. Running time decreases when the input increases.
    fn compute_core(
        &self,
        base: &Envelope,
        context: &EnvelopeSimContext,
        input: f64,
    ) -> EnvelopeResult<Envelope>;

    fn initial_low_bound(&self, section: &Envelope, capacity_speed_limit: f64) -> f64;

    fn initial_high_bound(&self, section: &Envelope, rolling_stock: &RollingStock) -> f64;
}

/// Allowance distribution algorithm
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllowanceDistribution {
    /// Energy saving distribution: coasting before braking and on accelerating slopes,
    /// with the max speed capped
    #[default]
    Mareco,
    /// All speeds scaled by the same factor
    Linear,
}

impl AllowanceDistribution {
    pub fn core(&self) -> &'static dyn AllowanceCore {
        match self {
            Self::Mareco => &MarecoCore,
            Self::Linear => &LinearCore,
        }
    }
}
