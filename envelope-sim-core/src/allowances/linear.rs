use super::AllowanceCore;
use crate::envelope::{Envelope, EnvelopePart};
use crate::imports::*;
use crate::sim::{EnvelopeSimContext, RollingStock};

/// Scales every speed of the section by the same ratio, the search input
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearCore;

impl AllowanceCore for LinearCore {
    fn compute_core(
        &self,
        base: &Envelope,
        _context: &EnvelopeSimContext,
        ratio: f64,
    ) -> EnvelopeResult<Envelope> {
        let parts = base
            .iter()
            .map(|part| {
                EnvelopePart::generate_times(
                    *part.attrs(),
                    part.positions().to_vec(),
                    part.speeds().iter().map(|speed| speed * ratio).collect(),
                )
            })
            .collect::<EnvelopeResult<Vec<_>>>()?;
        Envelope::new(parts)
    }

    fn initial_low_bound(&self, section: &Envelope, capacity_speed_limit: f64) -> f64 {
        capacity_speed_limit / section.max_speed()
    }

    fn initial_high_bound(&self, _section: &Envelope, _rolling_stock: &RollingStock) -> f64 {
        1.
    }
}
