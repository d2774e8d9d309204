//! Energy saving allowance distribution.
//!
//! For a target max speed `v1`, the envelope is capped at `v1`, then the train coasts
//! wherever it saves the most energy per second lost: before braking phases, and before
//! and on slopes where coasting accelerates the train. Coasting stops at `vf`, the speed
//! below which coasting costs more time than it saves energy compared to running at `v1`.

use super::AllowanceCore;
use crate::envelope::{
    Envelope, EnvelopePart, EnvelopeSpeedCap, OverlayEnvelopeBuilder, PhysicalMeaning,
};
use crate::imports::*;
use crate::sim::{EnvelopeSimContext, RollingStock};

pub mod accelerating_slope_coast;
pub mod braking_phase_coast;

pub use accelerating_slope_coast::AcceleratingSlopeCoast;
pub use braking_phase_coast::BrakingPhaseCoast;

/// Place where the train may coast, ending at a known position
#[derive(Debug, Clone, PartialEq)]
pub enum CoastingOpportunity {
    AcceleratingSlope(AcceleratingSlopeCoast),
    BrakingPhase(BrakingPhaseCoast),
}

impl CoastingOpportunity {
    /// Position where the coasting curve merges back into the envelope
    pub fn end_pos(&self) -> f64 {
        match self {
            Self::AcceleratingSlope(slope) => slope.end_pos(),
            Self::BrakingPhase(braking) => braking.end_pos(),
        }
    }

    /// Coasting curve of the opportunity, `None` if the train cannot coast there
    pub fn compute(
        &self,
        base: &Envelope,
        context: &EnvelopeSimContext,
        v1: f64,
        vf: f64,
    ) -> EnvelopeResult<Option<EnvelopePart>> {
        match self {
            Self::AcceleratingSlope(slope) => slope.compute(base, context, v1, vf),
            Self::BrakingPhase(braking) => braking.compute(base, context, vf),
        }
    }
}

/// Speed under which coasting stops being worth it, for a max speed `v1`
pub fn compute_vf(rolling_stock: &RollingStock, v1: f64) -> f64 {
    let wle = v1 * v1 * rolling_stock.rolling_resistance_deriv(v1);
    wle * v1 / (wle + rolling_stock.rolling_resistance(v1) * v1)
}

/// Search input is the max speed `v1`
#[derive(Debug, Clone, Copy, Default)]
pub struct MarecoCore;

impl AllowanceCore for MarecoCore {
    fn compute_core(
        &self,
        base: &Envelope,
        context: &EnvelopeSimContext,
        v1: f64,
    ) -> EnvelopeResult<Envelope> {
        let vf = compute_vf(&context.rolling_stock, v1);
        let capped = EnvelopeSpeedCap::from(base, PhysicalMeaning::MarecoSpeedLimit, v1)?;

        let mut opportunities: Vec<CoastingOpportunity> =
            AcceleratingSlopeCoast::find_all(&capped, context, vf)
                .into_iter()
                .map(CoastingOpportunity::AcceleratingSlope)
                .chain(
                    BrakingPhaseCoast::find_all(&capped, vf)
                        .into_iter()
                        .map(CoastingOpportunity::BrakingPhase),
                )
                .collect();
        opportunities.sort_by(|a, b| b.end_pos().total_cmp(&a.end_pos()));

        // from the end, skipping opportunities overlapping an already placed coasting curve
        let mut overlay = OverlayEnvelopeBuilder::new(capped.clone());
        let mut last_coast_begin = f64::INFINITY;
        for opportunity in &opportunities {
            if last_coast_begin < opportunity.end_pos() {
                continue;
            }
            let part = match opportunity.compute(&capped, context, v1, vf)? {
                Some(part) => part,
                None => continue,
            };
            // a coasting curve which could not merge back into the envelope is dropped
            let begin_speed = capped.interpolate_speed(part.begin_pos())?;
            if !are_speeds_equal(begin_speed, part.begin_speed()) {
                sim_debug!(
                    "coasting curve ending at {} does not join the envelope, skipped",
                    part.end_pos()
                );
                continue;
            }
            last_coast_begin = part.begin_pos();
            overlay.add_part(part)?;
        }

        let res = overlay.build();
        if !res.is_continuous() {
            return Err(EnvelopeError::discontinuity("MARECO core"));
        }
        Ok(res)
    }

    fn initial_low_bound(&self, _section: &Envelope, capacity_speed_limit: f64) -> f64 {
        capacity_speed_limit
    }

    fn initial_high_bound(&self, section: &Envelope, _rolling_stock: &RollingStock) -> f64 {
        section.max_speed() * 2.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::EnvelopeProfile;
    use crate::pipelines::{max_effort_envelope, max_speed_envelope, MaxSpeedProfile};
    use crate::testing::*;

    #[test]
    fn test_vf() {
        let rolling_stock = RollingStock::mock();
        let mut previous = 0.;
        for v1 in [5., 10., 20., 30., 40., 60.] {
            let vf = compute_vf(&rolling_stock, v1);
            assert!(vf > 0. && vf < v1);
            // the higher the max speed, the higher the coasting floor
            assert!(vf > previous);
            previous = vf;
        }
    }

    #[test]
    fn test_core_caps_and_coasts() {
        let context = flat_context(10_000.);
        let max_speed =
            max_speed_envelope::from(&context, &[10_000.], &MaxSpeedProfile::constant(10_000., 40.))
                .unwrap();
        let base = max_effort_envelope::from(&context, 0., &max_speed).unwrap();
        let core = MarecoCore.compute_core(&base, &context, 30.).unwrap();
        assert!(core.is_continuous());
        assert!(core.max_speed() <= 30. + SPEED_EPSILON);
        assert!(core
            .iter()
            .any(|part| part.has_profile(EnvelopeProfile::Coasting)));
        assert!(core.total_time() > base.total_time());
        assert_eq!(core.end_speed(), 0.);
    }

    #[test]
    fn test_core_time_decreases_with_v1() {
        let context = flat_context(10_000.);
        let max_speed =
            max_speed_envelope::from(&context, &[10_000.], &MaxSpeedProfile::constant(10_000., 40.))
                .unwrap();
        let base = max_effort_envelope::from(&context, 0., &max_speed).unwrap();
        let mut previous = f64::INFINITY;
        for v1 in [15., 20., 25., 30., 35.] {
            let time = MarecoCore.compute_core(&base, &context, v1).unwrap().total_time();
            assert!(time < previous);
            previous = time;
        }
    }

    #[test]
    fn test_bounds() {
        let section = envelope(vec![constant_part(0., 1000., 20.)]);
        assert_eq!(MarecoCore.initial_low_bound(&section, 5.), 5.);
        assert_eq!(
            MarecoCore.initial_high_bound(&section, &RollingStock::mock()),
            40.
        );
    }
}
