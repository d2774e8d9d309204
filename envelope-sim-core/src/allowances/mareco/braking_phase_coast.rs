use crate::envelope::{Envelope, EnvelopePart, EnvelopeProfile};
use crate::imports::*;
use crate::sim::overlays::coast_from_end;
use crate::sim::EnvelopeSimContext;

/// Braking phase, replaced by coasting down to `vf` before braking again
#[derive(Debug, Clone, PartialEq)]
pub struct BrakingPhaseCoast {
    /// where the braking curve reaches `vf`, or its end if it stays above
    end_pos: f64,
}

impl BrakingPhaseCoast {
    pub fn end_pos(&self) -> f64 {
        self.end_pos
    }

    pub fn compute(
        &self,
        base: &Envelope,
        context: &EnvelopeSimContext,
        vf: f64,
    ) -> EnvelopeResult<Option<EnvelopePart>> {
        coast_from_end(base, context, self.end_pos, vf)
    }

    /// Braking parts of the envelope starting above `vf`
    pub fn find_all(envelope: &Envelope, vf: f64) -> Vec<Self> {
        envelope
            .iter()
            .filter(|part| part.has_profile(EnvelopeProfile::Braking) && part.begin_speed() > vf)
            .map(|part| {
                let end_pos = if part.end_speed() >= vf {
                    part.end_pos()
                } else {
                    part.interpolate_position(vf).unwrap_or_else(|| part.end_pos())
                };
                Self { end_pos }
            })
            .collect()
    }
}
