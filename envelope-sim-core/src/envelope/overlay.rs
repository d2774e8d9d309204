use super::{Envelope, EnvelopePart};
use crate::imports::*;

/// Replaces stretches of a base envelope with parts computed under it.
///
/// Each added part is spliced in place of the base over its own position range.
/// Parts are expected to be generated with the current envelope as a ceiling,
/// so that the result stays the lowest of both curves.
#[derive(Debug, Clone)]
pub struct OverlayEnvelopeBuilder {
    envelope: Envelope,
}

impl OverlayEnvelopeBuilder {
    pub fn new(base: Envelope) -> Self {
        Self { envelope: base }
    }

    /// The envelope with all parts added so far
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn add_part(&mut self, part: EnvelopePart) -> EnvelopeResult<()> {
        let begin = self.envelope.begin_pos();
        let end = self.envelope.end_pos();
        if part.begin_pos() < begin - POSITION_EPSILON || part.end_pos() > end + POSITION_EPSILON {
            return Err(EnvelopeError::InvalidPart(format!(
                "overlay [{}, {}] is out of the envelope [{begin}, {end}]",
                part.begin_pos(),
                part.end_pos()
            )));
        }
        let mut parts = self.envelope.slice(begin, part.begin_pos())?;
        let after = self.envelope.slice(part.end_pos(), end)?;
        parts.push(part);
        parts.extend(after);
        self.envelope = Envelope::new(parts)?;
        Ok(())
    }

    pub fn build(self) -> Envelope {
        self.envelope
    }
}
