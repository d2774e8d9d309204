use super::attrs::{EnvelopeAttrs, EnvelopeProfile, PhysicalMeaning};
use super::builder::{EnvelopePartBuilder, StepConsumer};
use super::{Envelope, EnvelopePart};
use crate::imports::*;

/// Clips an envelope at a constant speed. Capped stretches become constant speed
/// parts tagged with the given meaning, merged across part transitions.
pub struct EnvelopeSpeedCap;

/// Stretch of the envelope being copied
enum Stretch {
    /// a piece of a base part, below the cap
    Base(EnvelopePartBuilder),
    /// a capped stretch starting at this position
    Capped(f64),
}

impl EnvelopeSpeedCap {
    pub fn from(
        envelope: &Envelope,
        meaning: PhysicalMeaning,
        speed: f64,
    ) -> EnvelopeResult<Envelope> {
        let capped_attrs = EnvelopeAttrs::new(EnvelopeProfile::ConstantSpeed).with_meaning(meaning);
        let mut parts: Vec<EnvelopePart> = vec![];
        let mut stretch: Option<Stretch> = None;

        let flush = |stretch: Option<Stretch>, end: f64, parts: &mut Vec<EnvelopePart>| {
            match stretch {
                Some(Stretch::Base(builder)) if !builder.is_empty() => parts.push(builder.build()?),
                Some(Stretch::Capped(begin)) if end > begin => {
                    parts.push(EnvelopePart::constant(capped_attrs, begin, end, speed)?)
                }
                _ => {}
            }
            Ok::<(), EnvelopeError>(())
        };

        for part in envelope {
            let base_builder = |position: f64, point_speed: f64| {
                let mut builder = EnvelopePartBuilder::new();
                builder.set_attrs(*part.attrs());
                builder.init_envelope_part(position, point_speed, 1.);
                Stretch::Base(builder)
            };
            for step_index in 0..part.step_count() {
                let step = part.step(step_index);
                let begin_capped = step.begin_speed > speed;
                let end_capped = step.end_speed > speed;
                match (begin_capped, end_capped) {
                    (false, false) => {
                        if !matches!(stretch, Some(Stretch::Base(_))) {
                            flush(stretch.take(), step.begin_pos, &mut parts)?;
                            stretch = Some(base_builder(step.begin_pos, step.begin_speed));
                        }
                        if let Some(Stretch::Base(builder)) = stretch.as_mut() {
                            builder.add_step_with_time(
                                step.end_pos,
                                step.end_speed,
                                part.step_time(step_index),
                            );
                        }
                    }
                    (true, true) => {
                        if !matches!(stretch, Some(Stretch::Capped(_))) {
                            flush(stretch.take(), step.begin_pos, &mut parts)?;
                            stretch = Some(Stretch::Capped(step.begin_pos));
                        }
                    }
                    (false, true) => {
                        // the step goes over the cap
                        let crossing = step.intersect_speed(speed);
                        if !matches!(stretch, Some(Stretch::Base(_))) {
                            flush(stretch.take(), step.begin_pos, &mut parts)?;
                            stretch = Some(base_builder(step.begin_pos, step.begin_speed));
                        }
                        if let Some(Stretch::Base(builder)) = stretch.as_mut() {
                            if crossing > step.begin_pos {
                                builder.add_step(crossing, speed);
                            }
                        }
                        flush(stretch.take(), crossing, &mut parts)?;
                        stretch = Some(Stretch::Capped(crossing));
                    }
                    (true, false) => {
                        // the step goes back under the cap
                        let crossing = step.intersect_speed(speed);
                        if !matches!(stretch, Some(Stretch::Capped(_))) {
                            flush(stretch.take(), step.begin_pos, &mut parts)?;
                            stretch = Some(Stretch::Capped(step.begin_pos));
                        }
                        flush(stretch.take(), crossing, &mut parts)?;
                        let mut builder = base_builder(crossing, speed);
                        if let Stretch::Base(builder) = &mut builder {
                            if step.end_pos > crossing {
                                builder.add_step(step.end_pos, step.end_speed);
                            }
                        }
                        stretch = Some(builder);
                    }
                }
            }
            // base stretches do not span part transitions
            if let Some(Stretch::Base(_)) = stretch {
                flush(stretch.take(), part.end_pos(), &mut parts)?;
            }
        }
        flush(stretch.take(), envelope.end_pos(), &mut parts)?;
        Envelope::new(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use crate::utils::almost_eq;

    #[test]
    fn test_speed_cap() {
        let base = envelope(vec![
            accelerating_part(0., 0., 0.5, 400.),
            constant_part(400., 1000., 20.),
            braking_part(1000., 20., 0.5, 1400.),
        ]);
        let capped = EnvelopeSpeedCap::from(&base, PhysicalMeaning::CapacitySpeedLimit, 10.).unwrap();
        assert!(capped.is_continuous());
        assert_eq!(capped.len(), 3);
        assert!(almost_eq(capped.get(0).end_pos(), 100., Some(1e-6)));
        let plateau = capped.get(1);
        assert!(plateau.has_profile(EnvelopeProfile::ConstantSpeed));
        assert!(plateau.has_meaning(PhysicalMeaning::CapacitySpeedLimit));
        assert!(almost_eq(plateau.end_pos(), 1300., Some(1e-6)));
        assert_eq!(capped.max_speed(), 10.);
        assert_eq!(capped.begin_pos(), 0.);
        assert_eq!(capped.end_pos(), 1400.);
        assert!(almost_eq(capped.total_time(), 20. + 120. + 20., Some(1e-6)));
    }

    #[test]
    fn test_speed_cap_above_envelope() {
        let base = envelope(vec![constant_part(0., 100., 10.)]);
        let capped = EnvelopeSpeedCap::from(&base, PhysicalMeaning::MarecoSpeedLimit, 20.).unwrap();
        assert_eq!(capped, base);
    }
}
