//! Envelope parts built under constraints: a generated curve is clipped at the
//! exact point where it first violates one of them.

use super::builder::{EnvelopePartBuilder, StepConsumer};
use super::physics::Step;
use super::{Envelope, EnvelopePart};
use crate::imports::*;

/// Whether a constraint bounds speeds from below or from above
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Floor,
    Ceiling,
}

impl ConstraintKind {
    /// Positive when `speed` violates the bound `limit`
    fn violation(&self, speed: f64, limit: f64) -> f64 {
        match self {
            Self::Floor => limit - speed,
            Self::Ceiling => speed - limit,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum EnvelopePartConstraint<'a> {
    SpeedFloor(f64),
    SpeedCeiling(f64),
    /// Speeds must stay on one side of an envelope
    EnvelopeConstraint {
        envelope: &'a Envelope,
        kind: ConstraintKind,
    },
    /// Positions must stay within `[begin, end]`
    PositionConstraint { begin: f64, end: f64 },
}

impl<'a> EnvelopePartConstraint<'a> {
    pub fn floor(envelope: &'a Envelope) -> Self {
        Self::EnvelopeConstraint {
            envelope,
            kind: ConstraintKind::Floor,
        }
    }

    pub fn ceiling(envelope: &'a Envelope) -> Self {
        Self::EnvelopeConstraint {
            envelope,
            kind: ConstraintKind::Ceiling,
        }
    }

    /// Whether a curve may start at this point
    pub fn init_check(&self, position: f64, speed: f64, direction: f64) -> bool {
        match *self {
            Self::SpeedFloor(limit) => speed >= limit,
            Self::SpeedCeiling(limit) => speed <= limit,
            Self::EnvelopeConstraint { envelope, kind } => {
                if position < envelope.begin_pos() - POSITION_EPSILON
                    || position > envelope.end_pos() + POSITION_EPSILON
                {
                    return false;
                }
                let limit = envelope.interpolate_speed_right_dir(position, direction);
                kind.violation(speed, limit) <= SPEED_EPSILON
            }
            Self::PositionConstraint { begin, end } => {
                position >= begin - POSITION_EPSILON && position <= end + POSITION_EPSILON
            }
        }
    }

    /// Returns the first point of the step violating the constraint, if any
    pub fn step_check(&self, step: &Step, direction: f64) -> Option<(f64, f64)> {
        match *self {
            Self::SpeedFloor(limit) => (step.end_speed < limit)
                .then(|| (step.intersect_speed(limit), limit)),
            Self::SpeedCeiling(limit) => (step.end_speed > limit)
                .then(|| (step.intersect_speed(limit), limit)),
            Self::EnvelopeConstraint { envelope, kind } => {
                intersect_envelope(step, envelope, kind, direction)
            }
            Self::PositionConstraint { begin, end } => {
                if step.end_pos < begin {
                    Some((begin, step.speed_at(begin)))
                } else if step.end_pos > end {
                    Some((end, step.speed_at(end)))
                } else {
                    None
                }
            }
        }
    }
}

/// Walks the envelope steps under `step` along `direction` and returns the first
/// point where `step` crosses the envelope on the wrong side.
///
/// Within each envelope step both curves have a square speed linear in
/// position, so their difference is linear too and the crossing is exact.
/// When the envelope jumps over the curve, the curve is cut at the jump with its own speed.
fn intersect_envelope(
    step: &Step,
    envelope: &Envelope,
    kind: ConstraintKind,
    direction: f64,
) -> Option<(f64, f64)> {
    let forward = direction >= 0.;
    let step_low = step.begin_pos.min(step.end_pos);
    let step_high = step.begin_pos.max(step.end_pos);
    let low = step_low.max(envelope.begin_pos());
    let high = step_high.min(envelope.end_pos());
    if low > high {
        return None;
    }
    let first_part = envelope.find_right_dir(step.begin_pos.clamp(low, high), direction)?;
    let part_indices: Box<dyn Iterator<Item = usize>> = if forward {
        Box::new(first_part..envelope.len())
    } else {
        Box::new((0..=first_part).rev())
    };

    // square speed difference, positive on the wrong side of the envelope
    let sq_violation = |speed: f64, limit: f64| kind.violation(speed.powi(2), limit.powi(2));

    for part_index in part_indices {
        let part = envelope.get(part_index);
        if part.end_pos() < low || part.begin_pos() > high {
            break;
        }
        let steps: Vec<usize> = (0..part.step_count())
            .filter(|&idx| part.step_end_pos(idx) >= low && part.step_begin_pos(idx) <= high)
            .collect();
        let ordered: Box<dyn Iterator<Item = &usize>> = if forward {
            Box::new(steps.iter())
        } else {
            Box::new(steps.iter().rev())
        };
        for &step_index in ordered {
            let env_step = part.step(step_index);
            let sub_low = env_step.begin_pos.max(low);
            let sub_high = env_step.end_pos.min(high);
            let (start, end) = if forward {
                (sub_low, sub_high)
            } else {
                (sub_high, sub_low)
            };

            let start_speed = step.speed_at(start);
            let start_limit = env_step.speed_at(start);
            if kind.violation(start_speed, start_limit) > SPEED_EPSILON {
                return Some((start, start_speed));
            }
            let end_speed = step.speed_at(end);
            let end_limit = env_step.speed_at(end);
            if kind.violation(end_speed, end_limit) > SPEED_EPSILON {
                let start_violation = sq_violation(start_speed, start_limit);
                let end_violation = sq_violation(end_speed, end_limit);
                let ratio = if end_violation == start_violation {
                    0.
                } else {
                    (-start_violation / (end_violation - start_violation)).clamp(0., 1.)
                };
                let position = start + ratio * (end - start);
                return Some((position, env_step.speed_at(position)));
            }
        }
    }
    None
}

/// Builds an envelope part from integrator steps, stopping at the first
/// constraint violation.
#[derive(Debug, Clone)]
pub struct ConstrainedEnvelopePartBuilder<'a> {
    builder: EnvelopePartBuilder,
    constraints: Vec<EnvelopePartConstraint<'a>>,
    /// 1-based index of the last violated constraint, 0 if none
    last_intersection: usize,
    last_pos: f64,
    last_speed: f64,
    direction: f64,
}

impl<'a> ConstrainedEnvelopePartBuilder<'a> {
    pub fn new(builder: EnvelopePartBuilder, constraints: Vec<EnvelopePartConstraint<'a>>) -> Self {
        Self {
            builder,
            constraints,
            last_intersection: 0,
            last_pos: f64::NAN,
            last_speed: f64::NAN,
            direction: 1.,
        }
    }

    /// 1-based index of the constraint which stopped the curve, 0 if the curve
    /// was not stopped by any constraint
    pub fn last_intersection(&self) -> usize {
        self.last_intersection
    }

    pub fn last_pos(&self) -> f64 {
        self.last_pos
    }

    pub fn last_speed(&self) -> f64 {
        self.last_speed
    }

    /// True when no step was added
    pub fn is_empty(&self) -> bool {
        self.builder.is_empty()
    }

    pub fn step_count(&self) -> usize {
        self.builder.step_count()
    }

    /// Creates the envelope part, `None` if no step was added
    pub fn build(self) -> EnvelopeResult<Option<EnvelopePart>> {
        if self.builder.is_empty() {
            return Ok(None);
        }
        self.builder.build().map(Some)
    }
}

impl<'a> StepConsumer for ConstrainedEnvelopePartBuilder<'a> {
    fn init_envelope_part(&mut self, position: f64, speed: f64, direction: f64) -> bool {
        if !self
            .constraints
            .iter()
            .all(|constraint| constraint.init_check(position, speed, direction))
        {
            return false;
        }
        self.last_pos = position;
        self.last_speed = speed;
        self.direction = if direction < 0. { -1. } else { 1. };
        self.builder.init_envelope_part(position, speed, direction)
    }

    fn add_step(&mut self, position: f64, speed: f64) -> bool {
        let mut step = Step::new(self.last_pos, self.last_speed, position, speed);
        let mut last_intersection = 0;
        for (idx, constraint) in self.constraints.iter().enumerate() {
            if let Some((inter_pos, inter_speed)) = constraint.step_check(&step, self.direction) {
                step = Step::new(step.begin_pos, step.begin_speed, inter_pos, inter_speed);
                last_intersection = idx + 1;
            }
        }
        self.last_intersection = last_intersection;

        // zero length steps are dropped
        if (step.end_pos - step.begin_pos) * self.direction > 0. {
            self.builder.add_step(step.end_pos, step.end_speed);
            self.last_pos = step.end_pos;
            self.last_speed = step.end_speed;
        }
        last_intersection == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::EnvelopeProfile;
    use crate::testing::*;
    use crate::utils::almost_eq;

    fn builder() -> EnvelopePartBuilder {
        let mut builder = EnvelopePartBuilder::new();
        builder.set_profile(EnvelopeProfile::Accelerating);
        builder
    }

    #[test]
    fn test_speed_ceiling() {
        let mut constrained = ConstrainedEnvelopePartBuilder::new(
            builder(),
            vec![EnvelopePartConstraint::SpeedCeiling(5.)],
        );
        assert!(constrained.init_envelope_part(0., 0., 1.));
        assert!(!constrained.add_step(100., 10.));
        assert_eq!(constrained.last_intersection(), 1);
        assert!(almost_eq(constrained.last_pos(), 25., None));
        assert_eq!(constrained.last_speed(), 5.);
        let part = constrained.build().unwrap().unwrap();
        assert_eq!(part.end_speed(), 5.);
    }

    #[test]
    fn test_init_check() {
        let mut constrained = ConstrainedEnvelopePartBuilder::new(
            builder(),
            vec![
                EnvelopePartConstraint::SpeedFloor(2.),
                EnvelopePartConstraint::PositionConstraint {
                    begin: 0.,
                    end: 100.,
                },
            ],
        );
        assert!(!constrained.init_envelope_part(0., 1., 1.));
        assert!(!constrained.init_envelope_part(200., 3., 1.));
        assert!(constrained.init_envelope_part(50., 3., 1.));
        assert!(constrained.add_step(80., 4.));
        assert_eq!(constrained.last_intersection(), 0);
        assert!(!constrained.add_step(120., 5.));
        assert_eq!(constrained.last_intersection(), 2);
        assert_eq!(constrained.last_pos(), 100.);
    }

    #[test]
    fn test_floor_backward() {
        // walked backward, this curve loses speed until the floor is hit
        let mut constrained = ConstrainedEnvelopePartBuilder::new(
            builder(),
            vec![EnvelopePartConstraint::SpeedFloor(5.)],
        );
        assert!(constrained.init_envelope_part(100., 10., -1.));
        assert!(!constrained.add_step(0., 0.));
        // v² = x along this step
        assert!(almost_eq(constrained.last_pos(), 25., None));
        let part = constrained.build().unwrap().unwrap();
        assert_eq!(part.end_pos(), 100.);
        assert_eq!(part.begin_speed(), 5.);
    }

    #[test]
    fn test_envelope_ceiling_crossing() {
        let ceiling = envelope(vec![constant_part(0., 1000., 10.)]);
        let mut constrained = ConstrainedEnvelopePartBuilder::new(
            builder(),
            vec![EnvelopePartConstraint::ceiling(&ceiling)],
        );
        assert!(constrained.init_envelope_part(0., 0., 1.));
        assert!(constrained.add_step(50., 50_f64.sqrt()));
        assert!(!constrained.add_step(200., 200_f64.sqrt()));
        assert_eq!(constrained.last_intersection(), 1);
        assert!(almost_eq(constrained.last_pos(), 100., Some(1e-6)));
        assert!(almost_eq(constrained.last_speed(), 10., None));
    }

    #[test]
    fn test_envelope_ceiling_jump() {
        // the ceiling drops at 100, the curve is cut at the drop
        let ceiling = envelope(vec![
            constant_part(0., 100., 20.),
            constant_part(100., 200., 5.),
        ]);
        let mut constrained = ConstrainedEnvelopePartBuilder::new(
            builder(),
            vec![EnvelopePartConstraint::ceiling(&ceiling)],
        );
        assert!(constrained.init_envelope_part(0., 10., 1.));
        assert!(!constrained.add_step(150., 10.));
        assert_eq!(constrained.last_pos(), 100.);
        assert_eq!(constrained.last_speed(), 10.);
    }

    #[test]
    fn test_envelope_floor_backward() {
        let floor = envelope(vec![constant_part(0., 1000., 10.)]);
        let mut constrained = ConstrainedEnvelopePartBuilder::new(
            builder(),
            vec![EnvelopePartConstraint::floor(&floor)],
        );
        assert!(!constrained.init_envelope_part(500., 9., -1.));
        assert!(constrained.init_envelope_part(500., 20., -1.));
        // braking backward means speeds decrease towards the beginning
        assert!(constrained.add_step(450., 18.));
        assert!(!constrained.add_step(300., 5.));
        assert!(almost_eq(constrained.last_speed(), 10., None));
        assert!(constrained.last_pos() > 300. && constrained.last_pos() < 450.);
        let part = constrained.build().unwrap().unwrap();
        assert_eq!(part.end_pos(), 500.);
        assert!(almost_eq(part.begin_speed(), 10., None));
    }

    #[test]
    fn test_zero_length_step_is_dropped() {
        let mut constrained = ConstrainedEnvelopePartBuilder::new(
            builder(),
            vec![EnvelopePartConstraint::SpeedCeiling(5.)],
        );
        assert!(constrained.init_envelope_part(0., 5., 1.));
        assert!(!constrained.add_step(10., 6.));
        assert!(constrained.is_empty());
        assert!(constrained.build().unwrap().is_none());
    }
}
