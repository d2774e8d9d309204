//! Curve generators: drive a step consumer with the integrator until it refuses more steps.

use super::integrator::{self, Action, LIMIT_POSITION_DELTA};
use super::EnvelopeSimContext;
use crate::envelope::{
    ConstrainedEnvelopePartBuilder, Envelope, EnvelopePart, EnvelopePartBuilder,
    EnvelopePartConstraint, EnvelopeProfile, Step, StepConsumer,
};
use crate::imports::*;

/// Integrates `action` from a start point until the consumer stops accepting steps,
/// the train stops moving, or the path ends
fn integrate<C: StepConsumer>(
    context: &EnvelopeSimContext,
    action: Action,
    start_position: f64,
    start_speed: f64,
    consumer: &mut C,
    direction: f64,
) {
    if !consumer.init_envelope_part(start_position, start_speed, direction) {
        return;
    }
    let path_length = context.path.length();
    let mut position = start_position;
    let mut speed = start_speed;
    loop {
        let step = integrator::step(context, position, speed, action, direction);
        if step.position_delta.abs() < LIMIT_POSITION_DELTA {
            break;
        }
        let mut next_position = position + step.position_delta;
        let mut next_speed = step.end_speed;
        let out_of_path = next_position < 0. || next_position > path_length;
        if out_of_path {
            let bound = next_position.clamp(0., path_length);
            next_speed = Step::new(position, speed, next_position, next_speed).speed_at(bound);
            next_position = bound;
        }
        if !consumer.add_step(next_position, next_speed) || out_of_path {
            break;
        }
        position = next_position;
        speed = next_speed;
    }
}

/// Accelerates at max effort from a start point
pub fn accelerate<C: StepConsumer>(
    context: &EnvelopeSimContext,
    start_position: f64,
    start_speed: f64,
    consumer: &mut C,
    direction: f64,
) {
    integrate(context, Action::Accelerate, start_position, start_speed, consumer, direction)
}

/// Brakes from a start point
pub fn decelerate<C: StepConsumer>(
    context: &EnvelopeSimContext,
    start_position: f64,
    start_speed: f64,
    consumer: &mut C,
    direction: f64,
) {
    integrate(context, Action::Brake, start_position, start_speed, consumer, direction)
}

/// Coasts from a start point
pub fn coast<C: StepConsumer>(
    context: &EnvelopeSimContext,
    start_position: f64,
    start_speed: f64,
    consumer: &mut C,
    direction: f64,
) {
    integrate(context, Action::Coast, start_position, start_speed, consumer, direction)
}

fn coasting_builder() -> EnvelopePartBuilder {
    let mut builder = EnvelopePartBuilder::new();
    builder.set_profile(EnvelopeProfile::Coasting);
    builder
}

/// Builds a coasting part ending at `end_pos` on `envelope`, which starts where the
/// coasting curve meets the envelope.
///
/// The curve is first integrated backward from `end_pos`. If its speed falls under
/// `low_speed_limit`, or if it reaches the beginning of the envelope before meeting it,
/// the train instead coasts forward from the last point reached, until it meets the
/// envelope again. Returns `None` when no coasting is possible.
pub fn coast_from_end(
    envelope: &Envelope,
    context: &EnvelopeSimContext,
    end_pos: f64,
    low_speed_limit: f64,
) -> EnvelopeResult<Option<EnvelopePart>> {
    let bounds = EnvelopePartConstraint::PositionConstraint {
        begin: envelope.begin_pos(),
        end: envelope.end_pos(),
    };
    let mut backward = ConstrainedEnvelopePartBuilder::new(
        coasting_builder(),
        vec![
            EnvelopePartConstraint::SpeedFloor(0.),
            EnvelopePartConstraint::ceiling(envelope),
            bounds,
        ],
    );
    let end_speed = envelope.interpolate_speed(end_pos)?;
    if !backward.init_envelope_part(end_pos, end_speed, -1.) {
        return Ok(None);
    }
    let mut position = end_pos;
    let mut speed = end_speed;
    let mut reached_low_limit = false;
    loop {
        let step = integrator::step(context, position, speed, Action::Coast, -1.);
        if step.position_delta.abs() < LIMIT_POSITION_DELTA {
            break;
        }
        position += step.position_delta;
        speed = step.end_speed;
        if speed < low_speed_limit {
            reached_low_limit = true;
            break;
        }
        if !backward.add_step(position, speed) {
            break;
        }
    }
    let reached_begin = backward.last_intersection() == 3 || backward.last_pos() <= envelope.begin_pos();
    if backward.is_empty() {
        return Ok(None);
    }
    if !reached_low_limit && !reached_begin {
        return backward.build();
    }

    // coast forward from the last point of the backward curve, starting on the envelope
    let start_pos = backward.last_pos();
    let start_speed = envelope.interpolate_speed(start_pos)?;
    let mut forward = ConstrainedEnvelopePartBuilder::new(
        coasting_builder(),
        vec![
            EnvelopePartConstraint::SpeedFloor(0.),
            EnvelopePartConstraint::ceiling(envelope),
            bounds,
        ],
    );
    coast(context, start_pos, start_speed, &mut forward, 1.);
    if forward.is_empty() || forward.last_intersection() != 2 || forward.last_pos() > end_pos {
        // the forward curve does not merge back before the end position
        sim_debug!(
            "forward coasting from {start_pos} does not merge back before {end_pos}, keeping the backward curve"
        );
        return backward.build();
    }
    forward.build()
}
