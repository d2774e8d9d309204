//! Stage 2: the fastest curve the train can actually run, accelerating at max effort
//! under the max speed envelope.

use crate::envelope::{
    ConstrainedEnvelopePartBuilder, Envelope, EnvelopeCursor, EnvelopePartBuilder,
    EnvelopePartConstraint, EnvelopeProfile, OverlayEnvelopeBuilder, StepConsumer,
};
use crate::imports::*;
use crate::sim::integrator::{compute_acceleration, Action, LIMIT_ACCELERATION};
use crate::sim::{overlays, EnvelopeSimContext};

fn accelerating_builder(profile: EnvelopeProfile, ceiling: &Envelope) -> ConstrainedEnvelopePartBuilder<'_> {
    let mut builder = EnvelopePartBuilder::new();
    builder.set_profile(profile);
    ConstrainedEnvelopePartBuilder::new(
        builder,
        vec![
            EnvelopePartConstraint::SpeedFloor(0.),
            EnvelopePartConstraint::ceiling(ceiling),
        ],
    )
}

/// Accelerates from the initial speed and from every speed increase of the max speed envelope
fn add_acceleration_curves(
    context: &EnvelopeSimContext,
    max_speed_envelope: &Envelope,
    initial_speed: f64,
) -> EnvelopeResult<Envelope> {
    let mut overlay = OverlayEnvelopeBuilder::new(max_speed_envelope.clone());
    let mut cursor = EnvelopeCursor::forward(max_speed_envelope);

    let begin_pos = max_speed_envelope.begin_pos();
    let mut builder = accelerating_builder(EnvelopeProfile::Accelerating, max_speed_envelope);
    if !builder.init_envelope_part(begin_pos, initial_speed, 1.) {
        return Err(EnvelopeError::InvalidPart(format!(
            "initial speed {initial_speed} is above the max speed envelope"
        )));
    }
    overlays::accelerate(context, begin_pos, initial_speed, &mut builder, 1.);
    let mut last_pos = builder.last_pos();
    if let Some(part) = builder.build()? {
        overlay.add_part(part)?;
    }
    if !cursor.find_position(last_pos) {
        return Ok(overlay.build());
    }

    while cursor.find_part_transition(|_, speed, _, next_speed| next_speed > speed) {
        let (position, speed) = (cursor.position(), cursor.speed());
        sim_debug!("accelerating from {speed} at {position}");
        let mut builder = accelerating_builder(EnvelopeProfile::Accelerating, max_speed_envelope);
        overlays::accelerate(context, position, speed, &mut builder, 1.);
        last_pos = builder.last_pos();
        if let Some(part) = builder.build()? {
            overlay.add_part(part)?;
        }
        if !cursor.next_part() || !cursor.find_position(last_pos.max(cursor.position())) {
            break;
        }
    }
    Ok(overlay.build())
}

/// On constant speed parts, follows max effort wherever the train cannot hold the speed,
/// until it catches up with the envelope
fn add_catching_up_curves(context: &EnvelopeSimContext, envelope: &Envelope) -> EnvelopeResult<Envelope> {
    let mut overlay = OverlayEnvelopeBuilder::new(envelope.clone());
    // position up to which the envelope was already replaced
    let mut resume_pos = envelope.begin_pos();
    for part in envelope {
        if !part.has_profile(EnvelopeProfile::ConstantSpeed) || part.end_pos() <= resume_pos {
            continue;
        }
        let speed = part.begin_speed();
        if speed <= 0. {
            continue;
        }
        let scan_step = speed * context.time_step;
        let mut position = part.begin_pos().max(resume_pos);
        while position < part.end_pos() {
            let acceleration = compute_acceleration(context, position, speed, Action::Accelerate);
            if acceleration >= -LIMIT_ACCELERATION {
                position += scan_step;
                continue;
            }
            sim_debug!("the train cannot hold {speed} at {position}, catching up");
            let mut builder = accelerating_builder(EnvelopeProfile::CatchingUp, envelope);
            overlays::accelerate(context, position, speed, &mut builder, 1.);
            let end_pos = builder.last_pos();
            match builder.build()? {
                Some(curve) => {
                    overlay.add_part(curve)?;
                    resume_pos = end_pos;
                    position = end_pos;
                }
                None => position += scan_step,
            }
        }
    }
    Ok(overlay.build())
}

/// Builds the max effort envelope from the max speed envelope.
///
/// The result is not continuous when the train cannot reach the max speed envelope
/// after an acceleration, which callers have to check.
pub fn from(
    context: &EnvelopeSimContext,
    initial_speed: f64,
    max_speed_envelope: &Envelope,
) -> EnvelopeResult<Envelope> {
    let accelerations = add_acceleration_curves(context, max_speed_envelope, initial_speed)?;
    let envelope = add_catching_up_curves(context, &accelerations)?;
    if !envelope.is_continuous() {
        sim_warn!("the max effort envelope is not continuous, the train cannot follow the max speed envelope");
    }
    Ok(envelope)
}
