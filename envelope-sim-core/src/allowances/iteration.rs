//! One candidate of the allowance search: the core envelope of a section, joined to the
//! speeds imposed on its edges.

use super::Allowance;
use crate::envelope::{
    ConstrainedEnvelopePartBuilder, Envelope, EnvelopeBuilder, EnvelopePart, EnvelopePartBuilder,
    EnvelopePartConstraint, EnvelopeProfile,
};
use crate::imports::*;
use crate::sim::{overlays, EnvelopeSimContext};

/// Index of the position constraint in junction builders, as reported by `last_intersection`
const SECTION_BOUNDS: usize = 1;

fn section_bounds(section: &Envelope) -> EnvelopePartConstraint<'static> {
    EnvelopePartConstraint::PositionConstraint {
        begin: section.begin_pos(),
        end: section.end_pos(),
    }
}

fn junction_builder(profile: EnvelopeProfile) -> EnvelopePartBuilder {
    let mut builder = EnvelopePartBuilder::new();
    builder.set_profile(profile);
    builder
}

/// A junction which reached the other end of the section, or stopped before meeting
/// any constraint, never met the target envelope
fn finish_junction(builder: ConstrainedEnvelopePartBuilder) -> EnvelopeResult<Option<EnvelopePart>> {
    if builder.last_intersection() <= SECTION_BOUNDS {
        return Err(ConvergenceError::TooMuchTime.into());
    }
    builder.build()
}

/// From the imposed begin speed to the target: brakes onto it from above,
/// or accelerates up to it (or up to the section) from below
fn left_junction(
    section: &Envelope,
    target: &Envelope,
    context: &EnvelopeSimContext,
    imposed_speed: Option<f64>,
) -> EnvelopeResult<Option<EnvelopePart>> {
    let imposed_speed = match imposed_speed {
        Some(speed) => speed,
        None => return Ok(None),
    };
    let begin_pos = section.begin_pos();
    let builder = if imposed_speed > target.begin_speed() {
        let mut builder = ConstrainedEnvelopePartBuilder::new(
            junction_builder(EnvelopeProfile::Braking),
            vec![section_bounds(section), EnvelopePartConstraint::floor(target)],
        );
        overlays::decelerate(context, begin_pos, imposed_speed, &mut builder, 1.);
        builder
    } else if imposed_speed < section.begin_speed() {
        let mut builder = ConstrainedEnvelopePartBuilder::new(
            junction_builder(EnvelopeProfile::Accelerating),
            vec![
                section_bounds(section),
                EnvelopePartConstraint::ceiling(target),
                EnvelopePartConstraint::ceiling(section),
            ],
        );
        overlays::accelerate(context, begin_pos, imposed_speed, &mut builder, 1.);
        builder
    } else {
        return Ok(None);
    };
    finish_junction(builder)
}

/// Mirror of [`left_junction`], integrated backward from the end of the section
fn right_junction(
    section: &Envelope,
    target: &Envelope,
    context: &EnvelopeSimContext,
    imposed_speed: Option<f64>,
) -> EnvelopeResult<Option<EnvelopePart>> {
    let imposed_speed = match imposed_speed {
        Some(speed) => speed,
        None => return Ok(None),
    };
    let end_pos = section.end_pos();
    let builder = if imposed_speed > target.end_speed() {
        let mut builder = ConstrainedEnvelopePartBuilder::new(
            junction_builder(EnvelopeProfile::Accelerating),
            vec![section_bounds(section), EnvelopePartConstraint::floor(target)],
        );
        overlays::accelerate(context, end_pos, imposed_speed, &mut builder, -1.);
        builder
    } else if imposed_speed < section.end_speed() {
        let mut builder = ConstrainedEnvelopePartBuilder::new(
            junction_builder(EnvelopeProfile::Braking),
            vec![section_bounds(section), EnvelopePartConstraint::ceiling(target)],
        );
        overlays::decelerate(context, end_pos, imposed_speed, &mut builder, -1.);
        builder
    } else {
        return Ok(None);
    };
    finish_junction(builder)
}

/// The left junction followed by the core, over the whole section
fn envelope_with_left_junction(
    section: &Envelope,
    core: &Envelope,
    left: Option<&EnvelopePart>,
) -> EnvelopeResult<Envelope> {
    let left = match left {
        Some(left) => left,
        None => return Ok(core.clone()),
    };
    let mut builder = EnvelopeBuilder::new();
    builder.add_part(left.clone());
    if left.end_pos() < section.end_pos() {
        builder.add_parts(core.slice(left.end_pos(), section.end_pos())?);
    }
    builder.build()
}

/// When the junctions touch or cross, the section is made of the left junction, cut where
/// the right junction meets it, followed by the right junction
fn intersect_junctions(
    left: Option<EnvelopePart>,
    right: Option<EnvelopePart>,
) -> EnvelopeResult<Envelope> {
    let (left, right) = match (left, right) {
        (Some(left), Some(right)) => (left, right),
        _ => return Err(ConvergenceError::TooMuchTime.into()),
    };
    let sliced = left.slice_with_speeds(
        left.begin_pos(),
        None,
        right.begin_pos(),
        Some(right.begin_speed()),
    )?;
    match sliced {
        Some(sliced) if sliced.end_pos() == right.begin_pos() => {
            Envelope::new_continuous(vec![sliced, right], "intersection of the allowance junctions")
        }
        // the junctions do not cross, which happens when one of them is shorter than a step
        _ => Err(ConvergenceError::TooMuchTime.into()),
    }
}

impl Allowance {
    /// Builds the candidate envelope of a section for a search input: the core envelope,
    /// with junctions from the imposed begin speed and to the imposed end speed.
    pub fn compute_iteration(
        &self,
        section: &Envelope,
        context: &EnvelopeSimContext,
        input: f64,
        imposed_begin_speed: Option<f64>,
        imposed_end_speed: Option<f64>,
    ) -> EnvelopeResult<Envelope> {
        let core = self.distribution.core().compute_core(section, context, input)?;

        let left = left_junction(section, &core, context, imposed_begin_speed)?;
        let left_end_pos = left.as_ref().map_or(section.begin_pos(), |part| part.end_pos());
        let core_with_left = envelope_with_left_junction(section, &core, left.as_ref())?;

        let right = right_junction(section, &core_with_left, context, imposed_end_speed)?;
        let right_begin_pos = right.as_ref().map_or(section.end_pos(), |part| part.begin_pos());

        if right_begin_pos <= left_end_pos {
            return intersect_junctions(left, right);
        }

        // junction speeds are forced on the core to absorb epsilon differences
        let left_end_speed = left.as_ref().map(|part| part.end_speed());
        let right_begin_speed = right.as_ref().map(|part| part.begin_speed());
        let mut builder = EnvelopeBuilder::new();
        if let Some(left) = left {
            builder.add_part(left);
        }
        builder.add_parts(core.slice_with_speeds(
            left_end_pos,
            left_end_speed,
            right_begin_pos,
            right_begin_speed,
        )?);
        if let Some(right) = right {
            builder.add_part(right);
        }
        builder.build_continuous("allowance section")
    }
}
