//! Helpers shared by unit tests

use crate::envelope::{Envelope, EnvelopeAttrs, EnvelopePart, EnvelopeProfile, PhysicalMeaning};
use crate::sim::{EnvelopeSimContext, EnvelopeSimPath, RollingStock};
use crate::validate::*;

/// Objects with known valid and invalid instances
pub trait Cases: ObjState + Sized {
    fn real_cases() -> Vec<Self>;
    fn invalid_cases() -> Vec<Self> {
        vec![]
    }
}

pub fn test_cases<T>()
where
    T: Cases,
{
    for case_real in T::real_cases() {
        case_real.validate().unwrap();
    }
    for case_invalid in T::invalid_cases() {
        case_invalid.validate().unwrap_err();
    }
}

/// Distance between generated points of curved test parts, m
const POINT_SPACING: f64 = 10.;

fn spaced_positions(begin_pos: f64, end_pos: f64) -> Vec<f64> {
    let count = ((end_pos - begin_pos) / POINT_SPACING).ceil() as usize;
    let mut positions: Vec<f64> = (0..count)
        .map(|i| begin_pos + i as f64 * POINT_SPACING)
        .filter(|pos| end_pos - pos > 1e-9)
        .collect();
    positions.push(end_pos);
    positions
}

fn curved_part(
    attrs: EnvelopeAttrs,
    begin_pos: f64,
    begin_speed: f64,
    acceleration: f64,
    end_pos: f64,
) -> EnvelopePart {
    let positions = spaced_positions(begin_pos, end_pos);
    let speeds = positions
        .iter()
        .map(|pos| (begin_speed.powi(2) + 2. * acceleration * (pos - begin_pos)).max(0.).sqrt())
        .collect();
    EnvelopePart::generate_times(attrs, positions, speeds).unwrap()
}

pub fn constant_part(begin_pos: f64, end_pos: f64, speed: f64) -> EnvelopePart {
    EnvelopePart::constant(
        EnvelopeAttrs::new(EnvelopeProfile::ConstantSpeed).with_meaning(PhysicalMeaning::SpeedLimit),
        begin_pos,
        end_pos,
        speed,
    )
    .unwrap()
}

/// Part with a constant acceleration over distance, with a point every 10 m
pub fn accelerating_part(begin_pos: f64, begin_speed: f64, acceleration: f64, end_pos: f64) -> EnvelopePart {
    curved_part(
        EnvelopeAttrs::new(EnvelopeProfile::Accelerating),
        begin_pos,
        begin_speed,
        acceleration,
        end_pos,
    )
}

/// Part with a constant deceleration over distance, with a point every 10 m
pub fn braking_part(begin_pos: f64, begin_speed: f64, deceleration: f64, end_pos: f64) -> EnvelopePart {
    curved_part(
        EnvelopeAttrs::new(EnvelopeProfile::Braking),
        begin_pos,
        begin_speed,
        -deceleration,
        end_pos,
    )
}

pub fn envelope(parts: Vec<EnvelopePart>) -> Envelope {
    Envelope::new(parts).unwrap()
}

pub fn flat_context(length: f64) -> EnvelopeSimContext {
    EnvelopeSimContext::mock(length).unwrap()
}

/// 20 km with a climb and a descent in the middle
pub fn hilly_context() -> EnvelopeSimContext {
    let path = EnvelopeSimPath::new(
        20_000.,
        vec![0., 6_000., 9_000., 12_000., 20_000.],
        vec![0., 8., -8., 0.],
    )
    .unwrap();
    EnvelopeSimContext::new(RollingStock::mock(), path, 2.).unwrap()
}

impl Cases for EnvelopeSimPath {
    fn real_cases() -> Vec<Self> {
        vec![
            EnvelopeSimPath::flat(1000.).unwrap(),
            hilly_context().path,
        ]
    }
    fn invalid_cases() -> Vec<Self> {
        let mut no_end = EnvelopeSimPath::flat(1000.).unwrap();
        no_end.grade_positions[1] = 900.;
        let mut nan_grade = EnvelopeSimPath::flat(1000.).unwrap();
        nan_grade.grade_values[0] = f64::NAN;
        vec![no_end, nan_grade]
    }
}

impl Cases for RollingStock {
    fn real_cases() -> Vec<Self> {
        vec![RollingStock::mock()]
    }
    fn invalid_cases() -> Vec<Self> {
        let mut no_length = RollingStock::mock();
        no_length.length = 0.;
        let mut negative_resistance = RollingStock::mock();
        negative_resistance.a = -1.;
        vec![no_length, negative_resistance]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::almost_eq;

    #[test]
    fn test_sim_cases() {
        test_cases::<EnvelopeSimPath>();
        test_cases::<RollingStock>();
    }

    #[test]
    fn test_curved_parts() {
        let part = accelerating_part(0., 0., 0.5, 105.);
        assert_eq!(part.point_count(), 12);
        assert_eq!(part.end_pos(), 105.);
        assert!(almost_eq(part.end_speed(), 105f64.sqrt(), None));
        let part = braking_part(0., 10., 0.5, 100.);
        assert_eq!(part.end_speed(), 0.);
        assert!(almost_eq(part.total_time(), 20., None));
    }
}
