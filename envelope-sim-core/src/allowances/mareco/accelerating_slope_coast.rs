use crate::envelope::{Envelope, EnvelopePart, EnvelopeProfile};
use crate::imports::*;
use crate::sim::integrator::{self, Action};
use crate::sim::overlays::coast_from_end;
use crate::sim::{EnvelopeSimContext, RollingStock};

/// Distance between samples when looking for the beginning of a slope, m
const SLOPE_START_STEP: f64 = 10.;

/// Downhill stretch of a plateau, on which a coasting train accelerates
#[derive(Debug, Clone, PartialEq)]
pub struct AcceleratingSlopeCoast {
    /// where the coasting curve merges back into the envelope, at the end of the slope
    end_pos: f64,
    /// mean natural acceleration on the slope, m/s²
    slope_average_acceleration: f64,
    /// estimate of the mean natural acceleration between the start of coasting
    /// and the beginning of the slope, m/s²
    previous_acceleration_estimate: f64,
    /// speed of the plateau, m/s
    speed_limit: f64,
}

/// Natural acceleration of a coasting train
fn natural_acceleration(context: &EnvelopeSimContext, position: f64, speed: f64) -> f64 {
    integrator::step(context, position, speed, Action::Coast, 1.).acceleration
}

/// Position where the natural acceleration changes sign, between two samples
fn interpolate_acceleration_sign_change(
    current_acceleration: f64,
    previous_acceleration: f64,
    current_pos: f64,
    previous_pos: f64,
) -> f64 {
    if are_positions_equal(current_pos, previous_pos)
        || are_speeds_equal(current_acceleration, previous_acceleration)
    {
        return current_pos;
    }
    let factor = (previous_acceleration - current_acceleration) / (previous_pos - current_pos);
    let y0 = previous_acceleration - factor * previous_pos;
    (-y0 / factor).clamp(previous_pos.min(current_pos), previous_pos.max(current_pos))
}

/// Mean of a value weighted by distance
#[derive(Debug, Default)]
struct DistanceAverage {
    total_distance: f64,
    weighted_sum: f64,
}

impl DistanceAverage {
    fn add_segment(&mut self, distance: f64, value: f64) {
        self.total_distance += distance;
        self.weighted_sum += distance * value;
    }

    fn average(&self) -> f64 {
        self.weighted_sum / self.total_distance
    }
}

/// A slope being scanned
struct SlopeScan {
    acceleration_start_pos: f64,
    mean_acceleration: DistanceAverage,
}

impl SlopeScan {
    fn build(self, end_pos: f64, context: &EnvelopeSimContext, speed_limit: f64) -> AcceleratingSlopeCoast {
        AcceleratingSlopeCoast {
            end_pos,
            slope_average_acceleration: self.mean_acceleration.average(),
            previous_acceleration_estimate: estimate_previous_acceleration(
                context,
                self.acceleration_start_pos,
                speed_limit,
            ),
            speed_limit,
        }
    }
}

/// Exact position where the natural acceleration becomes positive, searching backward
/// from the first sample with a positive acceleration. The slope may begin before the plateau.
fn find_slope_start(context: &EnvelopeSimContext, acceleration_start_pos: f64, speed: f64) -> f64 {
    let mut position = acceleration_start_pos;
    while position > 0. && natural_acceleration(context, position, speed) > 0. {
        position -= SLOPE_START_STEP;
    }
    if position <= 0. {
        // the path begins downhill
        return 0.;
    }
    let previous = natural_acceleration(context, position, speed);
    let next = natural_acceleration(context, position + SLOPE_START_STEP, speed);
    interpolate_acceleration_sign_change(next, previous, position + SLOPE_START_STEP, position)
}

/// Natural acceleration one train length before the slope, where the head of the train
/// is not on the slope yet. Only an approximation is needed.
fn estimate_previous_acceleration(
    context: &EnvelopeSimContext,
    acceleration_start_pos: f64,
    speed: f64,
) -> f64 {
    let slope_start = find_slope_start(context, acceleration_start_pos, speed);
    let estimate_pos = (slope_start - context.rolling_stock.length).max(0.);
    natural_acceleration(context, estimate_pos, speed).min(0.)
}

impl AcceleratingSlopeCoast {
    pub fn end_pos(&self) -> f64 {
        self.end_pos
    }

    /// Optimal speed when entering the slope. The slope may be too short to reach it,
    /// the train then enters it at the lowest speed which catches up at its end.
    fn compute_v(&self, rolling_stock: &RollingStock, v1: f64, vf: f64) -> f64 {
        let wle = rolling_stock.rolling_resistance(v1) * v1 * vf / (v1 - vf);
        let acceleration_ratio = self.previous_acceleration_estimate / self.slope_average_acceleration;
        1. / (1. / self.speed_limit
            + rolling_stock.rolling_resistance(self.speed_limit) / (wle * (1. - acceleration_ratio)))
    }

    /// Coasts backward from the end of the slope, no slower than `max(v, vf)`
    pub fn compute(
        &self,
        base: &Envelope,
        context: &EnvelopeSimContext,
        v1: f64,
        vf: f64,
    ) -> EnvelopeResult<Option<EnvelopePart>> {
        let v = self.compute_v(&context.rolling_stock, v1, vf);
        coast_from_end(base, context, self.end_pos, v.max(vf))
    }

    /// Scans constant speed parts above `vf` for stretches where a coasting train accelerates
    pub fn find_all(envelope: &Envelope, context: &EnvelopeSimContext, vf: f64) -> Vec<Self> {
        let mut res = vec![];
        for part in envelope
            .iter()
            .filter(|part| part.has_profile(EnvelopeProfile::ConstantSpeed))
        {
            let speed = part.begin_speed();
            // no coasting is triggered below vf
            if speed <= vf {
                continue;
            }
            let position_step = context.time_step * speed;
            let mut current: Option<SlopeScan> = None;
            let mut position = part.begin_pos();
            let (mut previous_pos, mut previous_acceleration) = (position, 0.);
            while position <= part.end_pos() {
                let acceleration = natural_acceleration(context, position, speed);
                if acceleration > 0. {
                    current
                        .get_or_insert_with(|| SlopeScan {
                            acceleration_start_pos: position,
                            mean_acceleration: DistanceAverage::default(),
                        })
                        .mean_acceleration
                        .add_segment(position_step, acceleration);
                } else if let Some(slope) = current.take() {
                    let end_pos = interpolate_acceleration_sign_change(
                        acceleration,
                        previous_acceleration,
                        position,
                        previous_pos,
                    );
                    res.push(slope.build(end_pos, context, speed));
                }
                previous_pos = position;
                previous_acceleration = acceleration;
                position += position_step;
            }
            // the plateau ends on the slope
            if let Some(slope) = current.take() {
                res.push(slope.build(previous_pos, context, speed));
            }
        }
        res
    }
}
