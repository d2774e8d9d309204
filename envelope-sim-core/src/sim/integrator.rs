//! Train physics: forces on the train and integration of its motion over time.
//!
//! Integration runs forward or backward in time. Backward integration uses a
//! negative signed time step: the train still travels toward increasing
//! positions, but the curve is built from its end.

use super::EnvelopeSimContext;
use crate::sim::GammaType;

/// Under this acceleration the train is considered not accelerating, m/s²
pub const LIMIT_ACCELERATION: f64 = 1e-5;
/// Under this speed the train is considered stopped, m/s
pub const LIMIT_SPEED: f64 = 1e-5;
/// Under this distance a step does not move the train, m
pub const LIMIT_POSITION_DELTA: f64 = 1e-6;

/// Standard gravity, m/s²
const G: f64 = 9.81;

/// What the driver does during a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Accelerate,
    Brake,
    Coast,
}

/// The result of integrating the motion over a step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegrationStep {
    /// Always positive, s
    pub time_delta: f64,
    /// Signed along the integration direction, m
    pub position_delta: f64,
    pub start_speed: f64,
    pub end_speed: f64,
    /// Acceleration used over the step, m/s²
    pub acceleration: f64,
    pub direction: f64,
}

impl IntegrationStep {
    /// Chains two steps integrated one after the other
    fn then(self, next: IntegrationStep) -> Self {
        Self {
            time_delta: self.time_delta + next.time_delta,
            position_delta: self.position_delta + next.position_delta,
            start_speed: self.start_speed,
            end_speed: next.end_speed,
            acceleration: next.acceleration,
            direction: self.direction,
        }
    }
}

/// Weight force along the track, N. The grade is averaged under the whole train.
pub fn weight_force(context: &EnvelopeSimContext, head_position: f64) -> f64 {
    let path = &context.path;
    let head = head_position.clamp(0., path.length());
    let tail = (head_position - context.rolling_stock.length).clamp(0., path.length());
    let grade = path.average_grade(tail, head);
    let angle = (grade / 1000.).atan();
    -context.rolling_stock.mass * G * angle.sin()
}

/// Acceleration of the train for a given action and state, m/s²
pub fn compute_acceleration(
    context: &EnvelopeSimContext,
    position: f64,
    speed: f64,
    action: Action,
) -> f64 {
    let rolling_stock = &context.rolling_stock;
    if action == Action::Brake && rolling_stock.gamma_type == GammaType::Const {
        return rolling_stock.deceleration();
    }

    let inertia = rolling_stock.inertia();
    let resistance = rolling_stock.rolling_resistance(speed);
    let weight = weight_force(context, position);
    let braking = match action {
        Action::Brake => rolling_stock.max_braking_force(),
        _ => 0.,
    };
    // forces always opposed to the motion
    let opposite = resistance + braking;
    let traction = match action {
        // traction is capped so that it never accelerates the train more than the comfort acceleration
        Action::Accelerate => rolling_stock
            .max_tractive_effort(speed)
            .min(rolling_stock.comfort_acceleration * inertia + opposite - weight)
            .max(0.),
        _ => 0.,
    };
    let other = traction + weight;

    if speed.abs() < LIMIT_SPEED {
        // at rest, opposite forces are reactions: they cancel other forces up to their own magnitude
        if other.abs() <= opposite {
            return 0.;
        }
        return (other - opposite.copysign(other)) / inertia;
    }
    (other - opposite) / inertia
}

/// Integrates a constant acceleration over `time_step`, stopping at zero speed
pub fn newton_step(time_step: f64, speed: f64, acceleration: f64, direction: f64) -> IntegrationStep {
    let mut time_delta = time_step;
    let mut end_speed = speed + acceleration * time_step.copysign(direction);
    if end_speed.abs() < LIMIT_SPEED {
        end_speed = 0.;
    }
    if end_speed < 0. {
        // the speed reaches zero within the step
        time_delta = (speed / acceleration).abs();
        end_speed = 0.;
    }
    let signed_time = time_delta.copysign(direction);
    IntegrationStep {
        time_delta,
        position_delta: speed * signed_time + 0.5 * acceleration * signed_time * signed_time,
        start_speed: speed,
        end_speed,
        acceleration,
        direction,
    }
}

/// One step of the classical fourth order Runge-Kutta method
fn rk4_step(
    context: &EnvelopeSimContext,
    time_step: f64,
    position: f64,
    speed: f64,
    action: Action,
    direction: f64,
) -> IntegrationStep {
    let half = time_step / 2.;
    let k1 = compute_acceleration(context, position, speed, action);
    let step1 = newton_step(half, speed, k1, direction);
    let k2 = compute_acceleration(context, position + step1.position_delta, step1.end_speed, action);
    let step2 = newton_step(half, speed, k2, direction);
    let k3 = compute_acceleration(context, position + step2.position_delta, step2.end_speed, action);
    let step3 = newton_step(time_step, speed, k3, direction);
    let k4 = compute_acceleration(context, position + step3.position_delta, step3.end_speed, action);
    let mean_acceleration = (k1 + 2. * k2 + 2. * k3 + k4) / 6.;
    newton_step(time_step, speed, mean_acceleration, direction)
}

/// Integrates the motion of the train over one time step of the context
pub fn step(
    context: &EnvelopeSimContext,
    position: f64,
    speed: f64,
    action: Action,
    direction: f64,
) -> IntegrationStep {
    step_with_time(context, context.time_step, position, speed, action, direction)
}

/// Integrates the motion of the train over `time_step`.
///
/// When the train stops within the step, it stays stopped unless the forces at
/// rest move it along `direction`, in which case the rest of the step is
/// integrated from rest.
pub fn step_with_time(
    context: &EnvelopeSimContext,
    time_step: f64,
    position: f64,
    speed: f64,
    action: Action,
    direction: f64,
) -> IntegrationStep {
    let first = rk4_step(context, time_step, position, speed, action, direction);
    let remaining = time_step - first.time_delta;
    if first.end_speed > 0. || remaining <= 0. {
        return first;
    }
    let rest_position = position + first.position_delta;
    let rest_acceleration = compute_acceleration(context, rest_position, 0., action);
    if rest_acceleration * direction <= LIMIT_ACCELERATION {
        return first;
    }
    first.then(rk4_step(context, remaining, rest_position, 0., action, direction))
}

/// Integrates one time step, shortened so that the train moves by at most `max_distance`
pub fn step_with_max_distance(
    context: &EnvelopeSimContext,
    position: f64,
    speed: f64,
    action: Action,
    direction: f64,
    max_distance: f64,
) -> IntegrationStep {
    let full = step(context, position, speed, action, direction);
    if full.position_delta.abs() <= max_distance {
        return full;
    }
    let acceleration = full.acceleration;
    // |Δx| = v t + a t² / 2 along the integration direction, with a signed along the direction too
    let signed_acceleration = acceleration * direction.signum();
    let time = if signed_acceleration.abs() < LIMIT_ACCELERATION {
        max_distance / speed
    } else {
        let delta = speed * speed + 2. * signed_acceleration * max_distance;
        (-speed + delta.max(0.).sqrt()) / signed_acceleration
    };
    newton_step(time, speed, acceleration, direction)
}
