//! Kinematics of a single envelope step.
//!
//! Within a step the acceleration is constant over distance, so the square of
//! the speed is linear in position. Every interpolation of the crate goes
//! through [`Step`] so that generated step times and interpolated times agree.

/// Two consecutive points of a curve. `begin` may lie after `end` when the
/// curve is walked backward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub begin_pos: f64,
    pub begin_speed: f64,
    pub end_pos: f64,
    pub end_speed: f64,
}

impl Step {
    pub fn new(begin_pos: f64, begin_speed: f64, end_pos: f64, end_speed: f64) -> Self {
        Self {
            begin_pos,
            begin_speed,
            end_pos,
            end_speed,
        }
    }

    pub fn length(&self) -> f64 {
        self.end_pos - self.begin_pos
    }

    /// Acceleration over distance, `(v2² - v1²) / (2 Δx)`
    pub fn acceleration(&self) -> f64 {
        step_acceleration(self.begin_pos, self.end_pos, self.begin_speed, self.end_speed)
    }

    /// Speed at `position`, which may lie outside of the step
    pub fn speed_at(&self, position: f64) -> f64 {
        if position == self.begin_pos {
            return self.begin_speed;
        }
        if position == self.end_pos {
            return self.end_speed;
        }
        interpolate_step_speed(
            self.begin_pos,
            self.end_pos,
            self.begin_speed,
            self.end_speed,
            position - self.begin_pos,
        )
    }

    /// Time needed to go from the beginning of the step to `position`
    pub fn time_to(&self, position: f64) -> f64 {
        interpolate_step_time(
            self.begin_pos,
            self.end_pos,
            self.begin_speed,
            self.end_speed,
            position - self.begin_pos,
        )
    }

    /// Time needed to go through the whole step
    pub fn time(&self) -> f64 {
        self.time_to(self.end_pos)
    }

    /// Position at which the step reaches `speed`, clamped to the step
    pub fn intersect_speed(&self, speed: f64) -> f64 {
        intersect_step_with_speed(
            self.begin_pos,
            self.begin_speed,
            self.end_pos,
            self.end_speed,
            speed,
        )
    }

    /// Crossing point of two steps, `None` if their curves are parallel.
    /// The returned position is clamped to the range covered by both steps.
    pub fn intersect(&self, other: &Step) -> Option<(f64, f64)> {
        let (a1, a2) = (self.acceleration(), other.acceleration());
        if a1 == a2 {
            return None;
        }
        // lines v² = v0² + 2 a (x - x0) in the (x, v²) plane
        let position = (other.begin_speed.powi(2) - self.begin_speed.powi(2)
            + 2. * a1 * self.begin_pos
            - 2. * a2 * other.begin_pos)
            / (2. * (a1 - a2));
        let low = self
            .begin_pos
            .min(self.end_pos)
            .max(other.begin_pos.min(other.end_pos));
        let high = self
            .begin_pos
            .max(self.end_pos)
            .min(other.begin_pos.max(other.end_pos));
        if low > high {
            return None;
        }
        let position = position.clamp(low, high);
        Some((position, self.speed_at(position)))
    }
}

/// Acceleration over a step, as a function of distance
pub fn step_acceleration(begin_pos: f64, end_pos: f64, begin_speed: f64, end_speed: f64) -> f64 {
    (end_speed.powi(2) - begin_speed.powi(2)) / (2. * (end_pos - begin_pos))
}

/// Speed at `pos_delta` from the beginning of a step
pub fn interpolate_step_speed(
    begin_pos: f64,
    end_pos: f64,
    begin_speed: f64,
    end_speed: f64,
    pos_delta: f64,
) -> f64 {
    if pos_delta == 0. {
        return begin_speed;
    }
    let acceleration = step_acceleration(begin_pos, end_pos, begin_speed, end_speed);
    (begin_speed.powi(2) + 2. * acceleration * pos_delta)
        .max(0.)
        .sqrt()
}

/// Time to travel `pos_delta` from the beginning of a step.
///
/// Under constant acceleration over distance, the time is the distance over the
/// mean of the two speeds, which equals `Δv / a` when `a != 0` and `Δx / v` otherwise.
/// The result is infinite if the train never moves.
pub fn interpolate_step_time(
    begin_pos: f64,
    end_pos: f64,
    begin_speed: f64,
    end_speed: f64,
    pos_delta: f64,
) -> f64 {
    if pos_delta == 0. {
        return 0.;
    }
    let speed = interpolate_step_speed(begin_pos, end_pos, begin_speed, end_speed, pos_delta);
    let speed_sum = begin_speed + speed;
    if speed_sum == 0. {
        return f64::INFINITY;
    }
    2. * pos_delta.abs() / speed_sum
}

/// Position at which a step reaches a given speed, clamped to the step
pub fn intersect_step_with_speed(
    begin_pos: f64,
    begin_speed: f64,
    end_pos: f64,
    end_speed: f64,
    speed: f64,
) -> f64 {
    let acceleration = step_acceleration(begin_pos, end_pos, begin_speed, end_speed);
    if acceleration == 0. {
        return begin_pos;
    }
    let position = begin_pos + (speed.powi(2) - begin_speed.powi(2)) / (2. * acceleration);
    position.clamp(begin_pos.min(end_pos), begin_pos.max(end_pos))
}

/// Time deltas of consecutive points
pub fn compute_times(positions: &[f64], speeds: &[f64]) -> Vec<f64> {
    positions
        .windows(2)
        .zip(speeds.windows(2))
        .map(|(pos, speed)| Step::new(pos[0], speed[0], pos[1], speed[1]).time())
        .collect()
}
