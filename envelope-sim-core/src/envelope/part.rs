use super::attrs::{EnvelopeAttrs, EnvelopeProfile, PhysicalMeaning};
use super::physics::{compute_times, Step};
use crate::imports::*;

/// An immutable curve of (position, speed) points with the time needed to go
/// through each step between consecutive points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EnvelopePartRecord", into = "EnvelopePartRecord")]
pub struct EnvelopePart {
    attrs: EnvelopeAttrs,
    positions: Vec<f64>,
    speeds: Vec<f64>,
    time_deltas: Vec<f64>,
    /// time from the beginning of the part to each point
    cumulative_times: Vec<f64>,
}

/// Serialized form of an [`EnvelopePart`], validated on the way in
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EnvelopePartRecord {
    #[serde(default)]
    attrs: EnvelopeAttrs,
    positions: Vec<f64>,
    speeds: Vec<f64>,
    #[serde(default)]
    time_deltas: Option<Vec<f64>>,
}

impl TryFrom<EnvelopePartRecord> for EnvelopePart {
    type Error = EnvelopeError;

    fn try_from(record: EnvelopePartRecord) -> EnvelopeResult<Self> {
        match record.time_deltas {
            Some(time_deltas) => {
                Self::new(record.attrs, record.positions, record.speeds, time_deltas)
            }
            None => Self::generate_times(record.attrs, record.positions, record.speeds),
        }
    }
}

impl From<EnvelopePart> for EnvelopePartRecord {
    fn from(part: EnvelopePart) -> Self {
        Self {
            attrs: part.attrs,
            positions: part.positions,
            speeds: part.speeds,
            time_deltas: Some(part.time_deltas),
        }
    }
}

impl EnvelopePart {
    /// Creates an envelope part, checking its invariants
    pub fn new(
        attrs: EnvelopeAttrs,
        positions: Vec<f64>,
        speeds: Vec<f64>,
        time_deltas: Vec<f64>,
    ) -> EnvelopeResult<Self> {
        let invalid = |msg: String| Err(EnvelopeError::InvalidPart(msg));
        if positions.len() < 2 {
            return invalid(format!(
                "an envelope part needs at least 2 points, got {}",
                positions.len()
            ));
        }
        if speeds.len() != positions.len() {
            return invalid(format!(
                "{} speeds for {} positions",
                speeds.len(),
                positions.len()
            ));
        }
        if time_deltas.len() != positions.len() - 1 {
            return invalid(format!(
                "{} time deltas for {} positions",
                time_deltas.len(),
                positions.len()
            ));
        }
        if positions.iter().any(|pos| !pos.is_finite()) {
            return invalid("positions must be finite".into());
        }
        if let Some(idx) = positions.windows(2).position(|w| w[0] >= w[1]) {
            return invalid(format!(
                "positions must be strictly increasing, got {} then {}",
                positions[idx],
                positions[idx + 1]
            ));
        }
        if let Some(speed) = speeds.iter().find(|v| !(v.is_finite() && **v >= 0.)) {
            return invalid(format!("speeds must be finite and positive, got {speed}"));
        }
        if let Some(dt) = time_deltas.iter().find(|dt| !(dt.is_finite() && **dt > 0.)) {
            return invalid(format!(
                "time deltas must be finite and strictly positive, got {dt}"
            ));
        }
        let mut cumulative_times = Vec::with_capacity(positions.len());
        cumulative_times.push(0.);
        let mut total = 0.;
        for dt in &time_deltas {
            total += dt;
            cumulative_times.push(total);
        }
        Ok(Self {
            attrs,
            positions,
            speeds,
            time_deltas,
            cumulative_times,
        })
    }

    /// Creates an envelope part, computing step times from positions and speeds
    pub fn generate_times(
        attrs: EnvelopeAttrs,
        positions: Vec<f64>,
        speeds: Vec<f64>,
    ) -> EnvelopeResult<Self> {
        if speeds.len() != positions.len() {
            return Err(EnvelopeError::InvalidPart(format!(
                "{} speeds for {} positions",
                speeds.len(),
                positions.len()
            )));
        }
        let time_deltas = compute_times(&positions, &speeds);
        Self::new(attrs, positions, speeds, time_deltas)
    }

    /// A part at constant speed over `[begin_pos, end_pos]`
    pub fn constant(
        attrs: EnvelopeAttrs,
        begin_pos: f64,
        end_pos: f64,
        speed: f64,
    ) -> EnvelopeResult<Self> {
        Self::generate_times(attrs, vec![begin_pos, end_pos], vec![speed, speed])
    }

    // region getters

    pub fn attrs(&self) -> &EnvelopeAttrs {
        &self.attrs
    }

    /// Returns a copy of this part with other attributes
    pub fn with_attrs(&self, attrs: EnvelopeAttrs) -> Self {
        Self {
            attrs,
            ..self.clone()
        }
    }

    pub fn has_profile(&self, profile: EnvelopeProfile) -> bool {
        self.attrs.has_profile(profile)
    }

    pub fn has_meaning(&self, meaning: PhysicalMeaning) -> bool {
        self.attrs.has_meaning(meaning)
    }

    pub fn point_count(&self) -> usize {
        self.positions.len()
    }

    pub fn step_count(&self) -> usize {
        self.positions.len() - 1
    }

    pub fn positions(&self) -> &[f64] {
        &self.positions
    }

    pub fn speeds(&self) -> &[f64] {
        &self.speeds
    }

    pub fn time_deltas(&self) -> &[f64] {
        &self.time_deltas
    }

    pub fn begin_pos(&self) -> f64 {
        self.positions[0]
    }

    pub fn end_pos(&self) -> f64 {
        self.positions[self.positions.len() - 1]
    }

    pub fn begin_speed(&self) -> f64 {
        self.speeds[0]
    }

    pub fn end_speed(&self) -> f64 {
        self.speeds[self.speeds.len() - 1]
    }

    pub fn length(&self) -> f64 {
        self.end_pos() - self.begin_pos()
    }

    pub fn step_begin_pos(&self, step_index: usize) -> f64 {
        self.positions[step_index]
    }

    pub fn step_end_pos(&self, step_index: usize) -> f64 {
        self.positions[step_index + 1]
    }

    pub fn step_begin_speed(&self, step_index: usize) -> f64 {
        self.speeds[step_index]
    }

    pub fn step_end_speed(&self, step_index: usize) -> f64 {
        self.speeds[step_index + 1]
    }

    pub fn step_time(&self, step_index: usize) -> f64 {
        self.time_deltas[step_index]
    }

    pub fn step(&self, step_index: usize) -> Step {
        Step::new(
            self.positions[step_index],
            self.speeds[step_index],
            self.positions[step_index + 1],
            self.speeds[step_index + 1],
        )
    }

    pub fn point_pos(&self, point_index: usize) -> f64 {
        self.positions[point_index]
    }

    pub fn point_speed(&self, point_index: usize) -> f64 {
        self.speeds[point_index]
    }

    pub fn max_speed(&self) -> f64 {
        self.speeds.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn min_speed(&self) -> f64 {
        self.speeds.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Time needed to go through the whole part, s
    pub fn total_time(&self) -> f64 {
        self.cumulative_times[self.cumulative_times.len() - 1]
    }

    /// Time from the beginning of the part to a point of the part, s
    pub fn total_time_at(&self, point_index: usize) -> f64 {
        self.cumulative_times[point_index]
    }

    // endregion

    // region search

    /// Index of the step containing `position`, preferring the step on the left
    /// when `position` is a point of the part. `None` if out of the part.
    pub fn find_left(&self, position: f64) -> Option<usize> {
        find_left(&self.positions, position)
    }

    /// Index of the step containing `position`, preferring the step on the right
    /// when `position` is a point of the part. `None` if out of the part.
    pub fn find_right(&self, position: f64) -> Option<usize> {
        find_right(&self.positions, position)
    }

    // endregion

    // region interpolation

    /// Speed at a position of the part. Positions out of the part are clamped.
    pub fn interpolate_speed(&self, position: f64) -> f64 {
        debug_assert!(
            position >= self.begin_pos() - POSITION_EPSILON
                && position <= self.end_pos() + POSITION_EPSILON
        );
        match search_point(&self.positions, position) {
            PointSearch::Point(idx) => self.speeds[idx],
            PointSearch::Step(idx) => self.step(idx).speed_at(position),
            PointSearch::Before => self.begin_speed(),
            PointSearch::After => self.end_speed(),
        }
    }

    /// Speed at a position of a given step
    pub fn interpolate_speed_at_step(&self, step_index: usize, position: f64) -> f64 {
        self.step(step_index).speed_at(position)
    }

    /// Time from the beginning of a step to a position of this step
    pub fn interpolate_time_delta(&self, step_index: usize, position: f64) -> f64 {
        if position == self.positions[step_index] {
            return 0.;
        }
        if position == self.positions[step_index + 1] {
            return self.time_deltas[step_index];
        }
        self.step(step_index).time_to(position)
    }

    /// Time from the beginning of the part to a position. Positions out of the part are clamped.
    pub fn interpolate_total_time(&self, position: f64) -> f64 {
        match search_point(&self.positions, position) {
            PointSearch::Point(idx) => self.cumulative_times[idx],
            PointSearch::Step(idx) => {
                self.cumulative_times[idx] + self.interpolate_time_delta(idx, position)
            }
            PointSearch::Before => 0.,
            PointSearch::After => self.total_time(),
        }
    }

    /// Position at which the part reaches a speed, starting the search at a given
    /// step. The part is expected to have monotonic speeds.
    pub fn interpolate_position_from(&self, start_step: usize, speed: f64) -> Option<f64> {
        (start_step..self.step_count()).find_map(|idx| {
            let step = self.step(idx);
            let (low, high) = if step.begin_speed <= step.end_speed {
                (step.begin_speed, step.end_speed)
            } else {
                (step.end_speed, step.begin_speed)
            };
            if low <= speed && speed <= high {
                if step.begin_speed == step.end_speed {
                    Some(step.begin_pos)
                } else {
                    Some(step.intersect_speed(speed))
                }
            } else {
                None
            }
        })
    }

    /// Position at which the part reaches a speed. The part is expected to have monotonic speeds.
    pub fn interpolate_position(&self, speed: f64) -> Option<f64> {
        self.interpolate_position_from(0, speed)
    }

    // endregion

    // region slicing

    /// Copy of the steps from `begin_step` (included) to `end_step` (excluded)
    pub fn slice_index(&self, begin_step: usize, end_step: usize) -> EnvelopeResult<Option<Self>> {
        if end_step <= begin_step || end_step > self.step_count() {
            return Ok(None);
        }
        Self::new(
            self.attrs,
            self.positions[begin_step..=end_step].to_vec(),
            self.speeds[begin_step..=end_step].to_vec(),
            self.time_deltas[begin_step..end_step].to_vec(),
        )
        .map(Some)
    }

    /// Cuts the part between two positions, interpolating new points if required.
    /// `None` if the slice is empty.
    pub fn slice(&self, begin_pos: f64, end_pos: f64) -> EnvelopeResult<Option<Self>> {
        self.slice_with_speeds(begin_pos, None, end_pos, None)
    }

    /// Cuts the part between two positions, with optionally imposed speeds on the edges.
    /// Positions beyond the part are clamped to it.
    pub fn slice_with_speeds(
        &self,
        begin_pos: f64,
        begin_speed: Option<f64>,
        end_pos: f64,
        end_speed: Option<f64>,
    ) -> EnvelopeResult<Option<Self>> {
        let begin = if begin_pos <= self.begin_pos() {
            (0, None)
        } else {
            match self.find_right(begin_pos) {
                Some(idx) => (idx, Some(begin_pos)),
                None => return Ok(None),
            }
        };
        let end = if end_pos >= self.end_pos() {
            (self.step_count() - 1, None)
        } else {
            match self.find_left(end_pos) {
                Some(idx) => (idx, Some(end_pos)),
                None => return Ok(None),
            }
        };
        self.slice_steps(begin, begin_speed, end, end_speed)
    }

    /// Cuts the part. Each bound is a step index and a position inside this step,
    /// or `None` for the edge of the step.
    pub(crate) fn slice_steps(
        &self,
        (mut begin_step, mut begin_pos): (usize, Option<f64>),
        begin_speed: Option<f64>,
        (mut end_step, mut end_pos): (usize, Option<f64>),
        end_speed: Option<f64>,
    ) -> EnvelopeResult<Option<Self>> {
        // remove empty ranges from the slice and avoid needless interpolations
        if let Some(pos) = end_pos {
            if pos <= self.step_begin_pos(end_step) {
                if end_step == 0 {
                    return Ok(None);
                }
                end_pos = None;
                end_step -= 1;
            } else if pos >= self.step_end_pos(end_step) {
                end_pos = None;
            }
        }
        if let Some(pos) = begin_pos {
            if pos >= self.step_end_pos(begin_step) {
                begin_pos = None;
                begin_step += 1;
            } else if pos <= self.step_begin_pos(begin_step) {
                begin_pos = None;
            }
        }
        if begin_step > end_step || end_step >= self.step_count() {
            return Ok(None);
        }

        // if the slice spans the whole part, don't make a copy
        if begin_step == 0
            && end_step == self.step_count() - 1
            && begin_pos.is_none()
            && end_pos.is_none()
            && begin_speed.is_none()
            && end_speed.is_none()
        {
            return Ok(Some(self.clone()));
        }

        let mut positions = self.positions[begin_step..=end_step + 1].to_vec();
        let mut speeds = self.speeds[begin_step..=end_step + 1].to_vec();
        let mut time_deltas = self.time_deltas[begin_step..=end_step].to_vec();
        let last_point = positions.len() - 1;
        let last_step = time_deltas.len() - 1;

        if let Some(pos) = end_pos {
            speeds[last_point] = self.interpolate_speed_at_step(end_step, pos);
            positions[last_point] = pos;
        }
        if let Some(pos) = begin_pos {
            speeds[0] = self.interpolate_speed_at_step(begin_step, pos);
            positions[0] = pos;
        }
        if let Some(speed) = begin_speed {
            speeds[0] = speed;
        }
        if let Some(speed) = end_speed {
            speeds[last_point] = speed;
        }
        if positions[0] >= positions[last_point] {
            return Ok(None);
        }
        // edge steps changed shape, their times are generated again
        if begin_pos.is_some() || begin_speed.is_some() {
            time_deltas[0] = Step::new(positions[0], speeds[0], positions[1], speeds[1]).time();
        }
        if end_pos.is_some() || end_speed.is_some() {
            time_deltas[last_step] = Step::new(
                positions[last_point - 1],
                speeds[last_point - 1],
                positions[last_point],
                speeds[last_point],
            )
            .time();
        }
        Self::new(self.attrs, positions, speeds, time_deltas).map(Some)
    }

    // endregion
}

pub(crate) enum PointSearch {
    /// the position is a point of the curve
    Point(usize),
    /// the position is strictly inside a step
    Step(usize),
    Before,
    After,
}

/// Locates a position among sorted points
pub(crate) fn search_point(points: &[f64], position: f64) -> PointSearch {
    let insertion = points.partition_point(|&p| p < position);
    if insertion < points.len() && points[insertion] == position {
        PointSearch::Point(insertion)
    } else if insertion == 0 {
        PointSearch::Before
    } else if insertion == points.len() {
        PointSearch::After
    } else {
        PointSearch::Step(insertion - 1)
    }
}

/// Range index containing `position` in sorted `points`, preferring the left range on points
pub(crate) fn find_left(points: &[f64], position: f64) -> Option<usize> {
    match search_point(points, position) {
        PointSearch::Point(0) => Some(0),
        PointSearch::Point(idx) => Some(idx - 1),
        PointSearch::Step(idx) => Some(idx),
        PointSearch::Before | PointSearch::After => None,
    }
}

/// Range index containing `position` in sorted `points`, preferring the right range on points
pub(crate) fn find_right(points: &[f64], position: f64) -> Option<usize> {
    match search_point(points, position) {
        PointSearch::Point(idx) if idx == points.len() - 1 => Some(idx - 1),
        PointSearch::Point(idx) => Some(idx),
        PointSearch::Step(idx) => Some(idx),
        PointSearch::Before | PointSearch::After => None,
    }
}
