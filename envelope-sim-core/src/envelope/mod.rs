//! Speed/position curves: envelope parts, envelopes and the tools used to build them.

use crate::imports::*;

pub mod attrs;
pub mod builder;
pub mod constraints;
pub mod cursor;
pub mod overlay;
pub mod part;
pub mod physics;
pub mod speed_cap;

pub use attrs::{EnvelopeAttrs, EnvelopeProfile, PhysicalMeaning};
pub use builder::{EnvelopeBuilder, EnvelopePartBuilder, StepConsumer};
pub use constraints::{ConstrainedEnvelopePartBuilder, ConstraintKind, EnvelopePartConstraint};
pub use cursor::{EnvelopeCursor, NextStepResult};
pub use overlay::OverlayEnvelopeBuilder;
pub use part::EnvelopePart;
pub use physics::Step;
pub use speed_cap::EnvelopeSpeedCap;

/// A point of an envelope, with the time needed to reach it from the beginning of the envelope
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvelopePoint {
    /// s
    pub time: f64,
    /// m
    pub position: f64,
    /// m/s
    pub speed: f64,
}

/// An ordered sequence of contiguous envelope parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<EnvelopePart>", into = "Vec<EnvelopePart>")]
pub struct Envelope {
    parts: Vec<EnvelopePart>,
    /// whether each part begins at the speed the previous one ends with
    continuous: bool,
    /// positions of all part transitions, including the beginning and the end
    part_positions: Vec<f64>,
    /// time from the beginning of the envelope to each part transition
    cumulative_times: Vec<f64>,
    min_speed: f64,
    max_speed: f64,
}

impl TryFrom<Vec<EnvelopePart>> for Envelope {
    type Error = EnvelopeError;

    fn try_from(parts: Vec<EnvelopePart>) -> EnvelopeResult<Self> {
        Self::new(parts)
    }
}

impl From<Envelope> for Vec<EnvelopePart> {
    fn from(envelope: Envelope) -> Self {
        envelope.parts
    }
}

impl SerdeAPI for Envelope {}

impl Envelope {
    /// Creates an envelope. Parts must be contiguous, speed continuity is not required.
    pub fn new(parts: Vec<EnvelopePart>) -> EnvelopeResult<Self> {
        if parts.is_empty() {
            return Err(EnvelopeError::InvalidPart(
                "an envelope needs at least one part".into(),
            ));
        }
        let mut continuous = true;
        for pair in parts.windows(2) {
            let (end, begin) = (pair[0].end_pos(), pair[1].begin_pos());
            if !are_positions_equal(end, begin) {
                return Err(EnvelopeError::PartsNotContiguous { end, begin });
            }
            if !are_speeds_equal(pair[0].end_speed(), pair[1].begin_speed()) {
                continuous = false;
            }
        }

        let mut part_positions = Vec::with_capacity(parts.len() + 1);
        part_positions.push(parts[0].begin_pos());
        part_positions.extend(parts.iter().map(|part| part.end_pos()));

        let mut cumulative_times = Vec::with_capacity(parts.len() + 1);
        cumulative_times.push(0.);
        let mut total = 0.;
        for part in &parts {
            total += part.total_time();
            cumulative_times.push(total);
        }

        let min_speed = parts
            .iter()
            .map(|part| part.min_speed())
            .fold(f64::INFINITY, f64::min);
        let max_speed = parts
            .iter()
            .map(|part| part.max_speed())
            .fold(f64::NEG_INFINITY, f64::max);

        Ok(Self {
            parts,
            continuous,
            part_positions,
            cumulative_times,
            min_speed,
            max_speed,
        })
    }

    /// Creates an envelope which must be continuous
    pub fn new_continuous(parts: Vec<EnvelopePart>, context: &str) -> EnvelopeResult<Self> {
        let envelope = Self::new(parts)?;
        if !envelope.continuous {
            return Err(EnvelopeError::discontinuity(context));
        }
        Ok(envelope)
    }

    // region getters

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn get(&self, index: usize) -> &EnvelopePart {
        &self.parts[index]
    }

    pub fn parts(&self) -> &[EnvelopePart] {
        &self.parts
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EnvelopePart> {
        self.parts.iter()
    }

    pub fn is_continuous(&self) -> bool {
        self.continuous
    }

    pub fn begin_pos(&self) -> f64 {
        self.part_positions[0]
    }

    pub fn end_pos(&self) -> f64 {
        self.part_positions[self.part_positions.len() - 1]
    }

    pub fn total_distance(&self) -> f64 {
        self.end_pos() - self.begin_pos()
    }

    pub fn begin_speed(&self) -> f64 {
        self.parts[0].begin_speed()
    }

    pub fn end_speed(&self) -> f64 {
        self.parts[self.parts.len() - 1].end_speed()
    }

    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    pub fn min_speed(&self) -> f64 {
        self.min_speed
    }

    /// Time needed to go through the whole envelope, s
    pub fn total_time(&self) -> f64 {
        self.cumulative_times[self.cumulative_times.len() - 1]
    }

    /// Time from the beginning of the envelope to the beginning of a part,
    /// or to the end of the envelope for `transition_index == len()`
    pub fn cumulative_time(&self, transition_index: usize) -> f64 {
        self.cumulative_times[transition_index]
    }

    // endregion

    // region search

    /// Index of the part containing `position`, preferring the part on the left at transitions
    pub fn find_left(&self, position: f64) -> Option<usize> {
        part::find_left(&self.part_positions, position)
    }

    /// Index of the part containing `position`, preferring the part on the right at transitions
    pub fn find_right(&self, position: f64) -> Option<usize> {
        part::find_right(&self.part_positions, position)
    }

    /// Part containing `position`, preferring the part the train comes from when
    /// moving along `direction`
    pub fn find_left_dir(&self, position: f64, direction: f64) -> Option<usize> {
        if direction >= 0. {
            self.find_left(position)
        } else {
            self.find_right(position)
        }
    }

    /// Part containing `position`, preferring the part the train goes to when
    /// moving along `direction`
    pub fn find_right_dir(&self, position: f64, direction: f64) -> Option<usize> {
        if direction >= 0. {
            self.find_right(position)
        } else {
            self.find_left(position)
        }
    }

    /// Index of the part containing `position`, snapping positions within epsilon of the envelope bounds
    fn find_left_clamped(&self, position: f64) -> Option<usize> {
        self.find_left(self.clamp_position(position))
    }

    fn clamp_position(&self, position: f64) -> f64 {
        if position < self.begin_pos() && are_positions_equal(position, self.begin_pos()) {
            self.begin_pos()
        } else if position > self.end_pos() && are_positions_equal(position, self.end_pos()) {
            self.end_pos()
        } else {
            position
        }
    }

    // endregion

    // region interpolation

    /// Speed at a position. Refused on non continuous envelopes.
    pub fn interpolate_speed(&self, position: f64) -> EnvelopeResult<f64> {
        if !self.continuous {
            return Err(EnvelopeError::NotContinuous);
        }
        let position = self.clamp_position(position);
        let part_index = self.find_left(position).ok_or_else(|| {
            EnvelopeError::InvalidPart(format!(
                "position {position} is out of the envelope [{}, {}]",
                self.begin_pos(),
                self.end_pos()
            ))
        })?;
        Ok(self.parts[part_index].interpolate_speed(position))
    }

    /// Speed at a position, taken on the part the train comes from along `direction`.
    /// Positions out of the envelope are clamped.
    pub fn interpolate_speed_left_dir(&self, position: f64, direction: f64) -> f64 {
        let position = position.clamp(self.begin_pos(), self.end_pos());
        let part_index = self
            .find_left_dir(position, direction)
            .unwrap_or(self.parts.len() - 1);
        self.parts[part_index].interpolate_speed(position)
    }

    /// Speed at a position, taken on the part the train goes to along `direction`.
    /// Positions out of the envelope are clamped.
    pub fn interpolate_speed_right_dir(&self, position: f64, direction: f64) -> f64 {
        let position = position.clamp(self.begin_pos(), self.end_pos());
        let part_index = self
            .find_right_dir(position, direction)
            .unwrap_or(self.parts.len() - 1);
        self.parts[part_index].interpolate_speed(position)
    }

    /// Maximum speed over `[begin_pos, end_pos]`
    pub fn max_speed_in_range(&self, begin_pos: f64, end_pos: f64) -> f64 {
        let begin_pos = begin_pos.clamp(self.begin_pos(), self.end_pos());
        let end_pos = end_pos.clamp(self.begin_pos(), self.end_pos());
        let begin_index = self.find_right(begin_pos).unwrap_or(0);
        let end_index = self.find_left(end_pos).unwrap_or(self.parts.len() - 1);
        let edges = self.parts[begin_index]
            .interpolate_speed(begin_pos)
            .max(self.parts[end_index].interpolate_speed(end_pos));
        self.parts[begin_index..=end_index.max(begin_index)]
            .iter()
            .flat_map(|part| part.positions().iter().zip(part.speeds()))
            .filter(|(pos, _)| **pos >= begin_pos && **pos <= end_pos)
            .map(|(_, speed)| *speed)
            .fold(edges, f64::max)
    }

    /// Time from the beginning of the envelope to a position. Refused on non continuous envelopes.
    pub fn interpolate_total_time(&self, position: f64) -> EnvelopeResult<f64> {
        if !self.continuous {
            return Err(EnvelopeError::NotContinuous);
        }
        let part_index = self.find_left_clamped(position).ok_or_else(|| {
            EnvelopeError::InvalidPart(format!(
                "position {position} is out of the envelope [{}, {}]",
                self.begin_pos(),
                self.end_pos()
            ))
        })?;
        Ok(self.cumulative_times[part_index]
            + self.parts[part_index].interpolate_total_time(position))
    }

    /// Same as [`Envelope::interpolate_total_time`], clamping the position to the envelope
    pub fn interpolate_total_time_clamp(&self, position: f64) -> EnvelopeResult<f64> {
        self.interpolate_total_time(position.clamp(self.begin_pos(), self.end_pos()))
    }

    /// Time needed to go from `begin_pos` to `end_pos`
    pub fn time_between(&self, begin_pos: f64, end_pos: f64) -> EnvelopeResult<f64> {
        Ok(self.interpolate_total_time(end_pos)? - self.interpolate_total_time(begin_pos)?)
    }

    // endregion

    // region slicing

    /// Cuts the envelope between two positions, interpolating new points if required
    pub fn slice(&self, begin_pos: f64, end_pos: f64) -> EnvelopeResult<Vec<EnvelopePart>> {
        self.slice_with_speeds(begin_pos, None, end_pos, None)
    }

    /// Cuts the envelope between two positions, with optionally imposed edge speeds
    pub fn slice_with_speeds(
        &self,
        begin_pos: f64,
        begin_speed: Option<f64>,
        end_pos: f64,
        end_speed: Option<f64>,
    ) -> EnvelopeResult<Vec<EnvelopePart>> {
        if begin_pos >= end_pos {
            return Ok(vec![]);
        }
        let begin = if begin_pos <= self.begin_pos() {
            (0, 0, None)
        } else {
            match self.find_right(begin_pos) {
                Some(part_index) => {
                    let part = &self.parts[part_index];
                    (part_index, part.find_right(begin_pos).unwrap_or(0), Some(begin_pos))
                }
                None => return Ok(vec![]),
            }
        };
        let end = if end_pos >= self.end_pos() {
            let last = self.parts.len() - 1;
            (last, self.parts[last].step_count() - 1, None)
        } else {
            match self.find_left(end_pos) {
                Some(part_index) => {
                    let part = &self.parts[part_index];
                    (
                        part_index,
                        part.find_left(end_pos).unwrap_or(part.step_count() - 1),
                        Some(end_pos),
                    )
                }
                None => return Ok(vec![]),
            }
        };
        self.slice_parts(begin, begin_speed, end, end_speed)
    }

    /// Cuts the envelope. Bounds are (part index, step index, position in the step
    /// or `None` for the edge of the step).
    pub(crate) fn slice_parts(
        &self,
        (begin_part, begin_step, begin_pos): (usize, usize, Option<f64>),
        begin_speed: Option<f64>,
        (end_part, end_step, end_pos): (usize, usize, Option<f64>),
        end_speed: Option<f64>,
    ) -> EnvelopeResult<Vec<EnvelopePart>> {
        if begin_part > end_part {
            return Ok(vec![]);
        }
        if begin_part == end_part {
            return Ok(self.parts[begin_part]
                .slice_steps(
                    (begin_step, begin_pos),
                    begin_speed,
                    (end_step, end_pos),
                    end_speed,
                )?
                .into_iter()
                .collect());
        }
        let first = &self.parts[begin_part];
        let last = &self.parts[end_part];
        let mut res = Vec::with_capacity(end_part - begin_part + 1);
        if let Some(sliced) = first.slice_steps(
            (begin_step, begin_pos),
            begin_speed,
            (first.step_count() - 1, None),
            None,
        )? {
            res.push(sliced);
        }
        res.extend(self.parts[begin_part + 1..end_part].iter().cloned());
        if let Some(sliced) = last.slice_steps((0, None), None, (end_step, end_pos), end_speed)? {
            res.push(sliced);
        }
        Ok(res)
    }

    // endregion

    /// All points of the envelope, with the time needed to reach each of them.
    /// Part transitions appear twice, once per part.
    pub fn iterate_points(&self) -> Vec<EnvelopePoint> {
        let mut res = Vec::new();
        for (part_index, part) in self.parts.iter().enumerate() {
            let part_start_time = self.cumulative_times[part_index];
            for point in 0..part.point_count() {
                res.push(EnvelopePoint {
                    time: part_start_time + part.total_time_at(point),
                    position: part.point_pos(point),
                    speed: part.point_speed(point),
                });
            }
        }
        res
    }

    /// Writes all points of the envelope as CSV, with a `time,position,speed` header
    pub fn write_points_csv<W: std::io::Write>(&self, wtr: W) -> anyhow::Result<()> {
        let mut wtr = csv::Writer::from_writer(wtr);
        for point in self.iterate_points() {
            wtr.serialize(point)
                .with_context(|| format_dbg!(point))?;
        }
        wtr.flush()?;
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Envelope {
    type Item = &'a EnvelopePart;
    type IntoIter = std::slice::Iter<'a, EnvelopePart>;

    fn into_iter(self) -> Self::IntoIter {
        self.parts.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use crate::utils::almost_eq;

    #[test]
    fn test_not_contiguous() {
        let res = Envelope::new(vec![
            constant_part(0., 100., 10.),
            constant_part(101., 200., 10.),
        ]);
        assert!(matches!(res, Err(EnvelopeError::PartsNotContiguous { .. })));
        assert!(Envelope::new(vec![]).is_err());
    }

    #[test]
    fn test_continuity() {
        let continuous = Envelope::new(vec![
            constant_part(0., 100., 10.),
            constant_part(100. + 1e-7, 200., 10. + 1e-6),
        ])
        .unwrap();
        assert!(continuous.is_continuous());
        let steps = Envelope::new(vec![
            constant_part(0., 100., 10.),
            constant_part(100., 200., 20.),
        ])
        .unwrap();
        assert!(!steps.is_continuous());
        assert_eq!(steps.interpolate_speed(50.), Err(EnvelopeError::NotContinuous));
        assert_eq!(steps.interpolate_total_time(50.), Err(EnvelopeError::NotContinuous));
        assert!(matches!(
            Envelope::new_continuous(steps.parts().to_vec(), "test"),
            Err(EnvelopeError::Discontinuity { .. })
        ));
    }

    #[test]
    fn test_directional_interpolation() {
        let steps = Envelope::new(vec![
            constant_part(0., 100., 10.),
            constant_part(100., 200., 20.),
        ])
        .unwrap();
        assert_eq!(steps.interpolate_speed_left_dir(100., 1.), 10.);
        assert_eq!(steps.interpolate_speed_right_dir(100., 1.), 20.);
        assert_eq!(steps.interpolate_speed_left_dir(100., -1.), 20.);
        assert_eq!(steps.interpolate_speed_right_dir(100., -1.), 10.);
        assert_eq!(steps.max_speed_in_range(0., 100.), 10.);
        assert_eq!(steps.max_speed_in_range(0., 150.), 20.);
    }

    #[test]
    fn test_times() {
        let envelope = Envelope::new(vec![
            accelerating_part(0., 0., 0.5, 100.),
            constant_part(100., 200., 10.),
        ])
        .unwrap();
        assert!(envelope.is_continuous());
        assert!(almost_eq(envelope.total_time(), 30., None));
        assert!(almost_eq(envelope.cumulative_time(1), 20., None));
        assert!(almost_eq(envelope.interpolate_total_time(150.).unwrap(), 25., None));
        assert!(almost_eq(envelope.time_between(25., 150.).unwrap(), 15., None));
        assert!(almost_eq(envelope.interpolate_speed(25.).unwrap(), 5., Some(1e-6)));
        assert_eq!(envelope.max_speed(), 10.);
        assert_eq!(envelope.min_speed(), 0.);
        assert_eq!(envelope.total_distance(), 200.);
    }

    #[test]
    fn test_slice() {
        let envelope = Envelope::new(vec![
            accelerating_part(0., 0., 0.5, 100.),
            constant_part(100., 200., 10.),
            constant_part(200., 300., 10.),
        ])
        .unwrap();
        let sliced = envelope.slice(50., 250.).unwrap();
        assert_eq!(sliced.len(), 3);
        assert_eq!(sliced[0].begin_pos(), 50.);
        assert_eq!(sliced[2].end_pos(), 250.);
        let sliced = Envelope::new(sliced).unwrap();
        assert!(almost_eq(
            sliced.total_time(),
            envelope.time_between(50., 250.).unwrap(),
            None
        ));

        let inner = envelope.slice(120., 180.).unwrap();
        assert_eq!(inner.len(), 1);
        assert!(envelope.slice(100., 100.).unwrap().is_empty());
        assert_eq!(envelope.slice(100., 200.).unwrap(), vec![envelope.get(1).clone()]);

        let forced = envelope.slice_with_speeds(150., Some(5.), 250., Some(8.)).unwrap();
        assert_eq!(forced[0].begin_speed(), 5.);
        assert_eq!(forced[forced.len() - 1].end_speed(), 8.);
    }

    #[test]
    fn test_iterate_points_and_csv() {
        let envelope = Envelope::new(vec![
            constant_part(0., 100., 10.),
            constant_part(100., 200., 10.),
        ])
        .unwrap();
        let points = envelope.iterate_points();
        assert_eq!(points.len(), 4);
        assert_eq!(points[3].time, 20.);
        let mut buf = Vec::new();
        envelope.write_points_csv(&mut buf).unwrap();
        let csv = String::from_utf8(buf).unwrap();
        assert!(csv.starts_with("time,position,speed\n"));
        assert_eq!(csv.lines().count(), 5);
    }

    #[test]
    fn test_serde_api() {
        let envelope = Envelope::new(vec![
            constant_part(0., 100., 10.),
            constant_part(100., 200., 20.),
        ])
        .unwrap();
        let yaml = envelope.to_yaml().unwrap();
        assert_eq!(Envelope::from_yaml(yaml).unwrap(), envelope);
        let json = envelope.to_json().unwrap();
        assert_eq!(Envelope::from_json(json).unwrap(), envelope);
        assert!(Envelope::from_json("[]").is_err());
    }

    #[test]
    fn test_json_keeps_curved_parts() {
        let envelope = Envelope::new(vec![
            accelerating_part(0., 0., 0.7, 450.),
            constant_part(450., 700., (2. * 0.7 * 450_f64).sqrt()),
            braking_part(700., (2. * 0.7 * 450_f64).sqrt(), 0.45, 1000.),
        ])
        .unwrap();
        let json = envelope.to_json().unwrap();
        let loaded = Envelope::from_json(json).unwrap();
        assert_eq!(loaded, envelope);
        assert_eq!(loaded.iterate_points(), envelope.iterate_points());
    }
}
