use super::{Envelope, EnvelopePart};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStepResult {
    NextStep,
    NextPart,
    ReachedEnd,
}

/// Scans an envelope part by part and step by step, forward or backward
#[derive(Debug, Clone)]
pub struct EnvelopeCursor<'a> {
    envelope: &'a Envelope,
    reverse: bool,
    /// `None` once the end was reached
    part_index: Option<usize>,
    step_index: usize,
    position: f64,
}

impl<'a> EnvelopeCursor<'a> {
    pub fn new(envelope: &'a Envelope, reverse: bool) -> Self {
        let part_index = if reverse { envelope.len() - 1 } else { 0 };
        let part = envelope.get(part_index);
        let step_index = if reverse { part.step_count() - 1 } else { 0 };
        let position = if reverse {
            part.step_end_pos(step_index)
        } else {
            part.step_begin_pos(step_index)
        };
        Self {
            envelope,
            reverse,
            part_index: Some(part_index),
            step_index,
            position,
        }
    }

    pub fn forward(envelope: &'a Envelope) -> Self {
        Self::new(envelope, false)
    }

    pub fn backward(envelope: &'a Envelope) -> Self {
        Self::new(envelope, true)
    }

    pub fn envelope(&self) -> &'a Envelope {
        self.envelope
    }

    pub fn is_reverse(&self) -> bool {
        self.reverse
    }

    pub fn has_reached_end(&self) -> bool {
        self.part_index.is_none()
    }

    pub fn part_index(&self) -> Option<usize> {
        self.part_index
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn part(&self) -> Option<&'a EnvelopePart> {
        self.part_index.map(|idx| self.envelope.get(idx))
    }

    /// Current position, NaN once the end was reached
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Speed at the current position, NaN once the end was reached
    pub fn speed(&self) -> f64 {
        match self.part() {
            Some(part) => part.interpolate_speed_at_step(self.step_index, self.position),
            None => f64::NAN,
        }
    }

    fn step_edge(&self, end: bool) -> (f64, f64) {
        match self.part() {
            Some(part) => {
                // the beginning of a step in the direction of the cursor
                if end == self.reverse {
                    (
                        part.step_begin_pos(self.step_index),
                        part.step_begin_speed(self.step_index),
                    )
                } else {
                    (
                        part.step_end_pos(self.step_index),
                        part.step_end_speed(self.step_index),
                    )
                }
            }
            None => (f64::NAN, f64::NAN),
        }
    }

    pub fn step_begin_pos(&self) -> f64 {
        self.step_edge(false).0
    }

    pub fn step_begin_speed(&self) -> f64 {
        self.step_edge(false).1
    }

    pub fn step_end_pos(&self) -> f64 {
        self.step_edge(true).0
    }

    pub fn step_end_speed(&self) -> f64 {
        self.step_edge(true).1
    }

    fn part_end_pos(&self, part: &EnvelopePart) -> f64 {
        if self.reverse {
            part.begin_pos()
        } else {
            part.end_pos()
        }
    }

    /// Compares positions along the direction of the cursor
    pub fn compare_pos(&self, a: f64, b: f64) -> f64 {
        if self.reverse {
            b - a
        } else {
            a - b
        }
    }

    pub fn move_to_end(&mut self) {
        self.part_index = None;
        self.step_index = 0;
        self.position = f64::NAN;
    }

    fn next_index(&self, current: usize, size: usize) -> Option<usize> {
        if self.reverse {
            current.checked_sub(1)
        } else if current + 1 < size {
            Some(current + 1)
        } else {
            None
        }
    }

    /// Index of the next part in the direction of the cursor
    pub fn next_part_index(&self) -> Option<usize> {
        self.part_index
            .and_then(|idx| self.next_index(idx, self.envelope.len()))
    }

    /// Moves the cursor to the beginning of the next part
    pub fn next_part(&mut self) -> bool {
        if self.has_reached_end() {
            return false;
        }
        match self.next_part_index() {
            Some(idx) => {
                let part = self.envelope.get(idx);
                self.part_index = Some(idx);
                self.step_index = if self.reverse { part.step_count() - 1 } else { 0 };
                self.position = self.step_begin_pos();
                true
            }
            None => {
                self.move_to_end();
                false
            }
        }
    }

    /// Moves the cursor to the beginning of the next step
    pub fn next_step(&mut self) -> NextStepResult {
        let part = match self.part() {
            Some(part) => part,
            None => return NextStepResult::ReachedEnd,
        };
        match self.next_index(self.step_index, part.step_count()) {
            Some(idx) => {
                self.step_index = idx;
                self.position = self.step_begin_pos();
                NextStepResult::NextStep
            }
            None => {
                if self.next_part() {
                    NextStepResult::NextPart
                } else {
                    NextStepResult::ReachedEnd
                }
            }
        }
    }

    /// Moves the cursor forward to a position, returns false if the envelope ends before it
    pub fn find_position(&mut self, position: f64) -> bool {
        let part = match self.part() {
            Some(part) => part,
            None => return false,
        };
        debug_assert!(self.compare_pos(position, self.position) >= 0.);

        let mut part = part;
        while self.compare_pos(self.part_end_pos(part), position) < 0. {
            if !self.next_part() {
                return false;
            }
            part = match self.part() {
                Some(part) => part,
                None => return false,
            };
        }
        while self.compare_pos(self.step_end_pos(), position) < 0. {
            if self.next_step() == NextStepResult::ReachedEnd {
                return false;
            }
        }
        self.position = position;
        true
    }

    /// Moves the cursor to the next part matching a predicate, starting with the current part
    pub fn find_part<P: FnMut(&EnvelopePart) -> bool>(&mut self, mut predicate: P) -> bool {
        loop {
            match self.part() {
                Some(part) if predicate(part) => return true,
                Some(_) => {
                    if !self.next_part() {
                        return false;
                    }
                }
                None => return false,
            }
        }
    }

    /// Moves the cursor to the end of the next part whose transition to the following
    /// part matches a predicate. The predicate gets the position and speed at the end of
    /// the current part, then the position and speed at the beginning of the next one.
    pub fn find_part_transition<P>(&mut self, mut predicate: P) -> bool
    where
        P: FnMut(f64, f64, f64, f64) -> bool,
    {
        loop {
            let (part, next_part) = match (self.part(), self.next_part_index()) {
                (Some(part), Some(next)) => (part, self.envelope.get(next)),
                _ => return false,
            };
            let (cur_pos, cur_speed, next_pos, next_speed) = if self.reverse {
                (
                    part.begin_pos(),
                    part.begin_speed(),
                    next_part.end_pos(),
                    next_part.end_speed(),
                )
            } else {
                (
                    part.end_pos(),
                    part.end_speed(),
                    next_part.begin_pos(),
                    next_part.begin_speed(),
                )
            };
            self.step_index = if self.reverse { 0 } else { part.step_count() - 1 };
            self.position = cur_pos;
            if predicate(cur_pos, cur_speed, next_pos, next_speed) {
                return true;
            }
            if !self.next_part() {
                return false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    fn three_parts() -> Envelope {
        envelope(vec![
            accelerating_part(0., 0., 0.5, 100.),
            constant_part(100., 200., 10.),
            constant_part(200., 300., 5.),
        ])
    }

    #[test]
    fn test_forward_scan() {
        let envelope = three_parts();
        let mut cursor = EnvelopeCursor::forward(&envelope);
        assert_eq!(cursor.position(), 0.);
        assert_eq!(cursor.part_index(), Some(0));
        let mut steps = 0;
        loop {
            match cursor.next_step() {
                NextStepResult::ReachedEnd => break,
                _ => steps += 1,
            }
        }
        let total_steps: usize = envelope.iter().map(|p| p.step_count()).sum();
        assert_eq!(steps, total_steps - 1);
        assert!(cursor.has_reached_end());
        assert!(cursor.position().is_nan());
        assert!(!cursor.next_part());
    }

    #[test]
    fn test_find_position() {
        let envelope = three_parts();
        let mut cursor = EnvelopeCursor::forward(&envelope);
        assert!(cursor.find_position(150.));
        assert_eq!(cursor.part_index(), Some(1));
        assert_eq!(cursor.speed(), 10.);
        assert!(cursor.find_position(250.));
        assert_eq!(cursor.speed(), 5.);
        assert!(!cursor.find_position(400.));

        let mut cursor = EnvelopeCursor::backward(&envelope);
        assert_eq!(cursor.position(), 300.);
        assert!(cursor.find_position(150.));
        assert_eq!(cursor.part_index(), Some(1));
        assert_eq!(cursor.step_begin_pos(), 200.);
        assert_eq!(cursor.step_end_pos(), 100.);
    }

    #[test]
    fn test_find_part() {
        let envelope = three_parts();
        let mut cursor = EnvelopeCursor::forward(&envelope);
        assert!(cursor.find_part(|part| part.begin_speed() == 5.));
        assert_eq!(cursor.part_index(), Some(2));
        assert_eq!(cursor.position(), 200.);
        assert!(!cursor.next_part());
        assert!(!cursor.find_part(|_| true));
    }

    #[test]
    fn test_find_part_transition() {
        let envelope = three_parts();
        let mut cursor = EnvelopeCursor::forward(&envelope);
        assert!(cursor.find_part_transition(|_, cur_speed, _, next_speed| next_speed < cur_speed));
        assert_eq!(cursor.position(), 200.);
        assert_eq!(cursor.part_index(), Some(1));

        let mut cursor = EnvelopeCursor::backward(&envelope);
        assert!(cursor.find_part_transition(|_, cur_speed, _, next_speed| next_speed > cur_speed));
        assert_eq!(cursor.position(), 200.);
        assert_eq!(cursor.part_index(), Some(2));
        assert!(cursor.next_part());
        assert!(!cursor.find_part_transition(|_, cur_speed, _, next_speed| next_speed > cur_speed));
    }
}
