use super::attrs::{EnvelopeAttrs, EnvelopeProfile, PhysicalMeaning};
use super::physics::Step;
use super::{Envelope, EnvelopePart};
use crate::imports::*;

/// Receives the points of a curve produced by an integrator
pub trait StepConsumer {
    /// Starts a new curve. Returns false if the curve cannot start here.
    fn init_envelope_part(&mut self, position: f64, speed: f64, direction: f64) -> bool;

    /// Adds a point to the curve. Returns false if the curve is complete,
    /// and no more points can be added.
    fn add_step(&mut self, position: f64, speed: f64) -> bool;
}

/// Accumulates the points of an envelope part, in either direction
#[derive(Debug, Clone, Default)]
pub struct EnvelopePartBuilder {
    attrs: EnvelopeAttrs,
    positions: Vec<f64>,
    speeds: Vec<f64>,
    time_deltas: Vec<f64>,
    direction: f64,
}

impl EnvelopePartBuilder {
    pub fn new() -> Self {
        Self {
            direction: 1.,
            ..Default::default()
        }
    }

    pub fn set_attrs(&mut self, attrs: EnvelopeAttrs) {
        self.attrs = attrs;
    }

    pub fn set_profile(&mut self, profile: EnvelopeProfile) {
        self.attrs.profile = Some(profile);
    }

    pub fn set_meaning(&mut self, meaning: PhysicalMeaning) {
        self.attrs.meaning = Some(meaning);
    }

    pub fn attrs(&self) -> &EnvelopeAttrs {
        &self.attrs
    }

    pub fn direction(&self) -> f64 {
        self.direction
    }

    /// Number of steps added so far
    pub fn step_count(&self) -> usize {
        self.time_deltas.len()
    }

    /// True when no step was added. An empty builder means the curve does not exist.
    pub fn is_empty(&self) -> bool {
        self.time_deltas.is_empty()
    }

    pub fn last_pos(&self) -> Option<f64> {
        self.positions.last().copied()
    }

    pub fn last_speed(&self) -> Option<f64> {
        self.speeds.last().copied()
    }

    /// Adds a point with a known step time
    pub fn add_step_with_time(&mut self, position: f64, speed: f64, time_delta: f64) {
        self.positions.push(position);
        self.speeds.push(speed);
        self.time_deltas.push(time_delta);
    }

    /// Creates the envelope part. Parts built backward are reversed.
    pub fn build(mut self) -> EnvelopeResult<EnvelopePart> {
        if self.direction < 0. {
            self.positions.reverse();
            self.speeds.reverse();
            self.time_deltas.reverse();
        }
        EnvelopePart::new(self.attrs, self.positions, self.speeds, self.time_deltas)
    }
}

impl StepConsumer for EnvelopePartBuilder {
    fn init_envelope_part(&mut self, position: f64, speed: f64, direction: f64) -> bool {
        self.positions = vec![position];
        self.speeds = vec![speed];
        self.time_deltas.clear();
        self.direction = if direction < 0. { -1. } else { 1. };
        true
    }

    fn add_step(&mut self, position: f64, speed: f64) -> bool {
        match (self.last_pos(), self.last_speed()) {
            (Some(last_pos), Some(last_speed)) => {
                let time_delta = Step::new(last_pos, last_speed, position, speed).time();
                self.add_step_with_time(position, speed, time_delta);
            }
            _ => {
                self.init_envelope_part(position, speed, self.direction);
            }
        }
        true
    }
}

/// Concatenates envelope parts into an envelope
#[derive(Debug, Clone, Default)]
pub struct EnvelopeBuilder {
    parts: Vec<EnvelopePart>,
}

impl EnvelopeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_part(&mut self, part: EnvelopePart) {
        self.parts.push(part);
    }

    pub fn add_parts<I: IntoIterator<Item = EnvelopePart>>(&mut self, parts: I) {
        self.parts.extend(parts);
    }

    pub fn add_envelope(&mut self, envelope: &Envelope) {
        self.parts.extend(envelope.iter().cloned());
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Creates the envelope, checking contiguity
    pub fn build(self) -> EnvelopeResult<Envelope> {
        Envelope::new(self.parts)
    }

    /// Creates the envelope, failing with [`EnvelopeError::Discontinuity`] if it is not continuous
    pub fn build_continuous(self, context: &str) -> EnvelopeResult<Envelope> {
        Envelope::new_continuous(self.parts, context)
    }
}
