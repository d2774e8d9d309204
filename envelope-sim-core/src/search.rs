//! Binary search over the input of a monotonic function, driven by feedback of its output.

use crate::imports::*;

/// Why a search did not complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchFailure {
    /// Every output was on the low bound side of the target
    LowBoundNeverRaised,
    /// Every output was on the high bound side of the target
    HighBoundNeverLowered,
    /// Both bounds moved, but the output jumped over the target
    Discontinuity,
}

/// Searches the input for which a monotonic function reaches a target.
///
/// The caller evaluates the function at [`DoubleBinarySearch::input`] and gives the
/// output back through [`DoubleBinarySearch::feedback`], until the search is complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoubleBinarySearch {
    low_bound: f64,
    high_bound: f64,
    target: f64,
    tolerance: f64,
    /// whether the function decreases when the input increases
    decreasing: bool,
    input: f64,
    has_raised_low_bound: bool,
    has_lowered_high_bound: bool,
    complete: bool,
}

impl DoubleBinarySearch {
    pub fn new(low_bound: f64, high_bound: f64, target: f64, tolerance: f64, decreasing: bool) -> Self {
        debug_assert!(tolerance >= 0.);
        Self {
            low_bound,
            high_bound,
            target,
            tolerance,
            decreasing,
            input: (low_bound + high_bound) / 2.,
            has_raised_low_bound: false,
            has_lowered_high_bound: false,
            complete: false,
        }
    }

    /// Next input to evaluate
    pub fn input(&self) -> f64 {
        self.input
    }

    pub fn low_bound(&self) -> f64 {
        self.low_bound
    }

    pub fn high_bound(&self) -> f64 {
        self.high_bound
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn has_raised_low_bound(&self) -> bool {
        self.has_raised_low_bound
    }

    pub fn has_lowered_high_bound(&self) -> bool {
        self.has_lowered_high_bound
    }

    /// Updates the bounds with the output of the function for the current input
    pub fn feedback(&mut self, output: f64) {
        if self.complete {
            return;
        }
        if (output - self.target).abs() <= self.tolerance {
            self.complete = true;
            return;
        }
        if (output < self.target) != self.decreasing {
            self.low_bound = self.input;
            self.has_raised_low_bound = true;
        } else {
            self.high_bound = self.input;
            self.has_lowered_high_bound = true;
        }
        self.input = (self.low_bound + self.high_bound) / 2.;
    }

    /// Why the search did not complete, `None` if it did
    pub fn failure(&self) -> Option<SearchFailure> {
        if self.complete {
            None
        } else if !self.has_raised_low_bound {
            Some(SearchFailure::LowBoundNeverRaised)
        } else if !self.has_lowered_high_bound {
            Some(SearchFailure::HighBoundNeverLowered)
        } else {
            Some(SearchFailure::Discontinuity)
        }
    }
}
