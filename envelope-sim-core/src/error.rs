//! Errors raised while building envelopes and applying allowances.

use std::fmt;

use thiserror::Error;

use crate::allowances::AllowanceDistribution;

pub type EnvelopeResult<T> = Result<T, EnvelopeError>;

/// Why an allowance search could not reach its target time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConvergenceError {
    /// The requested time cannot be added: the train would have to run slower than allowed
    #[error("too much time was requested, the allowance cannot be applied")]
    TooMuchTime,
    /// The requested time is too small to be absorbed
    #[error("not enough time was requested, the allowance cannot be applied")]
    NotEnoughTime,
    /// Both search bounds moved without converging: the running time is not continuous in the search input
    #[error("the allowance search met a discontinuity and did not converge")]
    Discontinuity,
}

/// Range and section of an allowance where a computation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowanceLocation {
    pub distribution: AllowanceDistribution,
    /// Index of the range, in path order
    pub range: usize,
    /// Index of the section in the range, `None` when the whole range failed
    pub section: Option<usize>,
}

impl fmt::Display for AllowanceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} allowance, range {}", self.distribution, self.range + 1)?;
        if let Some(section) = self.section {
            write!(f, ", section {}", section + 1)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvelopeError {
    #[error(transparent)]
    Convergence(#[from] ConvergenceError),
    /// A result that had to be continuous is not
    #[error("discontinuity in the envelope: {context}")]
    Discontinuity { context: String },
    #[error("envelope parts are not contiguous: part ends at {end} but the next one begins at {begin}")]
    PartsNotContiguous { end: f64, begin: f64 },
    #[error("invalid envelope part: {0}")]
    InvalidPart(String),
    #[error("the envelope is not continuous, speeds and times cannot be interpolated")]
    NotContinuous,
    #[error("allowance [{begin}, {end}] is outside the envelope [{envelope_begin}, {envelope_end}]")]
    AllowanceOutOfBounds {
        begin: f64,
        end: f64,
        envelope_begin: f64,
        envelope_end: f64,
    },
    #[error("allowance range [{begin}, {end}] is outside the allowance [{allowance_begin}, {allowance_end}]")]
    AllowanceRangeOutOfBounds {
        begin: f64,
        end: f64,
        allowance_begin: f64,
        allowance_end: f64,
    },
    #[error("{location}: {source}")]
    InAllowance {
        location: AllowanceLocation,
        #[source]
        source: Box<EnvelopeError>,
    },
}

impl EnvelopeError {
    pub fn discontinuity<S: Into<String>>(context: S) -> Self {
        Self::Discontinuity {
            context: context.into(),
        }
    }

    /// Returns true if the error comes from a request the caller can fix,
    /// false if it reveals an internal failure
    pub fn is_user_error(&self) -> bool {
        match self {
            Self::InAllowance { source, .. } => source.is_user_error(),
            _ => matches!(
                self,
                Self::Convergence(ConvergenceError::TooMuchTime | ConvergenceError::NotEnoughTime)
                    | Self::AllowanceOutOfBounds { .. }
                    | Self::AllowanceRangeOutOfBounds { .. }
            ),
        }
    }

    pub fn convergence(&self) -> Option<ConvergenceError> {
        match self {
            Self::Convergence(err) => Some(*err),
            Self::InAllowance { source, .. } => source.convergence(),
            _ => None,
        }
    }

    /// Allowance range and section the error was raised in, if any
    pub fn location(&self) -> Option<&AllowanceLocation> {
        match self {
            Self::InAllowance { location, .. } => Some(location),
            _ => None,
        }
    }

    /// Attaches the allowance location to the error, keeping the innermost one
    pub fn in_allowance(self, location: AllowanceLocation) -> Self {
        match self {
            Self::InAllowance { .. } => self,
            _ => Self::InAllowance {
                location,
                source: Box::new(self),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_error_classification() {
        assert!(EnvelopeError::from(ConvergenceError::TooMuchTime).is_user_error());
        assert!(EnvelopeError::from(ConvergenceError::NotEnoughTime).is_user_error());
        assert!(!EnvelopeError::from(ConvergenceError::Discontinuity).is_user_error());
        assert!(!EnvelopeError::discontinuity("left junction").is_user_error());
        assert!(!EnvelopeError::NotContinuous.is_user_error());
        assert!(EnvelopeError::AllowanceOutOfBounds {
            begin: -1.0,
            end: 10.0,
            envelope_begin: 0.0,
            envelope_end: 10.0
        }
        .is_user_error());
    }

    #[test]
    fn test_display() {
        let err = EnvelopeError::discontinuity("range 2");
        assert_eq!(err.to_string(), "discontinuity in the envelope: range 2");
        assert_eq!(
            err.convergence(),
            None,
        );
        assert_eq!(
            EnvelopeError::from(ConvergenceError::TooMuchTime).convergence(),
            Some(ConvergenceError::TooMuchTime)
        );
    }

    #[test]
    fn test_allowance_location() {
        let location = AllowanceLocation {
            distribution: AllowanceDistribution::Linear,
            range: 1,
            section: Some(0),
        };
        let err = EnvelopeError::from(ConvergenceError::NotEnoughTime).in_allowance(location);
        assert_eq!(err.location(), Some(&location));
        assert_eq!(err.convergence(), Some(ConvergenceError::NotEnoughTime));
        assert!(err.is_user_error());
        assert_eq!(
            err.to_string(),
            "Linear allowance, range 2, section 1: not enough time was requested, the allowance cannot be applied"
        );
        assert!(std::error::Error::source(&err).is_some());

        // the innermost location is kept
        let outer = AllowanceLocation {
            section: None,
            ..location
        };
        assert_eq!(err.clone().in_allowance(outer).location(), Some(&location));

        let internal = EnvelopeError::discontinuity("left junction").in_allowance(outer);
        assert!(!internal.is_user_error());
        assert_eq!(internal.convergence(), None);
        assert!(internal.to_string().starts_with("Linear allowance, range 2: "));
    }
}
