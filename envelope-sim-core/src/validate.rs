//! Validation of simulation inputs: every error found is collected, nested
//! under the context of the object that holds the faulty field.

use crate::imports::*;
use std::fmt::{Debug, Display};
use std::ops::{Deref, DerefMut};

pub type ValidationError = anyhow::Error;
pub type ValidationErrors = ComboErrors<ValidationError>;
pub type ValidationResults = Result<(), ValidationErrors>;

/// One error and its nesting depth
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ComboError<E: Display> {
    layer: usize,
    error: E,
}

impl<E: Debug + Display> ComboError<E> {
    pub fn new(error: E) -> Self {
        Self { layer: 0, error }
    }
}

impl<E: Debug + Display> Deref for ComboError<E> {
    type Target = E;
    fn deref(&self) -> &E {
        &self.error
    }
}

/// Errors collected while validating an object
pub struct ComboErrors<E: Debug + Display>(Vec<ComboError<E>>);

impl<E: Debug + Display> ComboErrors<E> {
    #[inline]
    pub fn new() -> Self {
        ComboErrors(vec![])
    }

    /// Nests every error collected so far under `error_add`
    #[inline]
    pub fn add_context(&mut self, error_add: E) {
        for error in &mut self.0 {
            error.layer += 1;
        }
        self.0.insert(0, ComboError::<E>::new(error_add));
    }

    #[inline]
    pub fn push(&mut self, error_add: E) {
        self.0.push(ComboError::<E>::new(error_add));
    }

    #[inline]
    pub fn make_err(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl<E: Debug + Display> Default for ComboErrors<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Debug + Display> Deref for ComboErrors<E> {
    type Target = Vec<ComboError<E>>;
    fn deref(&self) -> &Vec<ComboError<E>> {
        &self.0
    }
}

impl<E: Debug + Display> DerefMut for ComboErrors<E> {
    fn deref_mut(&mut self) -> &mut Vec<ComboError<E>> {
        &mut self.0
    }
}

impl<E: Debug + Display> std::error::Error for ComboErrors<E> {}

impl<E: Debug + Display> Display for ComboErrors<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Validation errors:")?;
        for error in &self.0 {
            writeln!(f, "{}- {}", "  ".repeat(error.layer), error.error)?;
        }
        Ok(())
    }
}

impl<E: Debug + Display> Debug for ComboErrors<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

/// Objects that can check their own consistency
pub trait ObjState {
    fn validate(&self) -> ValidationResults {
        Ok(())
    }

    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Validates every element of `slice`, nesting their errors under the element index
pub fn validate_slice<T>(errors: &mut ValidationErrors, slice: &[T], elem_name: &str)
where
    T: ObjState,
{
    for (index, val) in slice.iter().enumerate() {
        if let Err(mut errors_add) = val.validate() {
            errors_add.add_context(anyhow!("{} at index = {} must be valid!", elem_name, index));
            errors.append(&mut errors_add);
        }
    }
}

/// Validates a nested field, nesting its errors under the field name
pub fn validate_field<T>(errors: &mut ValidationErrors, field_val: &T, field_name: &str)
where
    T: ObjState,
{
    if let Err(mut errors_add) = field_val.validate() {
        errors_add.add_context(anyhow!("{} must be valid!", field_name));
        errors.append(&mut errors_add);
    }
}

pub fn chk_num_fin(errors: &mut ValidationErrors, field_val: f64, field_name: &str) {
    if !field_val.is_finite() {
        errors.push(anyhow!(
            "{} = {:?} must be a finite number!",
            field_name,
            field_val
        ));
    }
}

/// Check that value is greater than or equal to zero and finite
pub fn chk_num_gez_fin(errors: &mut ValidationErrors, field_val: f64, field_name: &str) {
    if !(field_val >= 0.0 && field_val.is_finite()) {
        errors.push(anyhow!(
            "{} = {:?} must be a finite positive number!",
            field_name,
            field_val
        ));
    }
}

/// Check that value is strictly greater than zero and finite
pub fn chk_num_gtz_fin(errors: &mut ValidationErrors, field_val: f64, field_name: &str) {
    if !(field_val > 0.0 && field_val.is_finite()) {
        errors.push(anyhow!(
            "{} = {:?} must be a finite number larger than zero!",
            field_name,
            field_val
        ));
    }
}

macro_rules! early_err {
    ($errors:expr, $name:expr) => {
        if !$errors.is_empty() {
            $errors.push(anyhow!("{} validation unfinished!", $name));
            return Err($errors);
        }
    };
}

pub(crate) use early_err;

#[cfg(test)]
mod tests {
    use super::*;

    struct Leaf(f64);

    impl ObjState for Leaf {
        fn validate(&self) -> ValidationResults {
            let mut errors = ValidationErrors::new();
            chk_num_gtz_fin(&mut errors, self.0, "Leaf value");
            errors.make_err()
        }
    }

    #[test]
    fn test_nested_context() {
        let leaves = vec![Leaf(1.0), Leaf(-1.0), Leaf(f64::NAN)];
        let mut errors = ValidationErrors::new();
        validate_slice(&mut errors, &leaves, "Leaf");
        assert_eq!(errors.len(), 4);
        let msg = format!("{errors}");
        assert!(msg.contains("Leaf at index = 1 must be valid!"));
        assert!(msg.contains("    - Leaf value = -1.0") || msg.contains("  - Leaf value = -1.0"));
    }

    #[test]
    fn test_checks() {
        let mut errors = ValidationErrors::new();
        chk_num_gez_fin(&mut errors, 0.0, "zero");
        chk_num_fin(&mut errors, 1.0, "one");
        assert!(errors.is_empty());
        chk_num_gez_fin(&mut errors, -1e-3, "negative");
        chk_num_fin(&mut errors, f64::INFINITY, "inf");
        assert_eq!(errors.len(), 2);
        assert!(errors.make_err().is_err());
        assert!(Leaf(2.0).is_valid());
    }
}
