use super::AllowanceValue;
use crate::imports::*;

/// Stretch `[begin_pos, end_pos]` of an allowance with its own added time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AllowanceRange {
    /// m
    pub begin_pos: f64,
    /// m
    pub end_pos: f64,
    pub value: AllowanceValue,
}

impl ObjState for AllowanceRange {
    fn validate(&self) -> ValidationResults {
        let mut errors = ValidationErrors::new();
        chk_num_gez_fin(&mut errors, self.begin_pos, "Range begin position");
        chk_num_fin(&mut errors, self.end_pos, "Range end position");
        if !(self.end_pos > self.begin_pos) {
            errors.push(anyhow!(
                "Allowance range end {} must be after its begin {}",
                self.end_pos,
                self.begin_pos
            ));
        }
        validate_field(&mut errors, &self.value, "Allowance value");
        errors.make_err()
    }
}

impl AllowanceRange {
    pub fn new(begin_pos: f64, end_pos: f64, value: AllowanceValue) -> Self {
        Self {
            begin_pos,
            end_pos,
            value,
        }
    }

    pub fn distance(&self) -> f64 {
        self.end_pos - self.begin_pos
    }
}

/// Checks that ranges are ordered, disjoint, and cover `[begin_pos, end_pos]`
pub(super) fn validate_ranges(
    errors: &mut ValidationErrors,
    ranges: &[AllowanceRange],
    begin_pos: f64,
    end_pos: f64,
) {
    let (first, last) = match (ranges.first(), ranges.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => {
            errors.push(anyhow!("An allowance needs at least one range"));
            return;
        }
    };
    if !are_positions_equal(first.begin_pos, begin_pos) {
        errors.push(anyhow!(
            "First allowance range begins at {}, the allowance at {}",
            first.begin_pos,
            begin_pos
        ));
    }
    if !are_positions_equal(last.end_pos, end_pos) {
        errors.push(anyhow!(
            "Last allowance range ends at {}, the allowance at {}",
            last.end_pos,
            end_pos
        ));
    }
    for (index, pair) in ranges.windows(2).enumerate() {
        if !are_positions_equal(pair[0].end_pos, pair[1].begin_pos) {
            errors.push(anyhow!(
                "Allowance range {} ends at {} but range {} begins at {}",
                index,
                pair[0].end_pos,
                index + 1,
                pair[1].begin_pos
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    impl Cases for AllowanceRange {
        fn real_cases() -> Vec<Self> {
            vec![AllowanceRange::new(
                0.,
                1000.,
                AllowanceValue::Percentage { percentage: 10. },
            )]
        }
        fn invalid_cases() -> Vec<Self> {
            vec![
                AllowanceRange::new(1000., 0., AllowanceValue::Percentage { percentage: 10. }),
                AllowanceRange::new(0., 1000., AllowanceValue::FixedTime { seconds: -5. }),
            ]
        }
    }

    #[test]
    fn test_range_cases() {
        test_cases::<AllowanceRange>();
    }

    #[test]
    fn test_validate_ranges() {
        let value = AllowanceValue::FixedTime { seconds: 10. };
        let contiguous = [
            AllowanceRange::new(0., 400., value),
            AllowanceRange::new(400., 1000., value),
        ];
        let mut errors = ValidationErrors::new();
        validate_ranges(&mut errors, &contiguous, 0., 1000.);
        assert!(errors.is_empty());

        let gap = [
            AllowanceRange::new(0., 400., value),
            AllowanceRange::new(500., 1000., value),
        ];
        let mut errors = ValidationErrors::new();
        validate_ranges(&mut errors, &gap, 0., 1000.);
        assert_eq!(errors.len(), 1);

        let mut errors = ValidationErrors::new();
        validate_ranges(&mut errors, &[], 0., 1000.);
        assert_eq!(errors.len(), 1);
    }
}
