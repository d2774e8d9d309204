use crate::imports::*;
use crate::utils::is_strictly_increasing;

/// Grade profile of the path a train runs on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeSimPath {
    /// Length of the path, m
    pub length: f64,
    /// Positions at which the grade changes, m.
    /// Begins at 0 and ends at `length`.
    pub grade_positions: Vec<f64>,
    /// Grade between each pair of consecutive grade positions, m/km
    pub grade_values: Vec<f64>,
    /// Cumulative sum of the grade at each grade position, m/km * m
    #[serde(skip)]
    grade_cum_sum: Vec<f64>,
}

impl SerdeAPI for EnvelopeSimPath {
    fn init(&mut self) -> anyhow::Result<()> {
        init_validated(self)?;
        self.grade_cum_sum = Self::cum_sum(&self.grade_positions, &self.grade_values);
        Ok(())
    }
}

impl ObjState for EnvelopeSimPath {
    fn validate(&self) -> ValidationResults {
        let mut errors = ValidationErrors::new();
        chk_num_gtz_fin(&mut errors, self.length, "Path length");
        early_err!(errors, "Path");
        if self.grade_positions.len() != self.grade_values.len() + 1 {
            errors.push(anyhow!(
                "Path needs one more grade position than grade values, got {} positions and {} values",
                self.grade_positions.len(),
                self.grade_values.len()
            ));
        }
        early_err!(errors, "Path");
        if self.grade_positions[0] != 0. {
            errors.push(anyhow!(
                "Path grade positions must begin at 0, got {}",
                self.grade_positions[0]
            ));
        }
        let last = self.grade_positions[self.grade_positions.len() - 1];
        if last != self.length {
            errors.push(anyhow!(
                "Path grade positions must end at the path length {}, got {last}",
                self.length
            ));
        }
        if !is_strictly_increasing(&self.grade_positions) {
            errors.push(anyhow!("Path grade positions must be strictly increasing"));
        }
        for grade in &self.grade_values {
            chk_num_fin(&mut errors, *grade, "Path grade value");
        }
        errors.make_err()
    }
}

impl EnvelopeSimPath {
    pub fn new(length: f64, grade_positions: Vec<f64>, grade_values: Vec<f64>) -> anyhow::Result<Self> {
        let mut path = Self {
            length,
            grade_positions,
            grade_values,
            grade_cum_sum: vec![],
        };
        path.init()?;
        Ok(path)
    }

    /// A path without any grade
    pub fn flat(length: f64) -> anyhow::Result<Self> {
        Self::new(length, vec![0., length], vec![0.])
    }

    fn cum_sum(grade_positions: &[f64], grade_values: &[f64]) -> Vec<f64> {
        let mut res = Vec::with_capacity(grade_positions.len());
        res.push(0.);
        let mut cum_sum = 0.;
        for (range, grade) in grade_positions.windows(2).zip(grade_values) {
            cum_sum += grade * (range[1] - range[0]);
            res.push(cum_sum);
        }
        res
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    /// Index of the grade interval containing `position`
    fn grade_index(&self, position: f64) -> usize {
        let upper = self.grade_positions.partition_point(|pos| *pos <= position);
        upper.clamp(1, self.grade_values.len()) - 1
    }

    fn clamp(&self, position: f64) -> f64 {
        debug_assert!(position > -POSITION_EPSILON && position < self.length + POSITION_EPSILON);
        position.clamp(0., self.length)
    }

    /// Integral of the grade from the beginning of the path to `position`
    fn cum_grade(&self, position: f64) -> f64 {
        let position = self.clamp(position);
        let index = self.grade_index(position);
        self.grade_cum_sum[index] + self.grade_values[index] * (position - self.grade_positions[index])
    }

    /// Average grade over `[begin, end]`, m/km.
    /// When both bounds are equal, the grade at this position.
    pub fn average_grade(&self, begin: f64, end: f64) -> f64 {
        if begin == end {
            return self.grade_values[self.grade_index(self.clamp(begin))];
        }
        (self.cum_grade(end) - self.cum_grade(begin)) / (end - begin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::almost_eq;

    fn hilly() -> EnvelopeSimPath {
        EnvelopeSimPath::new(
            3000.,
            vec![0., 1000., 2000., 3000.],
            vec![0., 10., -5.],
        )
        .unwrap()
    }

    #[test]
    fn test_average_grade() {
        let path = hilly();
        assert_eq!(path.average_grade(0., 1000.), 0.);
        assert!(almost_eq(path.average_grade(500., 1500.), 5., None));
        assert!(almost_eq(path.average_grade(1000., 3000.), 2.5, None));
        assert!(almost_eq(path.average_grade(1500., 2500.), 2.5, None));
    }

    #[test]
    fn test_grade_at_point() {
        let path = hilly();
        assert_eq!(path.average_grade(1500., 1500.), 10.);
        assert_eq!(path.average_grade(1000., 1000.), 10.);
        assert_eq!(path.average_grade(3000., 3000.), -5.);
        assert_eq!(path.average_grade(0., 0.), 0.);
    }

    #[test]
    fn test_snaps_to_end() {
        let path = hilly();
        assert!(almost_eq(
            path.average_grade(2500., 3000. + 1e-7),
            -5.,
            Some(1e-5)
        ));
    }

    #[test]
    fn test_invalid_paths() {
        assert!(EnvelopeSimPath::new(100., vec![0., 50.], vec![0.]).is_err());
        assert!(EnvelopeSimPath::new(100., vec![10., 100.], vec![0.]).is_err());
        assert!(EnvelopeSimPath::new(100., vec![0., 60., 50., 100.], vec![0., 1., 2.]).is_err());
        assert!(EnvelopeSimPath::new(100., vec![0., 100.], vec![0., 1.]).is_err());
        assert!(EnvelopeSimPath::new(-1., vec![0., -1.], vec![0.]).is_err());
        assert!(EnvelopeSimPath::flat(100.).is_ok());
    }

    #[test]
    fn test_serde() {
        let path = hilly();
        let yaml = path.to_yaml().unwrap();
        let read = EnvelopeSimPath::from_yaml(yaml).unwrap();
        assert_eq!(read, path);
        assert!(almost_eq(read.average_grade(500., 1500.), 5., None));
    }
}
