use super::range::validate_ranges;
use super::{AllowanceDistribution, AllowanceRange, AllowanceValue};
use crate::envelope::{Envelope, EnvelopeBuilder, EnvelopeSpeedCap, PhysicalMeaning};
use crate::imports::*;
use crate::search::{DoubleBinarySearch, SearchFailure};
use crate::sim::EnvelopeSimContext;

/// Max number of candidates built per section
pub const MAX_ITERATIONS: usize = 20;

/// Allowance over `[begin_pos, end_pos]`, made of contiguous ranges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allowance {
    /// m
    pub begin_pos: f64,
    /// m
    pub end_pos: f64,
    /// Speed under which the train would use too much line capacity, 0 if unbounded, m/s
    #[serde(default)]
    pub capacity_speed_limit: f64,
    #[serde(default)]
    pub distribution: AllowanceDistribution,
    pub ranges: Vec<AllowanceRange>,
}

impl SerdeAPI for Allowance {
    fn init(&mut self) -> anyhow::Result<()> {
        init_validated(self)
    }
}

impl ObjState for Allowance {
    fn validate(&self) -> ValidationResults {
        let mut errors = ValidationErrors::new();
        chk_num_gez_fin(&mut errors, self.begin_pos, "Allowance begin position");
        chk_num_fin(&mut errors, self.end_pos, "Allowance end position");
        chk_num_gez_fin(&mut errors, self.capacity_speed_limit, "Capacity speed limit");
        if !(self.end_pos > self.begin_pos) {
            errors.push(anyhow!(
                "Allowance end {} must be after its begin {}",
                self.end_pos,
                self.begin_pos
            ));
        }
        validate_slice(&mut errors, &self.ranges, "Allowance range");
        early_err!(errors, "Allowance");
        validate_ranges(&mut errors, &self.ranges, self.begin_pos, self.end_pos);
        errors.make_err()
    }
}

/// Maps a search that ran out of iterations to the reason it did not converge.
/// Section running times decrease when the input increases.
fn search_error(search: &DoubleBinarySearch) -> ConvergenceError {
    match search.failure() {
        Some(SearchFailure::LowBoundNeverRaised) => ConvergenceError::TooMuchTime,
        Some(SearchFailure::HighBoundNeverLowered) => ConvergenceError::NotEnoughTime,
        _ => ConvergenceError::Discontinuity,
    }
}

impl Allowance {
    /// Creates an allowance, failing if a range lies outside `[begin_pos, end_pos]`
    pub fn new(
        begin_pos: f64,
        end_pos: f64,
        capacity_speed_limit: f64,
        distribution: AllowanceDistribution,
        ranges: Vec<AllowanceRange>,
    ) -> EnvelopeResult<Self> {
        for range in &ranges {
            if range.begin_pos < begin_pos - POSITION_EPSILON
                || range.end_pos > end_pos + POSITION_EPSILON
            {
                return Err(EnvelopeError::AllowanceRangeOutOfBounds {
                    begin: range.begin_pos,
                    end: range.end_pos,
                    allowance_begin: begin_pos,
                    allowance_end: end_pos,
                });
            }
        }
        Ok(Self {
            begin_pos,
            end_pos,
            capacity_speed_limit,
            distribution,
            ranges,
        })
    }

    pub fn mareco(
        begin_pos: f64,
        end_pos: f64,
        capacity_speed_limit: f64,
        ranges: Vec<AllowanceRange>,
    ) -> EnvelopeResult<Self> {
        Self::new(
            begin_pos,
            end_pos,
            capacity_speed_limit,
            AllowanceDistribution::Mareco,
            ranges,
        )
    }

    pub fn linear(
        begin_pos: f64,
        end_pos: f64,
        capacity_speed_limit: f64,
        ranges: Vec<AllowanceRange>,
    ) -> EnvelopeResult<Self> {
        Self::new(
            begin_pos,
            end_pos,
            capacity_speed_limit,
            AllowanceDistribution::Linear,
            ranges,
        )
    }

    /// Allowance made of a single range spanning `[begin_pos, end_pos]`
    pub fn with_value(
        begin_pos: f64,
        end_pos: f64,
        capacity_speed_limit: f64,
        distribution: AllowanceDistribution,
        value: AllowanceValue,
    ) -> EnvelopeResult<Self> {
        Self::new(
            begin_pos,
            end_pos,
            capacity_speed_limit,
            distribution,
            vec![AllowanceRange::new(begin_pos, end_pos, value)],
        )
    }

    /// m
    pub fn distance(&self) -> f64 {
        self.end_pos - self.begin_pos
    }

    /// Time added by all ranges to `base`, s
    pub fn added_time(&self, base: &Envelope) -> EnvelopeResult<f64> {
        self.ranges.iter().try_fold(0., |total, range| {
            let base_time = base.time_between(range.begin_pos, range.end_pos)?;
            Ok(total + range.value.allowance_time(base_time, range.distance()))
        })
    }

    /// Running time of the whole envelope once the allowance is applied, s
    pub fn target_time(&self, base: &Envelope) -> EnvelopeResult<f64> {
        Ok(base.total_time() + self.added_time(base)?)
    }

    /// Applies the allowance to a continuous envelope. The result is identical to
    /// `base` out of `[begin_pos, end_pos]`, and continuous.
    pub fn apply(&self, base: &Envelope, context: &EnvelopeSimContext) -> EnvelopeResult<Envelope> {
        if base.begin_pos() > self.begin_pos + POSITION_EPSILON
            || base.end_pos() < self.end_pos - POSITION_EPSILON
        {
            return Err(EnvelopeError::AllowanceOutOfBounds {
                begin: self.begin_pos,
                end: self.end_pos,
                envelope_begin: base.begin_pos(),
                envelope_end: base.end_pos(),
            });
        }
        if !base.is_continuous() {
            return Err(EnvelopeError::discontinuity("base envelope of the allowance"));
        }
        sim_debug!(
            "applying a {:?} allowance over [{}, {}]",
            self.distribution,
            self.begin_pos,
            self.end_pos
        );

        let region = Envelope::new(base.slice(self.begin_pos, self.end_pos)?)?;
        let mut builder = EnvelopeBuilder::new();
        builder.add_parts(base.slice(base.begin_pos(), self.begin_pos)?);
        for envelope in self.compute_region(&region, context)? {
            builder.add_envelope(&envelope);
        }
        builder.add_parts(base.slice(self.end_pos, base.end_pos())?);
        builder.build_continuous("edges of the allowance region")
    }

    /// Computes ranges by increasing allowance ratio. The edge speeds of each computed range
    /// are imposed to its neighbors, which keeps the region continuous.
    fn compute_region(
        &self,
        region: &Envelope,
        context: &EnvelopeSimContext,
    ) -> EnvelopeResult<Vec<Envelope>> {
        let range_count = self.ranges.len();
        let mut imposed_speeds: Vec<Option<f64>> = vec![None; range_count + 1];
        imposed_speeds[0] = Some(region.begin_speed());
        imposed_speeds[range_count] = Some(region.end_speed());

        let mut order = Vec::with_capacity(range_count);
        for (index, range) in self.ranges.iter().enumerate() {
            let base_time = region.time_between(range.begin_pos, range.end_pos)?;
            order.push((index, range.value.allowance_ratio(base_time, range.distance())));
        }
        // stable: ties keep the path order
        order.sort_by(|a, b| a.1.total_cmp(&b.1));

        let region_time = region.total_time();
        let mut res: Vec<Option<Envelope>> = vec![None; range_count];
        for (index, _) in order {
            let range = &self.ranges[index];
            sim_debug!(
                "computing range {} [{}, {}]",
                index + 1,
                range.begin_pos,
                range.end_pos
            );
            let range_envelope = Envelope::new(region.slice(range.begin_pos, range.end_pos)?)?;
            let tolerance = context.time_step * range_envelope.total_time() / region_time;
            let computed = self.compute_range(
                index,
                range_envelope,
                context,
                &range.value,
                imposed_speeds[index],
                imposed_speeds[index + 1],
                tolerance,
            )?;
            imposed_speeds[index] = Some(computed.begin_speed());
            imposed_speeds[index + 1] = Some(computed.end_speed());
            res[index] = Some(computed);
        }
        Ok(res.into_iter().flatten().collect())
    }

    fn location(&self, range: usize, section: Option<usize>) -> AllowanceLocation {
        AllowanceLocation {
            distribution: self.distribution,
            range,
            section,
        }
    }

    /// Computes a range, split at stops in sections computed independently.
    /// Failures carry the range and section they were raised in.
    #[allow(clippy::too_many_arguments)]
    fn compute_range(
        &self,
        range_index: usize,
        range_envelope: Envelope,
        context: &EnvelopeSimContext,
        value: &AllowanceValue,
        imposed_begin_speed: Option<f64>,
        imposed_end_speed: Option<f64>,
        tolerance: f64,
    ) -> EnvelopeResult<Envelope> {
        let base_time = range_envelope.total_time();
        let base_distance = range_envelope.total_distance();
        let added_time = value.allowance_time(base_time, base_distance);
        if added_time == 0. {
            return Ok(range_envelope);
        }

        if self.capacity_speed_limit > 0. {
            let slowest = EnvelopeSpeedCap::from(
                &range_envelope,
                PhysicalMeaning::CapacitySpeedLimit,
                self.capacity_speed_limit,
            )?;
            if base_time + added_time > slowest.total_time() {
                sim_debug!(
                    "target time {} is above the slowest running time {} at the capacity speed limit",
                    base_time + added_time,
                    slowest.total_time()
                );
                return Err(EnvelopeError::from(ConvergenceError::TooMuchTime)
                    .in_allowance(self.location(range_index, None)));
            }
        }

        let range_begin = range_envelope.begin_pos();
        let range_end = range_envelope.end_pos();
        let mut split_points = vec![range_begin];
        split_points.extend(
            range_envelope
                .iter()
                .filter(|part| part.end_speed() == 0.)
                .map(|part| part.end_pos()),
        );
        if split_points.last() != Some(&range_end) {
            split_points.push(range_end);
        }

        let mut builder = EnvelopeBuilder::new();
        for (index, bounds) in split_points.windows(2).enumerate() {
            let (section_begin, section_end) = (bounds[0], bounds[1]);
            let section = Envelope::new(range_envelope.slice(section_begin, section_end)?)?;
            let section_time = section.total_time();
            let section_ratio = value.section_ratio(
                section_time,
                base_time,
                section.total_distance(),
                base_distance,
            );
            let target_time = section_time + added_time * section_ratio;
            // imposed speeds only apply on the edges of the range
            let imposed_begin = imposed_begin_speed.filter(|_| section_begin == range_begin);
            let imposed_end = imposed_end_speed.filter(|_| section_end == range_end);

            sim_debug!("  computing section {} with target time {target_time}", index + 1);
            let computed = self
                .compute_section(
                    &section,
                    context,
                    target_time,
                    imposed_begin,
                    imposed_end,
                    tolerance * section_ratio,
                )
                .map_err(|err| err.in_allowance(self.location(range_index, Some(index))))?;
            builder.add_envelope(&computed);
        }
        builder.build()
    }

    /// Searches the input reaching the target time of a section
    fn compute_section(
        &self,
        section: &Envelope,
        context: &EnvelopeSimContext,
        target_time: f64,
        imposed_begin_speed: Option<f64>,
        imposed_end_speed: Option<f64>,
        tolerance: f64,
    ) -> EnvelopeResult<Envelope> {
        let core = self.distribution.core();
        let low_bound = core.initial_low_bound(section, self.capacity_speed_limit);
        let high_bound = core.initial_high_bound(section, &context.rolling_stock);
        if low_bound > high_bound {
            // the capacity speed limit is above every speed of the section
            return Err(ConvergenceError::TooMuchTime.into());
        }

        let mut search = DoubleBinarySearch::new(low_bound, high_bound, target_time, tolerance, true);
        let mut res = None;
        let mut last_error = None;
        for attempt in 1..=MAX_ITERATIONS {
            if search.is_complete() {
                break;
            }
            let input = search.input();
            sim_debug!("    attempt {attempt} with input {input}");
            match self.compute_iteration(section, context, input, imposed_begin_speed, imposed_end_speed) {
                Ok(envelope) => {
                    let time = envelope.total_time();
                    sim_debug!("    envelope time {time}");
                    search.feedback(time);
                    res = Some(envelope);
                }
                Err(err) => {
                    sim_debug!("    could not build an envelope: {err}");
                    match err.convergence() {
                        // too slow to even build an envelope, go faster
                        Some(ConvergenceError::TooMuchTime) => search.feedback(f64::INFINITY),
                        // too fast to even build an envelope, go slower
                        Some(ConvergenceError::NotEnoughTime) => search.feedback(0.),
                        _ => return Err(err),
                    }
                    last_error = Some(err);
                }
            }
        }

        if !search.is_complete() {
            return Err(last_error.unwrap_or_else(|| search_error(&search).into()));
        }
        res.ok_or_else(|| ConvergenceError::Discontinuity.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use crate::utils::almost_eq;

    fn percentage(percentage: f64) -> AllowanceValue {
        AllowanceValue::Percentage { percentage }
    }

    impl Cases for Allowance {
        fn real_cases() -> Vec<Self> {
            vec![
                Allowance::with_value(0., 1000., 0., AllowanceDistribution::Mareco, percentage(5.))
                    .unwrap(),
                Allowance::linear(
                    0.,
                    1000.,
                    10.,
                    vec![
                        AllowanceRange::new(0., 300., percentage(5.)),
                        AllowanceRange::new(300., 1000., percentage(10.)),
                    ],
                )
                .unwrap(),
            ]
        }
        fn invalid_cases() -> Vec<Self> {
            let mut gap = Self::real_cases().remove(1);
            gap.ranges[1].begin_pos = 400.;
            let mut no_range = Self::real_cases().remove(0);
            no_range.ranges.clear();
            let mut negative_capacity = Self::real_cases().remove(0);
            negative_capacity.capacity_speed_limit = -1.;
            vec![gap, no_range, negative_capacity]
        }
    }

    #[test]
    fn test_allowance_cases() {
        test_cases::<Allowance>();
    }

    #[test]
    fn test_range_out_of_bounds() {
        let err = Allowance::mareco(
            0.,
            1000.,
            0.,
            vec![AllowanceRange::new(0., 1200., percentage(5.))],
        )
        .unwrap_err();
        assert!(matches!(err, EnvelopeError::AllowanceRangeOutOfBounds { .. }));
        assert!(err.is_user_error());
    }

    #[test]
    fn test_allowance_out_of_bounds() {
        let context = flat_context(1000.);
        let base = envelope(vec![constant_part(0., 1000., 20.)]);
        let allowance =
            Allowance::with_value(0., 2000., 0., AllowanceDistribution::Linear, percentage(5.))
                .unwrap();
        assert!(matches!(
            allowance.apply(&base, &context),
            Err(EnvelopeError::AllowanceOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_discontinuous_base() {
        let context = flat_context(1000.);
        let base = envelope(vec![constant_part(0., 500., 20.), constant_part(500., 1000., 10.)]);
        let allowance =
            Allowance::with_value(0., 1000., 0., AllowanceDistribution::Linear, percentage(5.))
                .unwrap();
        assert!(matches!(
            allowance.apply(&base, &context),
            Err(EnvelopeError::Discontinuity { .. })
        ));
    }

    #[test]
    fn test_added_and_target_time() {
        let base = envelope(vec![constant_part(0., 1000., 20.)]);
        let allowance = Allowance::linear(
            0.,
            1000.,
            0.,
            vec![
                AllowanceRange::new(0., 500., AllowanceValue::FixedTime { seconds: 10. }),
                AllowanceRange::new(500., 1000., percentage(20.)),
            ],
        )
        .unwrap();
        assert_eq!(allowance.distance(), 1000.);
        assert!(almost_eq(allowance.added_time(&base).unwrap(), 15., None));
        assert!(almost_eq(allowance.target_time(&base).unwrap(), 65., None));
    }

    #[test]
    fn test_zero_allowance_is_identity() {
        let context = flat_context(1000.);
        let base = envelope(vec![constant_part(0., 1000., 20.)]);
        let allowance =
            Allowance::with_value(0., 1000., 0., AllowanceDistribution::Mareco, percentage(0.))
                .unwrap();
        assert_eq!(allowance.apply(&base, &context).unwrap(), base);
    }

    #[test]
    fn test_capacity_limit_too_restrictive() {
        let context = flat_context(1000.);
        let base = envelope(vec![constant_part(0., 1000., 20.)]);
        // running at 15 m/s only adds a third of the base time
        let allowance =
            Allowance::with_value(0., 1000., 15., AllowanceDistribution::Linear, percentage(50.))
                .unwrap();
        let err = allowance.apply(&base, &context).unwrap_err();
        assert_eq!(err.convergence(), Some(ConvergenceError::TooMuchTime));
        assert_eq!(
            err.location(),
            Some(&AllowanceLocation {
                distribution: AllowanceDistribution::Linear,
                range: 0,
                section: None,
            })
        );
        assert!(err.is_user_error());
    }

    #[test]
    fn test_search_error_mapping() {
        let mut search = DoubleBinarySearch::new(0., 1., 10., 0.1, true);
        // always slower than the target, even at the highest input
        search.feedback(20.);
        assert_eq!(search_error(&search), ConvergenceError::NotEnoughTime);
        let mut search = DoubleBinarySearch::new(0., 1., 10., 0.1, true);
        search.feedback(5.);
        assert_eq!(search_error(&search), ConvergenceError::TooMuchTime);
        search.feedback(20.);
        assert_eq!(search_error(&search), ConvergenceError::Discontinuity);
    }
}
