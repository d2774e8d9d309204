use envelope_sim_core::prelude::*;
use envelope_sim_core::search::SearchFailure;
use proptest::prelude::*;

proptest! {
    #[test]
    fn fixed_time_ignores_base(seconds in 0f64..10_000., base_time in 0f64..100_000., distance in 1f64..1e6) {
        let value = AllowanceValue::FixedTime { seconds };
        prop_assert_eq!(value.allowance_time(base_time, distance), seconds);
    }

    #[test]
    fn percentage_scales_base(percentage in 0f64..100., base_time in 0f64..100_000., distance in 1f64..1e6) {
        let value = AllowanceValue::Percentage { percentage };
        let expected = base_time * percentage / 100.;
        prop_assert!((value.allowance_time(base_time, distance) - expected).abs() <= 1e-9 * expected.max(1.));
    }

    #[test]
    fn time_per_distance_scales_distance(minutes in 0f64..20., base_time in 0f64..100_000., distance in 1f64..1e6) {
        let value = AllowanceValue::TimePerDistance { minutes };
        let expected = minutes * 60. * distance / 100_000.;
        prop_assert!((value.allowance_time(base_time, distance) - expected).abs() <= 1e-9 * expected.max(1.));
    }

    #[test]
    fn search_finds_decreasing_target(target in 1f64..99., tolerance in 1e-3f64..1e-1) {
        // f(x) = 100 - x over [0, 100]
        let mut search = DoubleBinarySearch::new(0., 100., target, tolerance, true);
        for _ in 0..64 {
            if search.is_complete() {
                break;
            }
            let input = search.input();
            search.feedback(100. - input);
        }
        prop_assert!(search.is_complete());
        prop_assert!((100. - search.input() - target).abs() <= tolerance);
        prop_assert_eq!(search.failure(), None);
    }

    #[test]
    fn search_reports_unreachable_target(target in 101f64..1000.) {
        // every output of f(x) = 100 - x is below the target
        let mut search = DoubleBinarySearch::new(0., 100., target, 1e-3, true);
        for _ in 0..20 {
            let input = search.input();
            search.feedback(100. - input);
        }
        prop_assert!(!search.is_complete());
        prop_assert_eq!(search.failure(), Some(SearchFailure::LowBoundNeverRaised));
    }
}
