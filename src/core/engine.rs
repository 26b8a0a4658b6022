use super::types::{
    CalculatorResult, GarbageBreakdown, Inputs, Leak, LeakKind, MissedBreakdown, Mode, TotalGap,
};

pub const HOURS_PER_GARBAGE_LEAD: f64 = 2.5;
pub const COST_PER_LEAD: f64 = 150.0;
pub const HOURS_PER_DEAL: f64 = 4.0;
pub const MISSED_CALL_RECOVERY: f64 = 0.5;
pub const MONTHS_PER_YEAR: f64 = 12.0;

/// Number of leak categories in the full audit; only two are measured here.
pub const TOTAL_LEAK_CATEGORIES: usize = 7;

#[derive(Debug, Clone, Copy)]
struct GarbageFlow {
    leads: f64,
    hours_wasted: f64,
    time_cost: f64,
    lead_cost: f64,
    opportunity_cost: f64,
}

impl GarbageFlow {
    fn total(self) -> f64 {
        self.time_cost + self.lead_cost + self.opportunity_cost
    }
}

#[derive(Debug, Clone, Copy)]
struct MissedFlow {
    potential_revenue: f64,
}

impl MissedFlow {
    fn total(self) -> f64 {
        self.potential_revenue * MISSED_CALL_RECOVERY
    }
}

/// Full revenue-gap breakdown with both categories counted.
pub fn compute(inputs: &Inputs) -> CalculatorResult {
    compute_scoped(inputs, Mode::Combined)
}

/// Same formulas as [`compute`], but a category the mode does not surface is
/// emitted as zero and left out of the totals.
pub fn compute_scoped(inputs: &Inputs, mode: Mode) -> CalculatorResult {
    let garbage = garbage_flow(inputs);
    let missed = missed_flow(inputs);

    let garbage_total = if mode.surfaces_garbage() {
        garbage.total()
    } else {
        0.0
    };
    let missed_total = if mode.surfaces_missed() {
        missed.total()
    } else {
        0.0
    };
    let total_monthly = garbage_total + missed_total;

    let garbage = if mode.surfaces_garbage() {
        GarbageBreakdown {
            total: emit(garbage_total),
            time_cost: emit(garbage.time_cost),
            lead_cost: emit(garbage.lead_cost),
            opportunity_cost: emit(garbage.opportunity_cost),
            leads_count: emit(garbage.leads),
            hours_wasted: emit(garbage.hours_wasted),
        }
    } else {
        GarbageBreakdown::default()
    };
    let missed = if mode.surfaces_missed() {
        MissedBreakdown {
            total: emit(missed_total),
            potential_revenue: emit(missed.potential_revenue),
            calls_count: inputs.missed_calls(),
        }
    } else {
        MissedBreakdown::default()
    };

    CalculatorResult {
        garbage,
        missed,
        total: TotalGap {
            monthly: emit(total_monthly),
            annual: emit(total_monthly * MONTHS_PER_YEAR),
        },
    }
}

/// Non-zero categories, largest first.
pub fn leaks(result: &CalculatorResult) -> Vec<Leak> {
    let mut leaks = [
        (LeakKind::Garbage, result.garbage.total),
        (LeakKind::Missed, result.missed.total),
    ]
    .into_iter()
    .filter(|(_, amount)| *amount > 0)
    .map(|(kind, amount)| Leak {
        kind,
        label: kind.label(),
        amount,
    })
    .collect::<Vec<_>>();
    leaks.sort_by(|a, b| b.amount.cmp(&a.amount));
    leaks
}

fn garbage_flow(inputs: &Inputs) -> GarbageFlow {
    let leads = inputs.monthly_leads() as f64 * inputs.tire_kicker_percent() as f64 / 100.0;
    let hours_wasted = leads * HOURS_PER_GARBAGE_LEAD;
    let deals_missed = hours_wasted / HOURS_PER_DEAL;
    GarbageFlow {
        leads,
        hours_wasted,
        time_cost: hours_wasted * inputs.hourly_value() as f64,
        lead_cost: leads * COST_PER_LEAD,
        opportunity_cost: deals_missed * inputs.avg_job_value() as f64 * inputs.close_rate() as f64
            / 100.0,
    }
}

fn missed_flow(inputs: &Inputs) -> MissedFlow {
    MissedFlow {
        potential_revenue: inputs.missed_calls() as f64
            * inputs.avg_job_value() as f64
            * inputs.close_rate() as f64
            / 100.0,
    }
}

// Rounding happens only here, once per emitted field.
fn emit(value: f64) -> u64 {
    value.max(0.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::InputField;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    fn reference_inputs() -> Inputs {
        Inputs::new(40, 10_000, 20, 40, 20, 250).expect("reference inputs are in range")
    }

    fn inputs_from(values: [u32; 6]) -> Inputs {
        Inputs::new(
            values[0], values[1], values[2], values[3], values[4], values[5],
        )
        .expect("generated inputs are in range")
    }

    fn assert_result_invariants(result: &CalculatorResult) {
        let annual_from_monthly = result.total.monthly * 12;
        assert!(result.total.annual.abs_diff(annual_from_monthly) <= 6);
        assert!(result.garbage.total <= result.total.monthly + 1);
        assert!(result.missed.total <= result.total.monthly + 1);
    }

    #[test]
    fn reference_scenario_matches_hand_calculation() {
        let result = compute(&reference_inputs());

        assert_eq!(result.garbage.leads_count, 16);
        assert_eq!(result.garbage.hours_wasted, 40);
        assert_eq!(result.garbage.time_cost, 10_000);
        assert_eq!(result.garbage.lead_cost, 2_400);
        assert_eq!(result.garbage.opportunity_cost, 20_000);
        assert_eq!(result.garbage.total, 32_400);
        assert_eq!(result.missed.potential_revenue, 40_000);
        assert_eq!(result.missed.total, 20_000);
        assert_eq!(result.missed.calls_count, 20);
        assert_eq!(result.total.monthly, 52_400);
        assert_eq!(result.total.annual, 628_800);
    }

    #[test]
    fn fractional_intermediates_round_only_on_emission() {
        // 15 * 10% = 1.5 garbage leads, 3.75 hours.
        let inputs = Inputs::new(15, 2_500, 5, 10, 1, 100).expect("valid inputs");
        let result = compute(&inputs);

        assert_eq!(result.garbage.leads_count, 2);
        assert_eq!(result.garbage.hours_wasted, 4);
        assert_eq!(result.garbage.time_cost, 375);
        assert_eq!(result.garbage.lead_cost, 225);
        // 3.75 / 4 * 2500 * 0.05 = 117.1875
        assert_eq!(result.garbage.opportunity_cost, 117);
        // 375 + 225 + 117.1875 = 717.1875
        assert_eq!(result.garbage.total, 717);
        assert_eq!(result.missed.potential_revenue, 125);
        assert_eq!(result.missed.total, 63);
        // 717.1875 + 62.5 = 779.6875
        assert_eq!(result.total.monthly, 780);
        assert_eq!(result.total.annual, 9_356);
    }

    #[test]
    fn garbage_mode_hides_missed_category() {
        let result = compute_scoped(&reference_inputs(), Mode::Garbage);
        assert_eq!(result.garbage.total, 32_400);
        assert_eq!(result.missed, MissedBreakdown::default());
        assert_eq!(result.total.monthly, 32_400);
        assert_eq!(result.total.annual, 388_800);
    }

    #[test]
    fn missed_mode_hides_garbage_category() {
        let result = compute_scoped(&reference_inputs(), Mode::Missed);
        assert_eq!(result.garbage, GarbageBreakdown::default());
        assert_eq!(result.missed.total, 20_000);
        assert_eq!(result.total.monthly, 20_000);
        assert_eq!(result.total.annual, 240_000);
    }

    #[test]
    fn combined_scope_equals_unscoped_compute() {
        let inputs = reference_inputs();
        assert_eq!(compute_scoped(&inputs, Mode::Combined), compute(&inputs));
    }

    #[test]
    fn leaks_are_sorted_descending_and_skip_zero_categories() {
        let result = compute(&reference_inputs());
        let listed = leaks(&result);
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].kind, LeakKind::Garbage);
        assert_eq!(listed[0].amount, 32_400);
        assert_eq!(listed[1].kind, LeakKind::Missed);
        assert_eq!(listed[1].label, "Missed & After-Hours Calls");

        let mut inputs = reference_inputs();
        inputs.set(InputField::MissedCalls, 0).expect("zero missed calls is valid");
        let listed = leaks(&compute(&inputs));
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].kind, LeakKind::Garbage);
    }

    #[test]
    fn leaks_put_missed_first_when_it_is_larger() {
        let inputs = Inputs::new(10, 75_000, 50, 10, 50, 100).expect("valid inputs");
        let listed = leaks(&compute(&inputs));
        assert_eq!(listed[0].kind, LeakKind::Missed);
        assert!(listed[0].amount > listed[1].amount);
    }

    #[test]
    fn every_field_boundary_produces_finite_results() {
        for field in InputField::ALL {
            let spec = field.spec();
            for value in [spec.min, spec.max] {
                let mut inputs = reference_inputs();
                inputs.set(field, value).expect("boundary value is in range");
                let result = compute(&inputs);
                assert_result_invariants(&result);
            }
        }

        let all_min = inputs_from(InputField::ALL.map(|f| f.spec().min));
        let all_max = inputs_from(InputField::ALL.map(|f| f.spec().max));
        assert_result_invariants(&compute(&all_min));
        let max_result = compute(&all_max);
        assert_result_invariants(&max_result);
        assert!(max_result.total.annual > compute(&all_min).total.annual);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_compute_is_deterministic(
            leads in 10u32..=500,
            job in 2_500u32..=75_000,
            close in 5u32..=50,
            kickers in 10u32..=70,
            missed in 0u32..=50,
            hourly in 100u32..=2_000
        ) {
            let inputs = inputs_from([leads, job, close, kickers, missed, hourly]);
            prop_assert_eq!(compute(&inputs), compute(&inputs));
            for mode in Mode::ALL {
                prop_assert_eq!(compute_scoped(&inputs, mode), compute_scoped(&inputs, mode));
            }
        }

        #[test]
        fn prop_more_tire_kickers_never_reduce_garbage_total(
            leads in 10u32..=500,
            job in 2_500u32..=75_000,
            close in 5u32..=50,
            kickers in 10u32..70,
            bump in 1u32..=60,
            missed in 0u32..=50,
            hourly in 100u32..=2_000
        ) {
            let low = inputs_from([leads, job, close, kickers, missed, hourly]);
            let high_kickers = (kickers + bump).min(70);
            let high = inputs_from([leads, job, close, high_kickers, missed, hourly]);
            prop_assert!(compute(&high).garbage.total >= compute(&low).garbage.total);
        }

        #[test]
        fn prop_more_missed_calls_never_reduce_missed_total(
            job in 2_500u32..=75_000,
            close in 5u32..=50,
            missed in 0u32..50,
            bump in 1u32..=50
        ) {
            let base = Inputs::default();
            let mut low = base;
            low.set(InputField::AvgJobValue, job).expect("in range");
            low.set(InputField::CloseRate, close).expect("in range");
            low.set(InputField::MissedCalls, missed).expect("in range");
            let mut high = low;
            high.set(InputField::MissedCalls, (missed + bump).min(50)).expect("in range");
            prop_assert!(compute(&high).missed.total >= compute(&low).missed.total);
        }

        #[test]
        fn prop_annual_tracks_monthly_within_rounding(
            leads in 10u32..=500,
            job in 2_500u32..=75_000,
            close in 5u32..=50,
            kickers in 10u32..=70,
            missed in 0u32..=50,
            hourly in 100u32..=2_000
        ) {
            let result = compute(&inputs_from([leads, job, close, kickers, missed, hourly]));
            let annual_from_monthly = result.total.monthly as i128 * 12;
            prop_assert!((result.total.annual as i128 - annual_from_monthly).abs() <= 6);
            let category_sum = result.garbage.total as i128 + result.missed.total as i128;
            prop_assert!((category_sum - result.total.monthly as i128).abs() <= 1);
        }
    }
}
