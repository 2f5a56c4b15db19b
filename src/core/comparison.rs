use serde::{Deserialize, Serialize};

use crate::{
    api::RateProvider,
    core::{
        account::AccountSnapshot,
        calculator::{calculate_cost, total_cost},
        consumption::{total_billed_cost, total_energy},
        rate::PaymentMethod,
        shutdown::{Cancelled, Shutdown},
        tariff::Tariff,
    },
    prelude::*,
    quantity::{cost::Cost, energy::KilowattHours},
};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CostBreakdown {
    pub consumption_cost: Cost,
    pub standing_charge: Cost,
    pub total_cost: Cost,
    pub total_energy: KilowattHours,
}

impl CostBreakdown {
    pub fn new(consumption_cost: Cost, standing_charge: Cost, total_energy: KilowattHours) -> Self {
        Self {
            consumption_cost,
            standing_charge,
            total_cost: consumption_cost + standing_charge,
            total_energy,
        }
    }

    /// Cost the supplier has actually billed for the day on the current tariff.
    pub fn billed(account: &AccountSnapshot) -> Self {
        Self::new(
            total_billed_cost(&account.consumption),
            account.standing_charge,
            total_energy(&account.consumption),
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Quote {
    pub breakdown: CostBreakdown,

    /// Product to switch to; unknown for the current tariff.
    pub product_code: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TariffComparison {
    pub tariff: Tariff,

    /// Either the quote or the reason it could not be made.
    pub outcome: Result<Quote, String>,
}

impl TariffComparison {
    pub const fn is_valid(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn breakdown(&self) -> Option<&CostBreakdown> {
        self.outcome.as_ref().ok().map(|quote| &quote.breakdown)
    }

    pub fn total_cost(&self) -> Option<Cost> {
        self.breakdown().map(|breakdown| breakdown.total_cost)
    }

    pub fn product_code(&self) -> Option<&str> {
        self.outcome.as_ref().ok().and_then(|quote| quote.product_code.as_deref())
    }

    pub fn error(&self) -> Option<&str> {
        self.outcome.as_ref().err().map(String::as_str)
    }
}

/// Whether staying on the current tariff competes regardless of its own switchability.
#[derive(
    Copy, Clone, Debug, Default, Eq, PartialEq, Hash, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum StayOption {
    /// Staying is always possible.
    #[default]
    Always,

    /// The current tariff competes only when it is switchable itself.
    IfSwitchable,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ComparisonResult {
    pub current: TariffComparison,
    pub alternatives: Vec<TariffComparison>,

    /// Cheapest eligible tariff, `None` when nothing was eligible.
    pub cheapest: Option<Tariff>,

    /// Current total minus the cheapest total, zero without the cheapest tariff.
    pub potential_savings: Cost,
}

impl ComparisonResult {
    pub fn all(&self) -> impl Iterator<Item = &TariffComparison> {
        std::iter::once(&self.current).chain(&self.alternatives)
    }

    pub fn get(&self, tariff: &Tariff) -> Option<&TariffComparison> {
        self.all().find(|comparison| comparison.tariff == *tariff)
    }

    pub fn is_current_cheapest(&self) -> bool {
        self.cheapest == Some(self.current.tariff)
    }
}

#[derive(bon::Builder)]
pub struct Comparator<'a> {
    rate_provider: &'a dyn RateProvider,

    #[builder(default)]
    payment_method: PaymentMethod,

    #[builder(default)]
    stay_option: StayOption,

    #[builder(default)]
    shutdown: Shutdown,
}

impl Comparator<'_> {
    /// Compare the billed cost of the current tariff with what the candidates would have cost.
    ///
    /// Candidates are quoted one by one. A failed candidate is recorded and skipped.
    #[instrument(skip_all, fields(current = account.current_tariff.id, date = %account.date))]
    pub async fn compare(
        &self,
        account: &AccountSnapshot,
        current_cost: CostBreakdown,
        candidates: &[Tariff],
    ) -> Result<ComparisonResult, Cancelled> {
        let current = TariffComparison {
            tariff: account.current_tariff,
            outcome: Ok(Quote { breakdown: current_cost, product_code: None }),
        };

        let mut alternatives = Vec::with_capacity(candidates.len());
        for tariff in candidates.iter().filter(|tariff| **tariff != account.current_tariff) {
            self.shutdown.check()?;
            let outcome = self.quote(account, tariff).await.map_err(|error| {
                warn!(tariff = tariff.id, "failed to quote: {error:#}");
                format!("{error:#}")
            });
            if let Ok(quote) = &outcome {
                info!(tariff = tariff.id, total = ?quote.breakdown.total_cost, "quoted");
            }
            alternatives.push(TariffComparison { tariff: *tariff, outcome });
        }

        let (cheapest, potential_savings) =
            select_cheapest(&current, &alternatives, self.stay_option);
        info!(cheapest = cheapest.map(|tariff| tariff.id), ?potential_savings, "compared");
        Ok(ComparisonResult { current, alternatives, cheapest, potential_savings })
    }

    async fn quote(&self, account: &AccountSnapshot, tariff: &Tariff) -> Result<Quote> {
        let schedule = self
            .rate_provider
            .get_rates(tariff.api_display_name, account.region, account.date)
            .await
            .with_context(|| format!("failed to fetch the rates of {tariff}"))?;
        let period_costs =
            calculate_cost(&account.consumption, &schedule.periods, self.payment_method)?;
        let breakdown = CostBreakdown::new(
            total_cost(&period_costs),
            schedule.standing_charge,
            total_energy(&account.consumption),
        );
        Ok(Quote { breakdown, product_code: Some(schedule.product_code) })
    }
}

/// Pick the cheapest eligible tariff, the first one seen wins a tie.
pub fn select_cheapest(
    current: &TariffComparison,
    alternatives: &[TariffComparison],
    stay_option: StayOption,
) -> (Option<Tariff>, Cost) {
    let may_stay = match stay_option {
        StayOption::Always => true,
        StayOption::IfSwitchable => current.tariff.switchable,
    };
    let cheapest = may_stay
        .then_some(current)
        .into_iter()
        .chain(alternatives.iter().filter(|comparison| comparison.tariff.switchable))
        .filter_map(|comparison| Some((comparison.tariff, comparison.total_cost()?)))
        .min_by_key(|(_, total_cost)| *total_cost);
    match (cheapest, current.total_cost()) {
        (Some((tariff, cheapest_cost)), Some(current_cost)) => {
            (Some(tariff), current_cost - cheapest_cost)
        }
        (cheapest, _) => (cheapest.map(|(tariff, _)| tariff), Cost::ZERO),
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::testing::{FakeRates, flat_schedule, snapshot, tariff};

    fn current_cost(total: f64) -> CostBreakdown {
        CostBreakdown::new(
            Cost::from_pence(total - 50.0),
            Cost::from_pence(50.0),
            KilowattHours::from(10.0),
        )
    }

    #[tokio::test]
    async fn test_cheaper_candidate_is_selected() {
        let rates = FakeRates::default()
            .with("Octopus Go", flat_schedule(25.0, 50.0))
            .with("Agile Octopus", flat_schedule(44.8, 50.0));
        let account = snapshot(tariff("flexible"));
        let result = Comparator::builder()
            .rate_provider(&rates)
            .build()
            .compare(&account, current_cost(500.0), &[tariff("go"), tariff("agile")])
            .await
            .unwrap();

        assert_eq!(result.cheapest, Some(tariff("go")));
        assert_abs_diff_eq!(result.potential_savings.0, 200.0);
        assert_abs_diff_eq!(result.get(&tariff("agile")).unwrap().total_cost().unwrap().0, 498.0);
        assert_eq!(result.get(&tariff("go")).unwrap().product_code(), Some("OCTOPUS GO-PRODUCT"));
    }

    #[tokio::test]
    async fn test_failed_candidate_is_isolated() {
        let rates = FakeRates::default()
            .with("Octopus Go", flat_schedule(25.0, 50.0))
            .with("Agile Octopus", flat_schedule(44.8, 50.0))
            .failing("Flexible Octopus", "connection reset");
        let account = snapshot(tariff("cosy"));
        let result = Comparator::builder()
            .rate_provider(&rates)
            .build()
            .compare(
                &account,
                current_cost(500.0),
                &[tariff("flexible"), tariff("go"), tariff("agile")],
            )
            .await
            .unwrap();

        assert_eq!(result.alternatives.len(), 3);
        let flexible = result.get(&tariff("flexible")).unwrap();
        assert!(!flexible.is_valid());
        assert!(flexible.error().unwrap().contains("connection reset"));
        assert_eq!(result.alternatives.iter().filter(|comparison| comparison.is_valid()).count(), 2);
        assert_eq!(result.cheapest, Some(tariff("go")));
    }

    #[tokio::test]
    async fn test_missing_rate_fails_only_that_candidate() {
        let mut partial = flat_schedule(1.0, 0.0);
        partial.periods.clear();
        let rates = FakeRates::default()
            .with("Agile Octopus", partial)
            .with("Octopus Go", flat_schedule(40.0, 50.0));
        let account = snapshot(tariff("flexible"));
        let result = Comparator::builder()
            .rate_provider(&rates)
            .build()
            .compare(&account, current_cost(500.0), &[tariff("agile"), tariff("go")])
            .await
            .unwrap();

        let agile = result.get(&tariff("agile")).unwrap();
        assert!(agile.error().unwrap().contains("no rate covers"));
        assert_eq!(result.cheapest, Some(tariff("go")));
        assert_abs_diff_eq!(result.potential_savings.0, 50.0);
    }

    #[tokio::test]
    async fn test_current_tariff_is_not_requoted() {
        let rates = FakeRates::default();
        let account = snapshot(tariff("agile"));
        let result = Comparator::builder()
            .rate_provider(&rates)
            .build()
            .compare(&account, current_cost(500.0), &[tariff("agile")])
            .await
            .unwrap();
        assert!(result.alternatives.is_empty());
        assert_eq!(result.cheapest, Some(tariff("agile")));
        assert_abs_diff_eq!(result.potential_savings.0, 0.0);
    }

    #[tokio::test]
    async fn test_all_candidates_fail() {
        let rates = FakeRates::default();
        let candidates = [tariff("go"), tariff("agile")];

        // Not switchable itself, but staying is always possible.
        let account = snapshot(tariff("tracker"));
        let result = Comparator::builder()
            .rate_provider(&rates)
            .build()
            .compare(&account, current_cost(500.0), &candidates)
            .await
            .unwrap();
        assert_eq!(result.cheapest, Some(tariff("tracker")));
        assert_abs_diff_eq!(result.potential_savings.0, 0.0);

        let result = Comparator::builder()
            .rate_provider(&rates)
            .stay_option(StayOption::IfSwitchable)
            .build()
            .compare(&account, current_cost(500.0), &candidates)
            .await
            .unwrap();
        assert_eq!(result.cheapest, None);
        assert_abs_diff_eq!(result.potential_savings.0, 0.0);

        let account = snapshot(tariff("flexible"));
        let result = Comparator::builder()
            .rate_provider(&rates)
            .stay_option(StayOption::IfSwitchable)
            .build()
            .compare(&account, current_cost(500.0), &candidates)
            .await
            .unwrap();
        assert_eq!(result.cheapest, Some(tariff("flexible")));
    }

    #[tokio::test]
    async fn test_non_switchable_candidate_is_never_selected() {
        let rates = FakeRates::default().with("Intelligent Octopus Go", flat_schedule(1.0, 0.0));
        let account = snapshot(tariff("flexible"));
        let result = Comparator::builder()
            .rate_provider(&rates)
            .build()
            .compare(&account, current_cost(500.0), &[tariff("intelligent_go")])
            .await
            .unwrap();
        assert!(result.get(&tariff("intelligent_go")).unwrap().is_valid());
        assert_eq!(result.cheapest, Some(tariff("flexible")));
    }

    #[tokio::test]
    async fn test_first_seen_wins_tie() {
        let rates = FakeRates::default()
            .with("Octopus Go", flat_schedule(45.0, 50.0))
            .with("Agile Octopus", flat_schedule(45.0, 50.0));
        let account = snapshot(tariff("flexible"));
        let comparator = Comparator::builder().rate_provider(&rates).build();

        let result = comparator
            .compare(&account, current_cost(600.0), &[tariff("agile"), tariff("go")])
            .await
            .unwrap();
        assert_eq!(result.cheapest, Some(tariff("agile")));

        // The current tariff is seen first.
        let result = comparator
            .compare(&account, current_cost(500.0), &[tariff("agile"), tariff("go")])
            .await
            .unwrap();
        assert_eq!(result.cheapest, Some(tariff("flexible")));
    }

    #[tokio::test]
    async fn test_idempotent() {
        let rates = FakeRates::default()
            .with("Octopus Go", flat_schedule(25.0, 50.0))
            .failing("Agile Octopus", "boom");
        let account = snapshot(tariff("flexible"));
        let comparator = Comparator::builder().rate_provider(&rates).build();
        let candidates = [tariff("go"), tariff("agile")];
        let first = comparator.compare(&account, current_cost(500.0), &candidates).await.unwrap();
        let second = comparator.compare(&account, current_cost(500.0), &candidates).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_cancelled() {
        let rates = FakeRates::default();
        let shutdown = Shutdown::default();
        shutdown.request();
        let account = snapshot(tariff("flexible"));
        let result = Comparator::builder()
            .rate_provider(&rates)
            .shutdown(shutdown)
            .build()
            .compare(&account, current_cost(500.0), &[tariff("go")])
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_billed_breakdown() {
        let account = snapshot(tariff("flexible"));
        let breakdown = CostBreakdown::billed(&account);
        assert_abs_diff_eq!(breakdown.consumption_cost.0, 240.0);
        assert_abs_diff_eq!(breakdown.standing_charge.0, 45.0);
        assert_abs_diff_eq!(breakdown.total_cost.0, 285.0);
        assert_abs_diff_eq!(breakdown.total_energy.0, 10.0);
    }
}
