//! A single comparison run: fetch, compare, decide, switch and record.

use chrono::{NaiveDate, Utc};
use itertools::Itertools;

use crate::{
    api::{AccountProvider, RateProvider, SwitchGateway},
    core::{
        account::AccountSnapshot,
        comparison::{Comparator, ComparisonResult, CostBreakdown, StayOption, TariffComparison},
        decision::{Decision, SwitchOutcome, should_switch},
        rate::PaymentMethod,
        record::{DecisionRecord, RunRecorder},
        shutdown::Shutdown,
        switch::{RetryPolicy, SwitchExecutor},
        tariff::Tariff,
    },
    notify::{Notification, Notifier},
    prelude::*,
    quantity::cost::Cost,
};

pub const DEFAULT_THRESHOLD: Cost = Cost::from_pence(2.0);

const DRY_RUN_SWITCH: &str = "DRY RUN: Not going through with the switch today.";

pub struct Report {
    pub comparison: ComparisonResult,
    pub record: DecisionRecord,
}

#[derive(bon::Builder)]
pub struct Bot<'a> {
    account_provider: &'a dyn AccountProvider,
    rate_provider: &'a dyn RateProvider,
    gateway: &'a dyn SwitchGateway,
    notifier: &'a dyn Notifier,
    recorder: &'a dyn RunRecorder,

    /// Tariffs to compare against.
    tariffs: &'a [Tariff],

    #[builder(default = DEFAULT_THRESHOLD)]
    threshold: Cost,

    #[builder(default)]
    dry_run: bool,

    /// Send a single summary with the outcome instead of every step.
    #[builder(default)]
    only_results: bool,

    #[builder(default)]
    payment_method: PaymentMethod,

    #[builder(default)]
    stay_option: StayOption,

    #[builder(default)]
    policy: RetryPolicy,

    #[builder(default)]
    shutdown: Shutdown,
}

impl Bot<'_> {
    /// Run and send an error notification if the run fails.
    pub async fn run_reporting(&self, on: NaiveDate) -> Result<Report> {
        let result = self.run(on).await;
        if let Err(error) = &result {
            self.notifier.send(Notification::error(format!("{error:#}")).unbatched()).await;
        }
        result
    }

    /// Compare the costs on the day and switch when it is worth it.
    ///
    /// Failing to fetch the account aborts the run without a record,
    /// failures of individual tariffs and of the switch are recorded instead.
    #[instrument(skip_all, fields(on = %on, dry_run = self.dry_run))]
    pub async fn run(&self, on: NaiveDate) -> Result<Report> {
        let prefix = if self.dry_run { "DRY RUN: " } else { "" };
        self.notify(format!("{prefix}Starting comparison of today's costs…")).await;

        let account = self
            .account_provider
            .get_snapshot(on)
            .await
            .context("could not fetch the account information, check the account setup and the API key permissions")?;
        let comparison = Comparator::builder()
            .rate_provider(self.rate_provider)
            .payment_method(self.payment_method)
            .stay_option(self.stay_option)
            .shutdown(self.shutdown.clone())
            .build()
            .compare(&account, CostBreakdown::billed(&account), self.tariffs)
            .await?;

        let summary = summarize(&comparison);
        let target = comparison.cheapest.filter(|_| should_switch(&comparison, self.threshold));
        let outcome = match target {
            Some(target) => {
                self.notify_step(format!("{summary}\nInitiating switch to {target}.")).await;
                if self.dry_run {
                    self.notify_step(DRY_RUN_SWITCH.to_string()).await;
                    SwitchOutcome::Suppressed
                } else {
                    self.switch(&account, &comparison, &target).await
                }
            }
            None => {
                self.notify_step(format!("{summary}\n{}", self.explain_staying(&comparison)))
                    .await;
                SwitchOutcome::NotDue
            }
        };
        if self.only_results {
            let result = self.describe_outcome(&comparison, target, &outcome);
            let message = format!("{summary}\n{result}");
            let notification = if matches!(outcome, SwitchOutcome::Failed(_)) {
                Notification::error(message)
            } else {
                Notification::info(message)
            };
            self.notifier.send(notification).await;
        }

        let decision = Decision::classify(&comparison, &outcome);
        info!(action = ?decision.action, reason = ?decision.reason, "decided");
        let record =
            DecisionRecord::new(Utc::now(), &comparison, decision, self.dry_run, self.threshold);
        self.recorder.persist(&record).context("failed to save the decision record")?;
        Ok(Report { comparison, record })
    }

    async fn switch(
        &self,
        account: &AccountSnapshot,
        comparison: &ComparisonResult,
        target: &Tariff,
    ) -> SwitchOutcome {
        let product_code = comparison.get(target).and_then(TariffComparison::product_code);
        let result = SwitchExecutor::builder()
            .gateway(self.gateway)
            .notifier(self.notifier)
            .policy(self.policy)
            .shutdown(self.shutdown.clone())
            .quiet(self.only_results)
            .build()
            .execute(target, product_code, account.meter_id.as_deref(), account.date)
            .await;
        let outcome = match result {
            Ok(report) => report.outcome(),
            Err(error) => SwitchOutcome::Failed(error.to_string()),
        };
        if let SwitchOutcome::Failed(error) = &outcome
            && !self.only_results
        {
            self.notifier
                .send(Notification::error(format!("Switch to {target} failed: {error}")))
                .await;
        }
        outcome
    }

    fn explain_staying(&self, comparison: &ComparisonResult) -> String {
        match (comparison.cheapest, comparison.current.total_cost()) {
            (Some(cheapest), _) if comparison.is_current_cheapest() => {
                let cost = comparison.current.total_cost().unwrap_or(Cost::ZERO);
                format!("You are already on the cheapest tariff: {cheapest} at {cost}.")
            }
            (Some(_), Some(_)) => format!(
                "Not switching today: savings of {} do not exceed the threshold of {}.",
                comparison.potential_savings, self.threshold,
            ),
            _ => "Not switching today: no eligible tariff.".to_string(),
        }
    }

    fn describe_outcome(
        &self,
        comparison: &ComparisonResult,
        target: Option<Tariff>,
        outcome: &SwitchOutcome,
    ) -> String {
        match (target, outcome) {
            (_, SwitchOutcome::Suppressed) => DRY_RUN_SWITCH.to_string(),
            (Some(target), SwitchOutcome::Switched { verified: true }) => {
                format!("Switched to {target}.")
            }
            (Some(target), SwitchOutcome::Switched { verified: false }) => {
                format!("Switched to {target}, the new agreement is not verified yet.")
            }
            (Some(target), SwitchOutcome::Failed(error)) => {
                format!("Switch to {target} failed: {error}")
            }
            _ => self.explain_staying(comparison),
        }
    }

    async fn notify(&self, message: String) {
        self.notifier.send(Notification::info(message)).await;
    }

    /// Intermediate message, suppressed when only the results are reported.
    async fn notify_step(&self, message: String) {
        if !self.only_results {
            self.notify(message).await;
        }
    }
}

/// Human-readable costs of every compared tariff.
fn summarize(comparison: &ComparisonResult) -> String {
    let total_energy =
        comparison.current.breakdown().map(|breakdown| breakdown.total_energy).unwrap_or_default();
    let lines = comparison.all().map(|tariff_comparison| {
        let tariff = tariff_comparison.tariff;
        let label = if tariff == comparison.current.tariff {
            format!("Current tariff {tariff}")
        } else {
            format!("Potential cost on {tariff}")
        };
        tariff_comparison.breakdown().map_or_else(
            || match tariff_comparison.error() {
                Some(error) => format!("No cost for {tariff}: {error}"),
                None => format!("No cost for {tariff}"),
            },
            |breakdown| {
                format!(
                    "{label}: {} ({} con + {} s/c)",
                    breakdown.total_cost, breakdown.consumption_cost, breakdown.standing_charge,
                )
            },
        )
    });
    std::iter::once(format!("Total consumption today: {total_energy}")).chain(lines).join("\n")
}
