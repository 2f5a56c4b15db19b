use std::path::PathBuf;

use clap::Parser;

use crate::{
    core::{
        comparison::StayOption,
        rate::PaymentMethod,
        switch::RetryPolicy,
        tariff::Tariff,
    },
    quantity::cost::Cost,
};

#[derive(Parser)]
pub struct BotArgs {
    /// Tariffs to compare with the current one.
    #[clap(
        long,
        env = "TARIFFS",
        value_delimiter = ',',
        num_args = 1..,
        default_value = "go,agile,flexible",
    )]
    pub tariffs: Vec<String>,

    /// Switch only when the savings exceed the threshold.
    #[clap(long = "switch-threshold-pence", env = "SWITCH_THRESHOLD_PENCE", default_value = "2")]
    pub threshold: Cost,

    /// Decide but never switch.
    #[clap(long, env = "DRY_RUN")]
    pub dry_run: bool,

    /// Send one message with the costs and the outcome instead of every step.
    #[clap(long = "only-results-notifications", env = "ONLY_RESULTS_NOTIFICATIONS")]
    pub only_results: bool,

    #[clap(long, env = "PAYMENT_METHOD", default_value = "direct-debit")]
    pub payment_method: PaymentMethod,

    /// Whether the current tariff competes when it is not switchable itself.
    #[clap(long, env = "STAY_OPTION", default_value = "always")]
    pub stay_option: StayOption,

    /// Time the supplier needs to generate the new agreement.
    #[clap(long, env = "AGREEMENT_DELAY", default_value = "120s")]
    agreement_delay: humantime::Duration,

    #[clap(long, env = "VERIFICATION_DELAY", default_value = "60s")]
    verification_delay: humantime::Duration,

    #[clap(long, env = "VERIFICATION_ATTEMPTS", default_value = "2")]
    verification_attempts: u32,

    #[clap(long, env = "LAST_RUN_PATH", default_value = "last_run.json")]
    pub last_run_path: PathBuf,
}

impl BotArgs {
    /// Resolve the configured tariffs, returning the unknown IDs separately.
    pub fn resolve_tariffs(&self) -> (Vec<Tariff>, Vec<String>) {
        Tariff::resolve_all(&self.tariffs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            agreement_delay: self.agreement_delay.into(),
            verification_delay: self.verification_delay.into(),
            verification_attempts: self.verification_attempts,
        }
    }
}
