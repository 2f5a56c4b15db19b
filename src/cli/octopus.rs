use clap::Parser;
use reqwest::Url;

use crate::{
    api::octopus::{Api, Backoff},
    prelude::*,
};

#[derive(Parser)]
pub struct OctopusApiArgs {
    #[clap(long = "api-key", env = "OCTOPUS_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Account number, for example `A-1234ABCD`.
    #[clap(long, env = "OCTOPUS_ACCOUNT_NUMBER")]
    pub account_number: String,

    #[clap(long, env = "OCTOPUS_BASE_URL", default_value = "https://api.octopus.energy/v1/")]
    pub base_url: Url,

    /// Total number of attempts of a failing API call.
    #[clap(long = "api-retries", env = "API_RETRIES", default_value = "5")]
    pub max_attempts: u32,

    /// Delay after the first failed attempt, doubled after every next one.
    #[clap(long = "api-retry-delay", env = "API_RETRY_DELAY", default_value = "30s")]
    pub retry_delay: humantime::Duration,
}

impl OctopusApiArgs {
    pub fn connect(&self) -> Result<Api> {
        let backoff =
            Backoff { max_attempts: self.max_attempts.max(1), base_delay: self.retry_delay.into() };
        Api::try_new(self.base_url.clone(), self.api_key.clone(), self.account_number.clone(), backoff)
    }
}
