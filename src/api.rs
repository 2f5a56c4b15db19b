//! Collaborators of the engine and their Octopus Energy implementation.

pub mod octopus;

use std::fmt::{Display, Formatter};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{
    core::{account::AccountSnapshot, account::Region, rate::RateSchedule},
    prelude::*,
};

#[async_trait]
pub trait RateProvider: Sync {
    /// Fetch the standing charge and unit rates of the product on the date.
    async fn get_rates(
        &self,
        api_display_name: &str,
        region: Region,
        on: NaiveDate,
    ) -> Result<RateSchedule>;
}

#[async_trait]
pub trait AccountProvider: Sync {
    /// Fetch the current tariff, meter identity and the consumption on the date.
    async fn get_snapshot(&self, on: NaiveDate) -> Result<AccountSnapshot>;
}

#[async_trait]
pub trait SwitchGateway: Sync {
    /// Start the switch and return the enrolment ID, if the supplier registered it.
    async fn initiate(
        &self,
        product_code: &str,
        meter_id: &str,
        on: NaiveDate,
    ) -> Result<Option<String>>;

    /// Accept the latest terms of the product and return the accepted version.
    async fn accept_agreement(&self, product_code: &str, enrolment_id: &str) -> Result<String>;

    /// Check whether any agreement on the account starts on the switch date.
    async fn verify_starts_on(&self, on: NaiveDate) -> Result<bool>;

    /// Page where the supplier posts messages about the account.
    fn messages_url(&self) -> Option<String> {
        None
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("no import product found for `{0}`")]
    TariffNotFound(String),

    #[error("region `_{0}` not found in the product `{1}`")]
    RegionNotFound(Region, String),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AccountField {
    ImportAgreement,
    TariffCode,
    StandingCharge,
    MeterId,
    DeviceId,
}

impl Display for AccountField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::ImportAgreement => "import agreement",
            Self::TariffCode => "tariff code",
            Self::StandingCharge => "standing charge",
            Self::MeterId => "meter point number (MPAN)",
            Self::DeviceId => "smart meter device ID",
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("no {0} found in the account data")]
pub struct AccountDataError(pub AccountField);
