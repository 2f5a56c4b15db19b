use serde::{Deserialize, Serialize};

use crate::{
    core::interval::Validity,
    quantity::{cost::Cost, rate::KilowattHourRate},
};

#[derive(
    Copy, Clone, Debug, Default, Eq, PartialEq, Hash, clap::ValueEnum, Serialize, Deserialize,
)]
pub enum PaymentMethod {
    #[default]
    #[serde(rename = "DIRECT_DEBIT")]
    DirectDebit,

    #[serde(rename = "NON_DIRECT_DEBIT")]
    NonDirectDebit,

    /// Anything the supplier may introduce later; never matches an account.
    #[value(skip)]
    #[serde(other)]
    Other,
}

/// Unit rate valid over a time window.
#[derive(Clone, Debug, PartialEq)]
pub struct RatePeriod {
    pub value: KilowattHourRate,
    pub validity: Validity,

    /// `None` applies to every payment method.
    pub payment_method: Option<PaymentMethod>,
}

impl RatePeriod {
    /// Check whether the rate applies to a reading taken at the specified time.
    pub fn applies_to(&self, at: chrono::DateTime<chrono::Utc>, method: PaymentMethod) -> bool {
        self.validity.contains(at)
            && self.payment_method.is_none_or(|rate_method| {
                rate_method == method && rate_method != PaymentMethod::Other
            })
    }
}

/// Everything fetched for one tariff on one day.
#[derive(Clone, Debug, PartialEq)]
pub struct RateSchedule {
    pub standing_charge: Cost,

    /// In the provider order.
    pub periods: Vec<RatePeriod>,

    /// Product to switch to, resolved for this run only.
    pub product_code: String,
}
