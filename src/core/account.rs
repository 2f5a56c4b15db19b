use std::fmt::{Display, Formatter};

use chrono::NaiveDate;

use crate::{
    core::{consumption::ConsumptionPeriod, tariff::Tariff},
    prelude::*,
    quantity::cost::Cost,
};

/// Electricity region, the last character of a tariff code.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Region(char);

impl Region {
    pub const fn code(self) -> char {
        self.0
    }

    pub fn from_tariff_code(tariff_code: &str) -> Result<Self> {
        let last = tariff_code.chars().last().context("empty tariff code")?;
        Self::try_from(last).with_context(|| format!("invalid tariff code `{tariff_code}`"))
    }
}

impl TryFrom<char> for Region {
    type Error = Error;

    fn try_from(code: char) -> Result<Self> {
        let code = code.to_ascii_uppercase();
        ensure!(('A'..='P').contains(&code), "`{code}` is not a region code");
        Ok(Self(code))
    }
}

impl Display for Region {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account state for the day being compared.
#[derive(Clone, Debug, bon::Builder)]
pub struct AccountSnapshot {
    /// Day the consumption belongs to.
    pub date: NaiveDate,

    pub current_tariff: Tariff,

    #[builder(into)]
    pub tariff_code: String,

    pub region: Region,

    /// Standing charge of the current tariff, tax included.
    pub standing_charge: Cost,

    #[builder(default)]
    pub consumption: Vec<ConsumptionPeriod>,

    /// Supply point to switch, if known.
    #[builder(into)]
    pub meter_id: Option<String>,
}
