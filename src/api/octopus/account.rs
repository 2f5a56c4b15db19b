use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use serde_with::{DisplayFromStr, PickFirst, serde_as};

use super::Api;
use crate::{
    api::{AccountDataError, AccountField, AccountProvider},
    core::{
        account::{AccountSnapshot, Region},
        consumption::ConsumptionPeriod,
        tariff::Tariff,
    },
    prelude::*,
    quantity::cost::Cost,
};

const ACCOUNT: &str = "
    query Account($accountNumber: String!) {
        account(accountNumber: $accountNumber) {
            electricityAgreements(active: true) {
                validFrom
                tariff {
                    ... on TariffType { tariffCode standingCharge }
                }
                meterPoint {
                    mpan
                    direction
                    meters(includeInactive: false) {
                        smartDevices { deviceId }
                    }
                }
            }
        }
    }
";

const TELEMETRY: &str = "
    query Telemetry($deviceId: String!, $start: DateTime!, $end: DateTime!) {
        smartMeterTelemetry(deviceId: $deviceId, start: $start, end: $end, grouping: HALF_HOURLY) {
            readAt
            consumptionDelta
            costDeltaWithTax
        }
    }
";

#[derive(Deserialize)]
struct AccountData {
    account: Account,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Account {
    #[serde(default)]
    electricity_agreements: Vec<Agreement>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agreement {
    pub valid_from: Option<String>,
    tariff: Option<AgreementTariff>,
    meter_point: Option<MeterPoint>,
}

impl Agreement {
    /// Export agreements are explicitly marked, everything else is import.
    fn is_import(&self) -> bool {
        self.meter_point.as_ref().is_none_or(|meter_point| {
            meter_point.direction.as_deref().is_none_or(|direction| direction != "EXPORT")
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgreementTariff {
    tariff_code: Option<String>,
    standing_charge: Option<Cost>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MeterPoint {
    mpan: Option<String>,
    direction: Option<String>,

    #[serde(default)]
    meters: Vec<Meter>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Meter {
    #[serde(default)]
    smart_devices: Vec<SmartDevice>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SmartDevice {
    device_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TelemetryData {
    smart_meter_telemetry: Option<Vec<Reading>>,
}

/// Numbers may come as strings.
#[serde_as]
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Reading {
    read_at: DateTime<Utc>,

    /// Watt-hours.
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    consumption_delta: f64,

    /// Pence, tax included.
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    cost_delta_with_tax: Option<f64>,
}

impl From<Reading> for ConsumptionPeriod {
    fn from(reading: Reading) -> Self {
        Self::from_watt_hours(
            reading.read_at,
            reading.consumption_delta,
            reading.cost_delta_with_tax.map(Cost::from_pence),
        )
    }
}

impl Api {
    pub(super) async fn get_agreements(&self) -> Result<Vec<Agreement>> {
        let data: AccountData = self
            .graphql
            .execute("Account", ACCOUNT, json!({ "accountNumber": self.account_number }))
            .await?;
        Ok(data.account.electricity_agreements)
    }

    async fn get_telemetry(&self, device_id: &str, on: NaiveDate) -> Result<Vec<Reading>> {
        let data: TelemetryData = self
            .graphql
            .execute(
                "Telemetry",
                TELEMETRY,
                json!({
                    "deviceId": device_id,
                    "start": format!("{on}T00:00:00Z"),
                    "end": format!("{on}T23:59:59Z"),
                }),
            )
            .await?;
        Ok(data.smart_meter_telemetry.unwrap_or_default())
    }
}

#[async_trait]
impl AccountProvider for Api {
    #[instrument(skip_all, fields(on = %on))]
    async fn get_snapshot(&self, on: NaiveDate) -> Result<AccountSnapshot> {
        info!("fetching the account…");
        let agreement = self
            .get_agreements()
            .await?
            .into_iter()
            .find(Agreement::is_import)
            .ok_or(AccountDataError(AccountField::ImportAgreement))?;
        let tariff = agreement.tariff.as_ref();
        let tariff_code = tariff
            .and_then(|tariff| tariff.tariff_code.clone())
            .ok_or(AccountDataError(AccountField::TariffCode))?;
        let standing_charge = tariff
            .and_then(|tariff| tariff.standing_charge)
            .ok_or(AccountDataError(AccountField::StandingCharge))?;
        let meter_point = agreement.meter_point.as_ref();
        let meter_id = meter_point
            .and_then(|meter_point| meter_point.mpan.clone())
            .ok_or(AccountDataError(AccountField::MeterId))?;
        let device_id = meter_point
            .into_iter()
            .flat_map(|meter_point| &meter_point.meters)
            .flat_map(|meter| &meter.smart_devices)
            .find_map(|device| device.device_id.clone())
            .ok_or(AccountDataError(AccountField::DeviceId))?;

        let current_tariff = Tariff::identify(&tariff_code)
            .with_context(|| format!("tariff code `{tariff_code}` matches no known tariff"))?;
        let region = Region::from_tariff_code(&tariff_code)?;
        info!(%tariff_code, current_tariff = current_tariff.id, %region, "resolved the agreement");

        let consumption: Vec<ConsumptionPeriod> = self
            .get_telemetry(&device_id, on)
            .await
            .context("failed to fetch the consumption")?
            .into_iter()
            .map(ConsumptionPeriod::from)
            .collect();
        info!(n_readings = consumption.len(), "fetched the consumption");

        Ok(AccountSnapshot::builder()
            .date(on)
            .current_tariff(current_tariff)
            .tariff_code(tariff_code)
            .region(region)
            .standing_charge(standing_charge)
            .consumption(consumption)
            .meter_id(meter_id)
            .build())
    }
}
