//! Test doubles for the collaborators.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, TimeDelta, TimeZone, Utc};

use crate::{
    api::{AccountProvider, ProviderError, RateProvider, SwitchGateway},
    core::{
        account::{AccountSnapshot, Region},
        consumption::ConsumptionPeriod,
        interval::Validity,
        rate::{RatePeriod, RateSchedule},
        record::{DecisionRecord, RunRecorder},
        tariff::Tariff,
    },
    notify::{Notification, Notifier},
    prelude::*,
    quantity::{cost::Cost, rate::KilowattHourRate},
};

pub fn tariff(id: &str) -> Tariff {
    Tariff::lookup(id).unwrap()
}

pub fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
}

/// Ten kilowatt-hours in four half-hour periods, billed 240p with a 45p standing charge.
pub fn snapshot(current_tariff: Tariff) -> AccountSnapshot {
    let midnight = Utc.from_utc_datetime(&date().and_hms_opt(0, 0, 0).unwrap());
    let consumption = (1..=4)
        .map(|index| {
            ConsumptionPeriod::from_watt_hours(
                midnight + TimeDelta::minutes(30 * index),
                2500.0,
                Some(Cost::from_pence(60.0)),
            )
        })
        .collect();
    AccountSnapshot::builder()
        .date(date())
        .current_tariff(current_tariff)
        .tariff_code("E-1R-TEST-25-01-01-C")
        .region(Region::try_from('C').unwrap())
        .standing_charge(Cost::from_pence(45.0))
        .consumption(consumption)
        .meter_id("1900000000000")
        .build()
}

/// Single open-ended rate valid since the beginning of 2025.
pub fn flat_schedule(rate: f64, standing_charge: f64) -> RateSchedule {
    RateSchedule {
        standing_charge: Cost::from_pence(standing_charge),
        periods: vec![RatePeriod {
            value: KilowattHourRate::from(rate),
            validity: Validity::open(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()),
            payment_method: None,
        }],
        product_code: String::new(),
    }
}

pub struct FakeAccount(pub Result<AccountSnapshot, String>);

#[async_trait]
impl AccountProvider for FakeAccount {
    async fn get_snapshot(&self, _on: NaiveDate) -> Result<AccountSnapshot> {
        self.0.clone().map_err(|error| anyhow!("{error}"))
    }
}

#[derive(Default)]
pub struct FakeRates(HashMap<String, Result<RateSchedule, String>>);

impl FakeRates {
    pub fn with(mut self, api_display_name: &str, mut schedule: RateSchedule) -> Self {
        schedule.product_code = format!("{}-PRODUCT", api_display_name.to_uppercase());
        self.0.insert(api_display_name.to_string(), Ok(schedule));
        self
    }

    pub fn failing(mut self, api_display_name: &str, error: &str) -> Self {
        self.0.insert(api_display_name.to_string(), Err(error.to_string()));
        self
    }
}

#[async_trait]
impl RateProvider for FakeRates {
    async fn get_rates(
        &self,
        api_display_name: &str,
        _region: Region,
        _on: NaiveDate,
    ) -> Result<RateSchedule> {
        match self.0.get(api_display_name) {
            Some(Ok(schedule)) => Ok(schedule.clone()),
            Some(Err(error)) => Err(anyhow!("{error}")),
            None => Err(ProviderError::TariffNotFound(api_display_name.to_string()).into()),
        }
    }
}

/// Scripted switch gateway recording the calls it receives.
pub struct FakeGateway {
    pub enrolment_id: Result<Option<String>, String>,
    pub accepted: Result<String, String>,

    /// Consumed front to back, an exhausted script keeps answering `false`.
    pub verifications: Mutex<Vec<Result<bool, String>>>,

    pub calls: Mutex<Vec<String>>,
}

impl FakeGateway {
    pub fn verifying(verifications: Vec<Result<bool, String>>) -> Self {
        Self {
            enrolment_id: Ok(Some("ENROLMENT-1".to_string())),
            accepted: Ok("1.2".to_string()),
            verifications: Mutex::new(verifications),
            calls: Mutex::default(),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl SwitchGateway for FakeGateway {
    async fn initiate(
        &self,
        product_code: &str,
        meter_id: &str,
        on: NaiveDate,
    ) -> Result<Option<String>> {
        self.record(format!("initiate {product_code} {meter_id} {on}"));
        self.enrolment_id.clone().map_err(|error| anyhow!("{error}"))
    }

    async fn accept_agreement(&self, product_code: &str, enrolment_id: &str) -> Result<String> {
        self.record(format!("accept {product_code} {enrolment_id}"));
        self.accepted.clone().map_err(|error| anyhow!("{error}"))
    }

    async fn verify_starts_on(&self, on: NaiveDate) -> Result<bool> {
        self.record(format!("verify {on}"));
        let mut verifications = self.verifications.lock().unwrap();
        if verifications.is_empty() {
            return Ok(false);
        }
        verifications.remove(0).map_err(|error| anyhow!("{error}"))
    }

    fn messages_url(&self) -> Option<String> {
        Some("https://example.test/messages".to_string())
    }
}

#[derive(Default)]
pub struct RecordingNotifier(pub Mutex<Vec<Notification>>);

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.0.lock().unwrap().iter().map(|notification| notification.message.clone()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: Notification) {
        self.0.lock().unwrap().push(notification);
    }
}

#[derive(Default)]
pub struct MemoryRecorder(Mutex<Vec<DecisionRecord>>);

impl MemoryRecorder {
    pub fn records(&self) -> Vec<DecisionRecord> {
        self.0.lock().unwrap().clone()
    }
}

impl RunRecorder for MemoryRecorder {
    fn persist(&self, record: &DecisionRecord) -> Result {
        self.0.lock().unwrap().push(record.clone());
        Ok(())
    }
}
