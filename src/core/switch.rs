use std::time::Duration;

use chrono::NaiveDate;
use humantime::format_duration;
use serde::Serialize;

use crate::{
    api::SwitchGateway,
    core::{decision::SwitchOutcome, shutdown::Shutdown, tariff::Tariff},
    notify::{Notification, Notifier},
    prelude::*,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchState {
    Idle,
    Initiating,
    AwaitingAgreement,
    Verifying,
    Verified,
    Unverified,
    Failed,
}

impl SwitchState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Verified | Self::Unverified | Self::Failed)
    }
}

/// Waits of a switch attempt.
#[derive(Copy, Clone, Debug)]
pub struct RetryPolicy {
    /// Time the supplier needs to generate the new agreement.
    pub agreement_delay: Duration,

    /// Pause before every verification retry.
    pub verification_delay: Duration,

    /// Total number of verification checks.
    pub verification_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            agreement_delay: Duration::from_secs(120),
            verification_delay: Duration::from_secs(60),
            verification_attempts: 2,
        }
    }
}

#[cfg(test)]
impl RetryPolicy {
    pub const IMMEDIATE: Self = Self {
        agreement_delay: Duration::ZERO,
        verification_delay: Duration::ZERO,
        verification_attempts: 2,
    };
}

#[derive(Debug, thiserror::Error)]
#[error("missing {0}, the switch has not been attempted")]
pub struct MissingIdentifier(pub &'static str);

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SwitchReport {
    pub state: SwitchState,

    /// Every state the attempt went through, starting with [`SwitchState::Idle`].
    pub history: Vec<SwitchState>,

    pub enrolment_id: Option<String>,
    pub accepted_version: Option<String>,
    pub error: Option<String>,
}

impl Default for SwitchReport {
    fn default() -> Self {
        Self {
            state: SwitchState::Idle,
            history: vec![SwitchState::Idle],
            enrolment_id: None,
            accepted_version: None,
            error: None,
        }
    }
}

impl SwitchReport {
    fn transition(&mut self, to: SwitchState) {
        info!(from = ?self.state, ?to, "transition");
        self.state = to;
        self.history.push(to);
    }

    fn fail(mut self, error: String) -> Self {
        warn!(state = ?self.state, "switch failed: {error}");
        self.transition(SwitchState::Failed);
        self.error = Some(error);
        self
    }

    pub fn outcome(&self) -> SwitchOutcome {
        match self.state {
            SwitchState::Verified => SwitchOutcome::Switched { verified: true },
            SwitchState::Unverified => SwitchOutcome::Switched { verified: false },
            _ => SwitchOutcome::Failed(
                self.error.clone().unwrap_or_else(|| format!("stopped in {:?}", self.state)),
            ),
        }
    }
}

/// Drives a single switch: initiate, wait, accept the terms, verify with retries.
#[derive(bon::Builder)]
pub struct SwitchExecutor<'a> {
    gateway: &'a dyn SwitchGateway,
    notifier: &'a dyn Notifier,

    #[builder(default)]
    policy: RetryPolicy,

    #[builder(default)]
    shutdown: Shutdown,

    /// Skip the progress notifications.
    #[builder(default)]
    quiet: bool,
}

impl SwitchExecutor<'_> {
    /// Errors before initiating end in [`SwitchState::Failed`], verification problems only
    /// degrade the result to [`SwitchState::Unverified`].
    #[instrument(skip_all, fields(target = target.id, on = %on))]
    pub async fn execute(
        &self,
        target: &Tariff,
        product_code: Option<&str>,
        meter_id: Option<&str>,
        on: NaiveDate,
    ) -> Result<SwitchReport, MissingIdentifier> {
        let product_code = product_code.ok_or(MissingIdentifier("product code"))?;
        let meter_id = meter_id.ok_or(MissingIdentifier("meter point number"))?;
        let mut report = SwitchReport::default();

        report.transition(SwitchState::Initiating);
        let enrolment_id = match self.gateway.initiate(product_code, meter_id, on).await {
            Ok(Some(enrolment_id)) => enrolment_id,
            Ok(None) => return Ok(report.fail("the supplier returned no enrolment ID".into())),
            Err(error) => {
                return Ok(report.fail(format!("failed to request the switch: {error:#}")));
            }
        };
        report.enrolment_id = Some(enrolment_id.clone());

        report.transition(SwitchState::AwaitingAgreement);
        self.notify(format!(
            "Switch to {target} requested. Waiting {} before accepting the new agreement.",
            format_duration(self.policy.agreement_delay),
        ))
        .await;
        if let Err(error) = self.shutdown.sleep(self.policy.agreement_delay).await {
            return Ok(report.fail(error.to_string()));
        }
        let accepted_version =
            match self.gateway.accept_agreement(product_code, &enrolment_id).await {
                Ok(accepted_version) => accepted_version,
                Err(error) => {
                    return Ok(report.fail(format!("failed to accept the agreement: {error:#}")));
                }
            };
        self.notify(format!("Accepted the new agreement (v{accepted_version}).")).await;
        report.accepted_version = Some(accepted_version);

        report.transition(SwitchState::Verifying);
        if self.verify(on).await {
            report.transition(SwitchState::Verified);
            self.notify("Verified the new agreement.".to_string()).await;
        } else {
            report.transition(SwitchState::Unverified);
            let mut message = format!(
                "Unable to verify the switch to {target}. Please check your account and emails.",
            );
            if let Some(url) = self.gateway.messages_url() {
                message = format!("{message}\n{url}");
            }
            self.notify(message).await;
        }
        Ok(report)
    }

    async fn verify(&self, on: NaiveDate) -> bool {
        for attempt in 1..=self.policy.verification_attempts.max(1) {
            if attempt != 1 {
                self.notify(format!(
                    "Verification failed, trying again in {}…",
                    format_duration(self.policy.verification_delay),
                ))
                .await;
                if self.shutdown.sleep(self.policy.verification_delay).await.is_err() {
                    return false;
                }
            }
            match self.gateway.verify_starts_on(on).await {
                Ok(true) => return true,
                Ok(false) => info!(attempt, "the new agreement is not active yet"),
                Err(error) => warn!(attempt, "failed to verify: {error:#}"),
            }
        }
        false
    }

    async fn notify(&self, message: String) {
        if self.quiet {
            return;
        }
        self.notifier.send(Notification::info(message)).await;
    }
}
