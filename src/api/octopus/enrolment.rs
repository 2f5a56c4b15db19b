use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use super::Api;
use crate::{api::SwitchGateway, prelude::*};

const START_ONBOARDING: &str = "
    mutation StartOnboarding($input: StartOnboardingProcessInput!) {
        startOnboardingProcess(input: $input) {
            productEnrolment { id }
        }
    }
";

const TERMS: &str = "
    query Terms($productCode: String!) {
        termsAndConditionsForProduct(productCode: $productCode) { version }
    }
";

const ACCEPT_TERMS: &str = "
    mutation AcceptTerms($input: AcceptTermsAndConditionsInput!) {
        acceptTermsAndConditions(input: $input) { acceptedVersion }
    }
";

/// Version assumed when the product publishes none.
const DEFAULT_TERMS_VERSION: &str = "1.0";

/// Split `major.minor` into numbers, the minor part defaults to zero.
fn parse_version(version: &str) -> Result<(u32, u32)> {
    let (major, minor) = version.split_once('.').unwrap_or((version, "0"));
    let parse = |part: &str| {
        part.trim().parse::<u32>().with_context(|| format!("invalid terms version `{version}`"))
    };
    Ok((parse(major)?, parse(minor)?))
}

/// Check whether the agreement start, a date or a date-time, falls on the day.
fn starts_on(valid_from: &str, on: NaiveDate) -> bool {
    valid_from.get(..10).and_then(|date| date.parse::<NaiveDate>().ok()) == Some(on)
}

#[async_trait]
impl SwitchGateway for Api {
    #[instrument(skip_all, fields(product_code = product_code, on = %on))]
    async fn initiate(
        &self,
        product_code: &str,
        meter_id: &str,
        on: NaiveDate,
    ) -> Result<Option<String>> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Data {
            start_onboarding_process: Option<Process>,
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Process {
            product_enrolment: Option<Enrolment>,
        }

        #[derive(Deserialize)]
        struct Enrolment {
            id: Option<String>,
        }

        info!("starting the enrolment…");
        let variables = json!({
            "input": {
                "accountNumber": self.account_number,
                "mpan": meter_id,
                "targetAgreementChangeDate": on,
                "productCode": product_code,
            },
        });
        let data: Data = self.graphql.execute("StartOnboarding", START_ONBOARDING, variables).await?;
        let enrolment_id = data
            .start_onboarding_process
            .and_then(|process| process.product_enrolment)
            .and_then(|enrolment| enrolment.id);
        info!(?enrolment_id, "started");
        Ok(enrolment_id)
    }

    #[instrument(skip_all, fields(product_code = product_code, enrolment_id = enrolment_id))]
    async fn accept_agreement(&self, product_code: &str, enrolment_id: &str) -> Result<String> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct TermsData {
            terms_and_conditions_for_product: Option<Terms>,
        }

        #[derive(Deserialize)]
        struct Terms {
            version: Option<String>,
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct AcceptData {
            accept_terms_and_conditions: Option<Accepted>,
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Accepted {
            accepted_version: Option<String>,
        }

        let terms: TermsData = self
            .graphql
            .execute("Terms", TERMS, json!({ "productCode": product_code }))
            .await
            .context("failed to fetch the terms and conditions")?;
        let version = terms
            .terms_and_conditions_for_product
            .and_then(|terms| terms.version)
            .unwrap_or_else(|| DEFAULT_TERMS_VERSION.to_string());
        let (major, minor) = parse_version(&version)?;
        info!(major, minor, "accepting the terms…");

        let variables = json!({
            "input": {
                "accountNumber": self.account_number,
                "enrolmentId": enrolment_id,
                "termsVersion": { "versionMajor": major, "versionMinor": minor },
            },
        });
        let accepted: AcceptData =
            self.graphql.execute("AcceptTerms", ACCEPT_TERMS, variables).await?;
        let accepted_version = accepted
            .accept_terms_and_conditions
            .and_then(|accepted| accepted.accepted_version)
            .unwrap_or(version);
        info!(%accepted_version, "accepted");
        Ok(accepted_version)
    }

    #[instrument(skip_all, fields(on = %on))]
    async fn verify_starts_on(&self, on: NaiveDate) -> Result<bool> {
        let is_active = self
            .get_agreements()
            .await?
            .iter()
            .filter_map(|agreement| agreement.valid_from.as_deref())
            .any(|valid_from| starts_on(valid_from, on));
        info!(is_active, "verified");
        Ok(is_active)
    }

    fn messages_url(&self) -> Option<String> {
        Some(format!(
            "https://octopus.energy/dashboard/new/accounts/{}/messages",
            self.account_number,
        ))
    }
}
