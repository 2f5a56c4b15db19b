use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use super::{Api, Link, find_link};
use crate::{
    api::{ProviderError, RateProvider},
    core::{
        account::Region,
        interval::Validity,
        rate::{PaymentMethod, RatePeriod, RateSchedule},
    },
    prelude::*,
    quantity::{cost::Cost, rate::KilowattHourRate},
};

#[derive(Deserialize)]
struct ProductSummary {
    direction: String,
    display_name: String,
    links: Vec<Link>,
}

#[derive(Deserialize)]
struct Product {
    code: String,

    /// Keyed by the region with the leading underscore, for example `_C`.
    #[serde(default)]
    single_register_electricity_tariffs: HashMap<String, RegionalTariffs>,
}

#[derive(Deserialize)]
struct RegionalTariffs {
    direct_debit_monthly: Option<RegionalTariff>,
    varying: Option<RegionalTariff>,
}

#[derive(Deserialize)]
struct RegionalTariff {
    code: String,
    standing_charge_inc_vat: Cost,
    links: Vec<Link>,
}

#[derive(Deserialize)]
struct UnitRate {
    value_inc_vat: KilowattHourRate,
    valid_from: DateTime<Utc>,
    valid_to: Option<DateTime<Utc>>,
    payment_method: Option<PaymentMethod>,
}

impl From<UnitRate> for RatePeriod {
    fn from(rate: UnitRate) -> Self {
        Self {
            value: rate.value_inc_vat,
            validity: Validity::new(rate.valid_from, rate.valid_to),
            payment_method: rate.payment_method,
        }
    }
}

impl Api {
    async fn find_product(&self, api_display_name: &str) -> Result<ProductSummary> {
        let mut url = self.base_url.join("products/")?;
        url.query_pairs_mut().append_pair("brand", "OCTOPUS_ENERGY").append_pair("is_business", "false");
        let products = self.get_all::<ProductSummary>(url).await?;
        debug!(n_products = products.len(), "fetched the products");
        products
            .into_iter()
            .find(|product| product.direction == "IMPORT" && product.display_name == api_display_name)
            .ok_or_else(|| ProviderError::TariffNotFound(api_display_name.to_string()).into())
    }
}

#[async_trait]
impl RateProvider for Api {
    #[instrument(skip_all, fields(product = api_display_name, region = %region, on = %on))]
    async fn get_rates(
        &self,
        api_display_name: &str,
        region: Region,
        on: NaiveDate,
    ) -> Result<RateSchedule> {
        info!("fetching…");
        let summary = self.find_product(api_display_name).await?;
        let product = self.get::<Product>(find_link(&summary.links, "self")?).await?;
        let tariff = product
            .single_register_electricity_tariffs
            .get(&format!("_{region}"))
            .and_then(|tariffs| tariffs.direct_debit_monthly.as_ref().or(tariffs.varying.as_ref()))
            .ok_or_else(|| ProviderError::RegionNotFound(region, product.code.clone()))?;

        let mut url = find_link(&tariff.links, "standard_unit_rates")?;
        url.query_pairs_mut()
            .append_pair("period_from", &format!("{on}T00:00:00Z"))
            .append_pair("period_to", &format!("{on}T23:59:59Z"));
        let periods: Vec<RatePeriod> =
            self.get_all::<UnitRate>(url).await?.into_iter().map(RatePeriod::from).collect();
        info!(
            product_code = %product.code,
            tariff_code = %tariff.code,
            n_periods = periods.len(),
            standing_charge = ?tariff.standing_charge_inc_vat,
            "fetched",
        );
        Ok(RateSchedule {
            standing_charge: tariff.standing_charge_inc_vat,
            periods,
            product_code: product.code,
        })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use mockito::{Matcher, Mock, Server, ServerGuard};
    use serde_json::{Value, json};

    use super::*;
    use crate::api::octopus::tests::api;

    async fn mock_json(server: &mut ServerGuard, path: &str, body: Value) -> Mock {
        server
            .mock("GET", path)
            .match_query(Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    async fn mock_catalog(server: &mut ServerGuard, regional: Value) -> Vec<Mock> {
        let url = server.url();
        let products = server
            .mock("GET", "/products/")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("brand".into(), "OCTOPUS_ENERGY".into()),
                Matcher::UrlEncoded("is_business".into(), "false".into()),
            ]))
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "results": [{
                        "direction": "EXPORT",
                        "display_name": "Octopus Go",
                        "links": [{ "href": format!("{url}/products/OUTGOING/"), "rel": "self" }],
                    }],
                    "next": format!("{url}/products/page-2/"),
                })
                .to_string(),
            )
            .create_async()
            .await;
        let next_page = mock_json(
            server,
            "/products/page-2/",
            json!({
                "results": [{
                    "direction": "IMPORT",
                    "display_name": "Octopus Go",
                    "links": [{ "href": format!("{url}/products/GO-VAR-22-10-14/"), "rel": "self" }],
                }],
                "next": null,
            }),
        )
        .await;
        let product = mock_json(
            server,
            "/products/GO-VAR-22-10-14/",
            json!({
                "code": "GO-VAR-22-10-14",
                "single_register_electricity_tariffs": { "_C": regional },
            }),
        )
        .await;
        vec![products, next_page, product]
    }

    fn regional_tariff(url: &str, code: &str, standing_charge: f64) -> Value {
        json!({
            "code": code,
            "standing_charge_inc_vat": standing_charge,
            "links": [{
                "href": format!("{url}/products/GO-VAR-22-10-14/electricity-tariffs/{code}/standard-unit-rates/"),
                "rel": "standard_unit_rates",
            }],
        })
    }

    #[tokio::test]
    async fn test_get_rates_ok() -> Result {
        let mut server = Server::new_async().await;
        let url = server.url();
        let _catalog = mock_catalog(
            &mut server,
            json!({
                "direct_debit_monthly": regional_tariff(&url, "E-1R-GO-VAR-22-10-14-C", 47.85),
                "varying": regional_tariff(&url, "E-1R-GO-VAR-22-10-14-C-V", 50.0),
            }),
        )
        .await;
        let rates = server
            .mock("GET", "/products/GO-VAR-22-10-14/electricity-tariffs/E-1R-GO-VAR-22-10-14-C/standard-unit-rates/")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("period_from".into(), "2025-03-10T00:00:00Z".into()),
                Matcher::UrlEncoded("period_to".into(), "2025-03-10T23:59:59Z".into()),
            ]))
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "results": [
                        {
                            "value_inc_vat": 27.5,
                            "valid_from": "2025-03-10T04:30:00Z",
                            "valid_to": null,
                            "payment_method": "DIRECT_DEBIT",
                        },
                        {
                            "value_inc_vat": 8.5,
                            "valid_from": "2025-03-09T23:30:00Z",
                            "valid_to": "2025-03-10T04:30:00Z",
                            "payment_method": null,
                        },
                    ],
                    "next": null,
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let schedule = api(&server)?.get_rates("Octopus Go", Region::try_from('C')?, date()).await?;
        rates.assert_async().await;
        assert_eq!(schedule.product_code, "GO-VAR-22-10-14");
        assert_abs_diff_eq!(schedule.standing_charge.0, 47.85);
        assert_eq!(schedule.periods.len(), 2);
        assert_eq!(schedule.periods[0].payment_method, Some(PaymentMethod::DirectDebit));
        assert_eq!(schedule.periods[0].validity.until, None);
        assert_abs_diff_eq!(schedule.periods[1].value.0, 8.5);
        assert_eq!(schedule.periods[1].payment_method, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_falls_back_to_varying() -> Result {
        let mut server = Server::new_async().await;
        let url = server.url();
        let _catalog = mock_catalog(
            &mut server,
            json!({ "varying": regional_tariff(&url, "E-1R-GO-VAR-22-10-14-C", 50.0) }),
        )
        .await;
        let rates = mock_json(
            &mut server,
            "/products/GO-VAR-22-10-14/electricity-tariffs/E-1R-GO-VAR-22-10-14-C/standard-unit-rates/",
            json!({ "results": [], "next": null }),
        )
        .await;

        let schedule = api(&server)?.get_rates("Octopus Go", Region::try_from('C')?, date()).await?;
        rates.assert_async().await;
        assert_abs_diff_eq!(schedule.standing_charge.0, 50.0);
        assert!(schedule.periods.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_region_not_found() -> Result {
        let mut server = Server::new_async().await;
        let url = server.url();
        let _catalog = mock_catalog(
            &mut server,
            json!({ "varying": regional_tariff(&url, "E-1R-GO-VAR-22-10-14-C", 50.0) }),
        )
        .await;

        let error = api(&server)?
            .get_rates("Octopus Go", Region::try_from('A')?, date())
            .await
            .unwrap_err();
        assert!(matches!(
            error.downcast_ref::<ProviderError>(),
            Some(ProviderError::RegionNotFound(region, code)) if region.code() == 'A' && code == "GO-VAR-22-10-14",
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_tariff_not_found() -> Result {
        let mut server = Server::new_async().await;
        let _catalog = mock_catalog(&mut server, json!({})).await;

        let error = api(&server)?
            .get_rates("Cosy Octopus", Region::try_from('C')?, date())
            .await
            .unwrap_err();
        assert!(matches!(error.downcast_ref::<ProviderError>(), Some(ProviderError::TariffNotFound(_))));
        Ok(())
    }
}
