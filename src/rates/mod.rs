//! Exchange rates
//!
//! Rates come from an external JSON API keyed by base currency. The
//! coordinator only depends on [`RateProvider`]; [`HttpRateProvider`] is the
//! production client.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::RateError;
use crate::vision::NumericAmount;

/// Rates published for one base currency
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRates {
    /// Base currency code
    pub base: String,
    /// Publication date as reported by the service
    #[serde(default)]
    pub date: String,
    /// Units of each currency per one unit of `base`
    pub rates: HashMap<String, f64>,
}

impl ExchangeRates {
    /// Rate from `base` to `to`. A missing code converts at zero.
    pub fn rate_to(&self, to: &str) -> f64 {
        match self.rates.get(to) {
            Some(rate) => *rate,
            None => {
                warn!("No {} rate published for base {}, converting at 0", to, self.base);
                0.0
            }
        }
    }
}

/// Asynchronous exchange-rate source
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Fetch every rate published for `from`
    async fn fetch(&self, from: &str) -> Result<ExchangeRates, RateError>;
}

/// Exchange-rate client for `GET {base_url}{from}` endpoints
pub struct HttpRateProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRateProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create exchange-rate HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    /// Full request URL for a base currency
    pub fn url_for(&self, from: &str) -> String {
        format!("{}{}", self.base_url, from)
    }
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    async fn fetch(&self, from: &str) -> Result<ExchangeRates, RateError> {
        let url = self.url_for(from);
        debug!("Fetching exchange rates from {}", url);

        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RateError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        let rates: ExchangeRates = serde_json::from_slice(&bytes)?;
        debug!("Received {} rates for {} ({})", rates.rates.len(), rates.base, rates.date);
        Ok(rates)
    }
}

/// Display line for a converted amount: `"{amount} {from} = {converted:.2} {to}"`
pub fn format_conversion(amount: NumericAmount, from: &str, rate: f64, to: &str) -> String {
    let value = amount.value();
    format!("{:.0} {} = {:.2} {}", value, from, value * rate, to)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "provider": "https://www.exchangerate-api.com",
        "base": "USD",
        "date": "2026-10-16",
        "time_last_updated": 1760572801,
        "rates": {"USD": 1, "EUR": 0.92, "JPY": 149.5}
    }"#;

    #[test]
    fn test_parse_rates_payload() {
        let rates: ExchangeRates = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(rates.base, "USD");
        assert_eq!(rates.date, "2026-10-16");
        assert_eq!(rates.rates.len(), 3);
        assert_eq!(rates.rate_to("JPY"), 149.5);
        assert_eq!(rates.rate_to("USD"), 1.0);
    }

    #[test]
    fn test_missing_code_converts_at_zero() {
        let rates: ExchangeRates = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(rates.rate_to("GBP"), 0.0);
    }

    #[test]
    fn test_parse_rejects_payload_without_rates() {
        let result: Result<ExchangeRates, _> = serde_json::from_str(r#"{"base": "USD"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_format_conversion() {
        let amount = NumericAmount::from_digits_or_zero("100");
        assert_eq!(format_conversion(amount, "USD", 0.92, "EUR"), "100 USD = 92.00 EUR");

        let amount = NumericAmount::from_digits_or_zero("1999");
        assert_eq!(
            format_conversion(amount, "JPY", 0.006_69, "USD"),
            "1999 JPY = 13.37 USD"
        );
    }

    #[test]
    fn test_format_conversion_zero_amount_and_rate() {
        assert_eq!(format_conversion(NumericAmount::ZERO, "USD", 1.0, "USD"), "0 USD = 0.00 USD");

        let amount = NumericAmount::from_digits_or_zero("50");
        assert_eq!(format_conversion(amount, "USD", 0.0, "GBP"), "50 USD = 0.00 GBP");
    }

    #[test]
    fn test_url_for_appends_base_currency() {
        let provider = HttpRateProvider::new(
            "https://api.exchangerate-api.com/v4/latest/",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            provider.url_for("EUR"),
            "https://api.exchangerate-api.com/v4/latest/EUR"
        );
    }
}
