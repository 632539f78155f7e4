//! Conversion state owned by the UI loop
//!
//! Only the coordinator's event loop touches a [`ConversionSession`], so it
//! needs no locking. Every change that needs fresh rates hands back a
//! [`RateRequest`] for the coordinator to fetch.

use std::fmt;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::rates::{format_conversion, ExchangeRates};
use crate::vision::NumericAmount;

/// Selected source and target currencies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyPair {
    pub from: String,
    pub to: String,
}

impl CurrencyPair {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// The same pair with source and target exchanged
    pub fn swapped(&self) -> Self {
        Self {
            from: self.to.clone(),
            to: self.from.clone(),
        }
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// A rate fetch issued by the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateRequest {
    /// Increasing per session; later requests supersede earlier ones
    pub id: u64,
    /// Pair selected when the request was issued
    pub pair: CurrencyPair,
}

/// Latest amount, selected pair and displayed conversion
#[derive(Debug, Clone)]
pub struct ConversionSession {
    supported: Vec<String>,
    pair: CurrencyPair,
    amount: NumericAmount,
    rate: Option<f64>,
    display: Option<String>,
    paused: bool,
    next_request_id: u64,
    last_applied: u64,
}

impl ConversionSession {
    /// Start a session on `pair`, restricted to `supported` codes
    pub fn new(pair: CurrencyPair, supported: Vec<String>) -> Self {
        Self {
            supported,
            pair,
            amount: NumericAmount::ZERO,
            rate: None,
            display: None,
            paused: false,
            next_request_id: 0,
            last_applied: 0,
        }
    }

    pub fn pair(&self) -> &CurrencyPair {
        &self.pair
    }

    /// Most recent committed amount
    pub fn amount(&self) -> NumericAmount {
        self.amount
    }

    /// Rate used by the current display line
    pub fn rate(&self) -> Option<f64> {
        self.rate
    }

    /// Current display line, if any conversion was applied yet
    pub fn display(&self) -> Option<&str> {
        self.display.as_deref()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Commit a recognized amount. Ignored while paused.
    pub fn on_amount(&mut self, amount: NumericAmount) -> Option<RateRequest> {
        if self.paused {
            debug!("Paused, ignoring recognized amount {}", amount.value());
            return None;
        }
        self.amount = amount;
        Some(self.next_request())
    }

    /// Select the source currency
    pub fn select_from(&mut self, code: &str) -> Result<RateRequest> {
        self.pair.from = self.check_supported(code)?;
        info!("Converting {}", self.pair);
        Ok(self.next_request())
    }

    /// Select the target currency
    pub fn select_to(&mut self, code: &str) -> Result<RateRequest> {
        self.pair.to = self.check_supported(code)?;
        info!("Converting {}", self.pair);
        Ok(self.next_request())
    }

    /// Fetch rates for the current selection again
    pub fn refresh(&mut self) -> RateRequest {
        self.next_request()
    }

    /// Exchange source and target; the last amount is converted again
    pub fn swap(&mut self) -> RateRequest {
        self.pair = self.pair.swapped();
        info!("Swapped currencies, converting {}", self.pair);
        self.next_request()
    }

    /// Apply fetched rates. Returns false when the response is stale.
    pub fn on_rates(&mut self, request: &RateRequest, rates: &ExchangeRates) -> bool {
        if request.pair != self.pair {
            debug!(
                "Ignoring rates for {} (request {}), selection is now {}",
                request.pair, request.id, self.pair
            );
            return false;
        }
        if request.id <= self.last_applied {
            debug!(
                "Ignoring rates for request {}, request {} already applied",
                request.id, self.last_applied
            );
            return false;
        }

        let rate = rates.rate_to(&self.pair.to);
        debug!("Exchange rate: 1 {} = {} {}", self.pair.from, rate, self.pair.to);

        self.last_applied = request.id;
        self.rate = Some(rate);
        self.display = Some(format_conversion(self.amount, &self.pair.from, rate, &self.pair.to));
        true
    }

    /// Record a failed fetch. The display keeps its previous value.
    pub fn on_rate_failure(&self, request: &RateRequest, error: &str) {
        warn!(
            "Failed to fetch exchange rates for {} (request {}): {}",
            request.pair, request.id, error
        );
    }

    /// One-line summary for the status command
    pub fn status(&self) -> String {
        let rate = match self.rate {
            Some(rate) => format!("rate {}", rate),
            None => "no rate yet".to_string(),
        };
        format!(
            "{} | amount {:.0} | {} | {} | {}",
            self.pair,
            self.amount.value(),
            rate,
            if self.paused { "paused" } else { "running" },
            self.display.as_deref().unwrap_or("no conversion yet")
        )
    }

    fn check_supported(&self, code: &str) -> Result<String> {
        let code = code.trim().to_ascii_uppercase();
        if !self.supported.iter().any(|supported| supported == &code) {
            anyhow::bail!(
                "Unsupported currency '{}' (supported: {})",
                code,
                self.supported.join(", ")
            );
        }
        Ok(code)
    }

    fn next_request(&mut self) -> RateRequest {
        self.next_request_id += 1;
        RateRequest {
            id: self.next_request_id,
            pair: self.pair.clone(),
        }
    }
}
