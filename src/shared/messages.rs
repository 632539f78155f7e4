//! Events delivered to the coordinator's UI loop

use crate::controls::ControlCommand;
use crate::pipeline::Recognition;
use crate::rates::ExchangeRates;
use crate::shared::state::RateRequest;

/// Everything that may mutate conversion state, funneled onto one thread
#[derive(Debug, Clone)]
pub enum UiEvent {
    /// A frame produced an amount
    AmountRecognized(Recognition),
    /// User command from the control surface
    Control(ControlCommand),
    /// Rates arrived for an earlier request
    RatesFetched(RateRequest, ExchangeRates),
    /// A rate request failed
    RateFetchFailed(RateRequest, String),
    /// Control input closed; wind down
    Shutdown,
}
