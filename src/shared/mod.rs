//! State and messaging for the UI loop
//!
//! Conversion state lives on the coordinator's thread; every other thread
//! talks to it through [`UiEvent`]s.

pub mod messages;
pub mod state;

pub use messages::UiEvent;
pub use state::{ConversionSession, CurrencyPair, RateRequest};
