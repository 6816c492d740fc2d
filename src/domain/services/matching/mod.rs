//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Core matching and settlement for one instrument, plus the engine-level error taxonomy
// every caller (worker, service, API) maps from.
//
// | Component        | Description                                                   |
// |------------------|---------------------------------------------------------------|
// | EngineError      | Unified failure taxonomy surfaced to callers.                 |
// | InstrumentEngine | Matching core, owned exclusively by the instrument worker.    |
//--------------------------------------------------------------------------------------------------

pub mod engine;

pub use engine::{EngineSettings, InstrumentEngine, NewOrderRequest, SubmitReport};

use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::models::types::{OrderStateError, OrderStatus};
use crate::domain::services::accounts::AccountError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Request rejected before any state mutation.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    #[error("insufficient token inventory for this instrument")]
    InsufficientInventory,

    #[error("order value exceeds the KYC threshold and the user is not verified")]
    KycRequired,

    #[error("invalid state transition from {from:?}")]
    InvalidStateTransition { from: OrderStatus },

    #[error("{0} not found")]
    NotFound(String),

    #[error("request could not be serialized: {0}")]
    ConcurrencyConflict(String),
}

impl From<OrderStateError> for EngineError {
    fn from(err: OrderStateError) -> Self {
        match err {
            OrderStateError::InvalidTransition { from } => Self::InvalidStateTransition { from },
        }
    }
}

impl From<AccountError> for EngineError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::UnknownAccount(user_id) => Self::NotFound(format!("account {user_id}")),
            AccountError::InsufficientBalance {
                required,
                available,
            } => Self::InsufficientFunds {
                required,
                available,
            },
        }
    }
}
