//! Error Types
//!
//! Failure domains are kept separate: value construction, order lifecycle,
//! and engine orchestration. Constructor and configuration errors abort the
//! run; order FSM violations are caught at the execution-engine boundary and
//! logged so a single bad event cannot crash a backtest.

use thiserror::Error;

use crate::enums::OrderStatus;

/// Errors raised when constructing value objects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("invalid {what}: {reason}")]
    InvalidConstruction { what: &'static str, reason: String },

    #[error("unknown currency: '{0}' (register it first)")]
    UnknownCurrency(String),

    #[error("currency mismatch: {lhs} vs {rhs}")]
    CurrencyMismatch { lhs: String, rhs: String },

    #[error("quantity cannot be negative: {0}")]
    NegativeQuantity(String),
}

/// Errors raised by the order state machine and order factory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("invalid order state transition: {from:?} -> {to:?} for order {client_order_id}")]
    InvalidTransition {
        from: OrderStatus,
        to: OrderStatus,
        client_order_id: String,
    },

    #[error("order {client_order_id} missing required field: {field}")]
    MissingField {
        client_order_id: String,
        field: &'static str,
    },
}

/// Errors raised by the backtest engine itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("no result available; run the backtest first")]
    MissingResult,

    #[error("no venue registered for '{0}'")]
    UnknownVenue(String),

    #[error("no instrument registered for '{0}'")]
    UnknownInstrument(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
