// Expose the modules
pub mod api;
pub mod config;
pub mod domain;

// Re-export key types for easier usage
pub use domain::models::account::{Instrument, TradingLevel, UserAccount};
pub use domain::models::types::{
    Counterparty, Execution, FeeBreakdown, Order, OrderKind, OrderStatus, Side, TimeInForce,
};
pub use domain::services::engine::{EngineEvent, EngineService};
pub use domain::services::fees::FeeSchedule;
pub use domain::services::ledger::{Ledger, SettlementStatus, Transaction};
pub use domain::services::matching::{
    EngineError, EngineSettings, InstrumentEngine, NewOrderRequest, SubmitReport,
};
pub use domain::services::orderbook::{BookEntry, BookSnapshot, OrderBook};
