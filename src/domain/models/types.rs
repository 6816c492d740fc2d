//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// This module defines the core data types for the bond trading engine: orders, executions,
// fee breakdowns and the enums describing their lifecycle.
//
// | Section            | Description                                                      |
// |--------------------|------------------------------------------------------------------|
// | ENUMS              | Side, OrderKind, OrderStatus, TimeInForce, Counterparty.         |
// | STRUCTS            | FeeBreakdown, Execution, Order.                                  |
// | STATE MACHINE      | Fill application, cancellation and expiry transitions.           |
// | TESTS              | Unit tests for the order lifecycle invariants.                   |
//--------------------------------------------------------------------------------------------------

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

//--------------------------------------------------------------------------------------------------
//  ENUMS
//--------------------------------------------------------------------------------------------------
// | Name          | Description                                     |
// |---------------|-------------------------------------------------|
// | Side          | Buy or sell.                                    |
// | OrderKind     | Market, limit or stop.                          |
// | OrderStatus   | Lifecycle status of an order.                   |
// | TimeInForce   | How long an order stays active.                 |
// | Counterparty  | Who the other side of an execution was.         |
//--------------------------------------------------------------------------------------------------

/// Represents the side of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// An order buying bond fragments.
    Buy,
    /// An order selling bond fragments.
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

/// Represents the kind of an order, influencing its matching behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    /// Executes immediately against primary-pool inventory at the reference price.
    Market,
    /// Executes at the limit price or better against resting orders.
    Limit,
    /// Rests untriggered until an external price feed converts it; requires a trigger price.
    Stop,
}

/// Lifecycle status of an order. Derived from the fill state plus the
/// cancellation/expiry flags; callers never assign it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created but not yet accepted by the engine.
    Pending,
    /// Accepted, nothing filled yet.
    Open,
    /// Some quantity filled, some remaining.
    PartiallyFilled,
    /// Fully filled.
    Filled,
    /// Cancelled by its owner or an operator before completion.
    Cancelled,
    /// Expired by the periodic sweep.
    Expired,
    /// Rejected during validation, never persisted as live.
    Rejected,
}

impl OrderStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Cancelled | Self::Expired | Self::Rejected
        )
    }
}

/// Defines how long an order remains active in the order book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeInForce {
    /// Good Till Cancel - remains active until cancelled or expired.
    #[default]
    Gtc,
    /// Immediate Or Cancel - fills what it can, the remainder is cancelled.
    Ioc,
}

/// The other side of an execution. The primary liquidity pool is an explicit
/// variant rather than a sentinel account id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Counterparty {
    /// Matched against another user's resting order.
    Peer { order_id: Uuid, user_id: Uuid },
    /// Matched against the instrument's primary token pool.
    MarketMaker,
}

//--------------------------------------------------------------------------------------------------
//  STRUCTS
//--------------------------------------------------------------------------------------------------
// | Name          | Description                                      |
// |---------------|--------------------------------------------------|
// | FeeBreakdown  | Per-execution fee components.                    |
// | Execution     | One fill of an order.                            |
// | Order         | A buy/sell request with its full fill history.   |
//--------------------------------------------------------------------------------------------------

/// Itemized fees charged on one execution. Each component is already rounded
/// to 2 decimals; `total` is their sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub brokerage: Decimal,
    pub service_tax: Decimal,
    pub transaction_tax: Decimal,
    pub stamp_duty: Decimal,
    pub exchange: Decimal,
    pub total: Decimal,
}

impl FeeBreakdown {
    pub fn zero() -> Self {
        Self::default()
    }
}

/// One fill of an order. Executions are append-only: once recorded they are
/// never mutated or removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    /// Quantity filled, in bond fragments.
    pub quantity: u64,
    /// Price per fragment the fill executed at.
    pub price: Decimal,
    pub executed_at: DateTime<Utc>,
    pub counterparty: Counterparty,
    /// Fees charged to this order's owner for this fill.
    pub fees: FeeBreakdown,
    /// Ledger transaction this execution belongs to.
    pub transaction_id: Uuid,
}

impl Execution {
    /// Trade value of this fill, `quantity * price`.
    pub fn value(&self) -> Decimal {
        Decimal::from(self.quantity) * self.price
    }
}

/// Errors raised by order state transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderStateError {
    /// The requested transition is not allowed from the order's current status.
    #[error("invalid state transition from {from:?}")]
    InvalidTransition { from: OrderStatus },
}

/// A buy/sell request for fractional bond positions, retained forever as
/// history once accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Unique identifier for the order.
    pub id: Uuid,
    /// User who submitted the order; exclusive owner.
    pub user_id: Uuid,
    /// Bond instrument being traded.
    pub instrument_id: Uuid,
    pub side: Side,
    pub kind: OrderKind,
    /// Requested quantity in bond fragments, always >= 1.
    pub quantity: u64,
    /// Required for limit and stop orders, absent for market orders.
    pub limit_price: Option<Decimal>,
    /// Required for stop orders.
    pub trigger_price: Option<Decimal>,
    /// Total quantity filled so far; `sum(executions.quantity)` always.
    pub filled_quantity: u64,
    /// Quantity-weighted average price over all executions.
    pub average_filled_price: Decimal,
    pub status: OrderStatus,
    pub time_in_force: TimeInForce,
    pub placed_at: DateTime<Utc>,
    /// Orders expire 24 hours after placement unless overridden.
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Append-only fill history.
    pub executions: Vec<Execution>,
    pub cancel_reason: Option<String>,
    pub cancelled_by: Option<Uuid>,
}

/// Default lifetime of an order before the expiry sweep picks it up.
pub const DEFAULT_ORDER_LIFETIME_HOURS: i64 = 24;

impl Order {
    /// Creates a new order in `Pending` status.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: Uuid,
        instrument_id: Uuid,
        side: Side,
        kind: OrderKind,
        quantity: u64,
        limit_price: Option<Decimal>,
        trigger_price: Option<Decimal>,
        time_in_force: TimeInForce,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            instrument_id,
            side,
            kind,
            quantity,
            limit_price,
            trigger_price,
            filled_quantity: 0,
            average_filled_price: Decimal::ZERO,
            status: OrderStatus::Pending,
            time_in_force,
            placed_at: now,
            expires_at: expires_at
                .unwrap_or(now + Duration::hours(DEFAULT_ORDER_LIFETIME_HOURS)),
            updated_at: now,
            executions: Vec::new(),
            cancel_reason: None,
            cancelled_by: None,
        }
    }

    /// Quantity still available to trade.
    pub fn remaining_quantity(&self) -> u64 {
        self.quantity - self.filled_quantity
    }

    /// Marks the order as accepted by the engine.
    pub fn open(&mut self) {
        if self.status == OrderStatus::Pending {
            self.status = OrderStatus::Open;
            self.updated_at = Utc::now();
        }
    }

    /// True when the order can still rest in the book or receive fills.
    pub fn is_live(&self) -> bool {
        matches!(self.status, OrderStatus::Open | OrderStatus::PartiallyFilled)
    }

    /// True once the wall clock has passed `expires_at`. Expiry only takes
    /// effect when the periodic sweep calls [`Order::expire`]; matching never
    /// checks this.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Appends an execution and recomputes the fill-derived fields. The
    /// caller guarantees `execution.quantity <= remaining_quantity()`.
    pub fn apply_execution(&mut self, execution: Execution) {
        debug_assert!(execution.quantity <= self.remaining_quantity());
        self.filled_quantity += execution.quantity;
        self.executions.push(execution);
        self.average_filled_price = weighted_average_price(&self.executions);
        self.status = if self.filled_quantity == self.quantity {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.updated_at = Utc::now();
    }

    /// Cancels the order, recording who asked and why. Only live orders can
    /// be cancelled.
    pub fn cancel(&mut self, reason: &str, actor: Uuid) -> Result<(), OrderStateError> {
        if !self.is_live() {
            return Err(OrderStateError::InvalidTransition { from: self.status });
        }
        self.status = OrderStatus::Cancelled;
        self.cancel_reason = Some(reason.to_string());
        self.cancelled_by = Some(actor);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Transitions a live order to `Expired`. Invoked only by the sweep.
    pub fn expire(&mut self) -> Result<(), OrderStateError> {
        if !self.is_live() {
            return Err(OrderStateError::InvalidTransition { from: self.status });
        }
        self.status = OrderStatus::Expired;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Quantity-weighted average price over a fill history.
fn weighted_average_price(executions: &[Execution]) -> Decimal {
    let filled: u64 = executions.iter().map(|e| e.quantity).sum();
    if filled == 0 {
        return Decimal::ZERO;
    }
    let notional: Decimal = executions.iter().map(Execution::value).sum();
    notional / Decimal::from(filled)
}

//--------------------------------------------------------------------------------------------------
//  TESTS
//--------------------------------------------------------------------------------------------------
// | Name                                | Description                                   |
// |-------------------------------------|-----------------------------------------------|
// | test_new_order_defaults             | Fresh order state and default expiry.         |
// | test_apply_execution_invariants     | Fill accounting and status derivation.        |
// | test_average_filled_price           | Quantity-weighted average over fills.         |
// | test_cancel_transitions             | Cancel allowed only from live states.         |
// | test_expire_transitions             | Expiry allowed only from live states.         |
//--------------------------------------------------------------------------------------------------
