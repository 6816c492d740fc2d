//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Immutable record of every execution and its settlement state.
//
// | Component        | Description                                                      |
// |------------------|------------------------------------------------------------------|
// | Transaction      | One per match; never mutated except settlement_status.           |
// | SettlementStatus | Pending -> Settled | Failed.                                     |
// | Ledger           | Append-only store of transactions, shared across instruments.    |
// | settlement_date  | Trade date + 2 business days (weekends skipped).                 |
//--------------------------------------------------------------------------------------------------

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::models::types::FeeBreakdown;

/// Settlement lifecycle of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    Pending,
    Settled,
    Failed,
}

/// One executed match. Owned by the [`Ledger`]; immutable once recorded
/// except for `settlement_status`. Order ids and party ids are `None` on the
/// side filled from the primary token pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub instrument_id: Uuid,
    pub buy_order_id: Option<Uuid>,
    pub sell_order_id: Option<Uuid>,
    pub buyer_id: Option<Uuid>,
    pub seller_id: Option<Uuid>,
    /// Quantity traded, in bond fragments.
    pub quantity: u64,
    /// Execution price per fragment.
    pub price: Decimal,
    /// `quantity * price`.
    pub total_value: Decimal,
    pub fees: FeeBreakdown,
    /// `total_value + fees.total` — what the buyer paid.
    pub buyer_net_amount: Decimal,
    /// `total_value - fees.total` — what the seller received.
    pub seller_net_amount: Decimal,
    pub executed_at: DateTime<Utc>,
    /// T+2 business days after the trade date.
    pub settlement_date: NaiveDate,
    pub settlement_status: SettlementStatus,
}

/// Computes the T+2 settlement date: two business days after `trade_date`,
/// skipping Saturdays and Sundays.
pub fn settlement_date(trade_date: NaiveDate) -> NaiveDate {
    let mut date = trade_date;
    let mut business_days = 0;
    while business_days < 2 {
        date += Duration::days(1);
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            business_days += 1;
        }
    }
    date
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("transaction {0} not found")]
    TransactionNotFound(Uuid),
}

/// Append-only transaction store. Transactions are recorded by the
/// per-instrument workers and read by anyone.
#[derive(Debug, Default)]
pub struct Ledger {
    transactions: RwLock<Vec<Transaction>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a transaction. There is no removal path.
    pub fn record(&self, transaction: Transaction) {
        self.transactions.write().push(transaction);
    }

    pub fn len(&self) -> usize {
        self.transactions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.read().is_empty()
    }

    pub fn all(&self) -> Vec<Transaction> {
        self.transactions.read().clone()
    }

    pub fn for_instrument(&self, instrument_id: Uuid) -> Vec<Transaction> {
        self.transactions
            .read()
            .iter()
            .filter(|t| t.instrument_id == instrument_id)
            .cloned()
            .collect()
    }

    /// Sum of `total_value` across an instrument's transactions.
    pub fn total_value_for_instrument(&self, instrument_id: Uuid) -> Decimal {
        self.transactions
            .read()
            .iter()
            .filter(|t| t.instrument_id == instrument_id)
            .map(|t| t.total_value)
            .sum()
    }

    /// The only permitted post-creation mutation: settlement status updates.
    pub fn update_settlement_status(
        &self,
        transaction_id: Uuid,
        status: SettlementStatus,
    ) -> Result<(), LedgerError> {
        let mut transactions = self.transactions.write();
        let transaction = transactions
            .iter_mut()
            .find(|t| t.id == transaction_id)
            .ok_or(LedgerError::TransactionNotFound(transaction_id))?;
        transaction.settlement_status = status;
        Ok(())
    }
}
