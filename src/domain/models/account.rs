//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// This module defines the entities the engine settles against: the tradable bond instrument
// with its fractional token pool, and the user account carrying the wallet and trade stats.
//
// | Section      | Description                                              |
// |--------------|----------------------------------------------------------|
// | Instrument   | Token inventory and reference price for one bond.        |
// | TradingLevel | Tiered level recomputed from accumulated points.         |
// | UserAccount  | Wallet balance, KYC flag and per-user trade statistics.  |
//--------------------------------------------------------------------------------------------------

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A fractionalized bond listed for trading. `total_tokens` is fixed at
/// issuance; `available_tokens` tracks the primary pool and stays within
/// `0..=total_tokens` at all times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: Uuid,
    pub name: String,
    pub total_tokens: u64,
    pub available_tokens: u64,
    /// Reference price used for market orders and placement estimates.
    pub current_price: Decimal,
    pub tradable: bool,
}

impl Instrument {
    pub fn new(id: Uuid, name: &str, total_tokens: u64, current_price: Decimal) -> Self {
        Self {
            id,
            name: name.to_string(),
            total_tokens,
            available_tokens: total_tokens,
            current_price,
            tradable: true,
        }
    }

    /// Tokens a market buy can still draw from the pool.
    pub fn pool_capacity_for_buy(&self) -> u64 {
        self.available_tokens
    }

    /// Tokens a market sell can still return to the pool.
    pub fn pool_capacity_for_sell(&self) -> u64 {
        self.total_tokens - self.available_tokens
    }

    /// Removes tokens from the pool. The caller caps `quantity` at
    /// [`Instrument::pool_capacity_for_buy`].
    pub fn consume_tokens(&mut self, quantity: u64) {
        debug_assert!(quantity <= self.available_tokens);
        self.available_tokens -= quantity;
    }

    /// Returns tokens to the pool. The caller caps `quantity` at
    /// [`Instrument::pool_capacity_for_sell`].
    pub fn release_tokens(&mut self, quantity: u64) {
        debug_assert!(self.available_tokens + quantity <= self.total_tokens);
        self.available_tokens += quantity;
    }
}

/// Tiered trading level, recomputed from accumulated points after every
/// execution. Thresholds: 1,000 / 5,000 / 10,000 points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingLevel {
    Basic,
    Silver,
    Gold,
    Platinum,
}

impl TradingLevel {
    pub fn from_points(points: u64) -> Self {
        match points {
            0..=999 => Self::Basic,
            1_000..=4_999 => Self::Silver,
            5_000..=9_999 => Self::Gold,
            _ => Self::Platinum,
        }
    }
}

/// One point per 1,000 units of traded value.
const POINTS_VALUE_UNIT: Decimal = Decimal::from_parts(1_000, 0, 0, false, 0);

/// A user's wallet and trading profile. The user exclusively owns this
/// record; the engine mutates it only through [`crate::domain::services::accounts::AccountStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub user_id: Uuid,
    pub balance: Decimal,
    pub kyc_verified: bool,
    pub trade_count: u64,
    pub traded_volume: Decimal,
    pub points: u64,
    pub level: TradingLevel,
}

impl UserAccount {
    pub fn new(user_id: Uuid, balance: Decimal, kyc_verified: bool) -> Self {
        Self {
            user_id,
            balance,
            kyc_verified,
            trade_count: 0,
            traded_volume: Decimal::ZERO,
            points: 0,
            level: TradingLevel::Basic,
        }
    }

    /// Updates trade statistics after one execution of `value`: counter,
    /// cumulative volume, points (`floor(value / 1000)`) and the level tier.
    pub fn record_trade(&mut self, value: Decimal) {
        self.trade_count += 1;
        self.traded_volume += value;
        self.points += (value / POINTS_VALUE_UNIT)
            .trunc()
            .to_u64()
            .unwrap_or(0);
        self.level = TradingLevel::from_points(self.points);
    }
}
