//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Pure fee calculation for trade executions. Two schedules exist, selected by configuration:
//
// | Schedule  | Description                                                                 |
// |-----------|-----------------------------------------------------------------------------|
// | Detailed  | Canonical: brokerage 0.1%, service tax 18% of brokerage, transaction tax    |
// |           | 0.1%, stamp duty 0.015%, each rounded to 2 decimals (half-up) then summed.  |
// | Flat      | Coarse 0.2% flat fee, kept for compatibility with older recorded data.      |
//
// Both sides of a trade are charged the full fee independently: the buyer pays
// `value + total`, the seller receives `value - total`. Fees are never split between the
// parties.
//--------------------------------------------------------------------------------------------------

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::domain::models::types::FeeBreakdown;

const BROKERAGE_RATE: Decimal = dec!(0.001);
const SERVICE_TAX_RATE: Decimal = dec!(0.18); // applied to brokerage, not value
const TRANSACTION_TAX_RATE: Decimal = dec!(0.001);
const STAMP_DUTY_RATE: Decimal = dec!(0.00015);
const FLAT_RATE: Decimal = dec!(0.002);

/// Which fee schedule the engine applies to executions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeSchedule {
    #[default]
    Detailed,
    Flat,
}

impl FeeSchedule {
    /// Calculates the fee breakdown for one execution of `value`.
    pub fn calculate(&self, value: Decimal) -> FeeBreakdown {
        match self {
            Self::Detailed => {
                let brokerage = round_component(value * BROKERAGE_RATE);
                let service_tax = round_component(brokerage * SERVICE_TAX_RATE);
                let transaction_tax = round_component(value * TRANSACTION_TAX_RATE);
                let stamp_duty = round_component(value * STAMP_DUTY_RATE);
                let exchange = Decimal::ZERO;
                FeeBreakdown {
                    brokerage,
                    service_tax,
                    transaction_tax,
                    stamp_duty,
                    exchange,
                    total: brokerage + service_tax + transaction_tax + stamp_duty + exchange,
                }
            }
            Self::Flat => {
                let total = round_component(value * FLAT_RATE);
                FeeBreakdown {
                    total,
                    ..FeeBreakdown::zero()
                }
            }
        }
    }
}

/// What the buyer is debited for an execution of `value`.
pub fn buyer_net_amount(value: Decimal, fees: &FeeBreakdown) -> Decimal {
    value + fees.total
}

/// What the seller is credited for an execution of `value`.
pub fn seller_net_amount(value: Decimal, fees: &FeeBreakdown) -> Decimal {
    value - fees.total
}

/// Each fee component is rounded to 2 decimals, half-up, before summation.
fn round_component(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
