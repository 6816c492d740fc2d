//--------------------------------------------------------------------------------------------------
// STRUCTS
//--------------------------------------------------------------------------------------------------
// | Name                    | Description                                      |
// |-------------------------|--------------------------------------------------|
// | CreateOrderRequest      | Order submission payload                         |
// | CreateInstrumentRequest | Instrument listing payload                       |
// | CreateUserRequest       | User registration payload                        |
// | SweepResponse           | Result of an expiry sweep                        |
//--------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::account::{Instrument, UserAccount};
use crate::domain::models::types::{OrderKind, Side, TimeInForce};
use crate::domain::services::matching::NewOrderRequest;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: Uuid,
    pub instrument_id: Uuid,
    pub side: Side,
    pub kind: OrderKind,
    pub quantity: u64,
    pub limit_price: Option<Decimal>,
    pub trigger_price: Option<Decimal>,
    #[serde(default)]
    pub time_in_force: TimeInForce,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<CreateOrderRequest> for NewOrderRequest {
    fn from(req: CreateOrderRequest) -> Self {
        Self {
            user_id: req.user_id,
            instrument_id: req.instrument_id,
            side: req.side,
            kind: req.kind,
            quantity: req.quantity,
            limit_price: req.limit_price,
            trigger_price: req.trigger_price,
            time_in_force: req.time_in_force,
            expires_at: req.expires_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateInstrumentRequest {
    pub id: Option<Uuid>,
    pub name: String,
    pub total_tokens: u64,
    pub current_price: Decimal,
}

impl CreateInstrumentRequest {
    pub fn into_instrument(self) -> Instrument {
        Instrument::new(
            self.id.unwrap_or_else(Uuid::new_v4),
            &self.name,
            self.total_tokens,
            self.current_price,
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub user_id: Option<Uuid>,
    pub balance: Decimal,
    #[serde(default)]
    pub kyc_verified: bool,
}

impl CreateUserRequest {
    pub fn into_account(self) -> UserAccount {
        UserAccount::new(
            self.user_id.unwrap_or_else(Uuid::new_v4),
            self.balance,
            self.kyc_verified,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepResponse {
    pub expired: usize,
}
