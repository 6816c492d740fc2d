//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Engine facade: routes every request to the owning instrument worker and maintains the
// user/instrument registries. This is the single entry point the API layer talks to.
//
// | Component     | Description                                                      |
// |---------------|------------------------------------------------------------------|
// | EngineService | Instrument registry + worker router + event broadcast.          |
// | EngineEvent   | Fire-and-forget notifications; correctness never depends on it. |
//--------------------------------------------------------------------------------------------------

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tracing::info;
use uuid::Uuid;

use crate::domain::models::account::{Instrument, UserAccount};
use crate::domain::models::types::Order;
use crate::domain::services::accounts::AccountStore;
use crate::domain::services::engine::worker::{InstrumentWorker, WorkerClient};
use crate::domain::services::ledger::{Ledger, Transaction};
use crate::domain::services::matching::{
    EngineError, EngineSettings, InstrumentEngine, NewOrderRequest, SubmitReport,
};
use crate::domain::services::orderbook::BookSnapshot;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Notifications broadcast after state changes. Subscribers are optional;
/// a lagging or absent receiver never affects matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    OrderAccepted {
        order_id: Uuid,
        instrument_id: Uuid,
        user_id: Uuid,
    },
    TradeExecuted {
        transaction_id: Uuid,
        instrument_id: Uuid,
        quantity: u64,
        price: Decimal,
    },
    OrderCancelled {
        order_id: Uuid,
        instrument_id: Uuid,
    },
}

/// Routes engine operations to per-instrument workers. Wallets and the
/// ledger are shared across all instruments. Orders are addressable by id
/// alone: every accepted order is indexed to its owning instrument.
pub struct EngineService {
    workers: RwLock<HashMap<Uuid, WorkerClient>>,
    order_index: RwLock<HashMap<Uuid, Uuid>>,
    accounts: Arc<AccountStore>,
    ledger: Arc<Ledger>,
    settings: EngineSettings,
    events: broadcast::Sender<EngineEvent>,
}

impl EngineService {
    pub fn new(settings: EngineSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            workers: RwLock::new(HashMap::new()),
            order_index: RwLock::new(HashMap::new()),
            accounts: Arc::new(AccountStore::new()),
            ledger: Arc::new(Ledger::new()),
            settings,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Lists an instrument for trading by spawning its worker.
    pub async fn register_instrument(&self, instrument: Instrument) -> Result<(), EngineError> {
        let mut workers = self.workers.write().await;
        if workers.contains_key(&instrument.id) {
            return Err(EngineError::Validation(format!(
                "instrument {} is already registered",
                instrument.id
            )));
        }
        info!(instrument = %instrument.id, name = %instrument.name, "instrument registered");
        let engine = InstrumentEngine::new(
            instrument.clone(),
            Arc::clone(&self.accounts),
            Arc::clone(&self.ledger),
            self.settings,
        );
        let (client, _handle) = InstrumentWorker::new(engine).start();
        workers.insert(instrument.id, client);
        Ok(())
    }

    pub fn register_user(&self, account: UserAccount) {
        info!(user = %account.user_id, "user registered");
        self.accounts.insert(account);
    }

    pub async fn submit_order(
        &self,
        request: NewOrderRequest,
    ) -> Result<SubmitReport, EngineError> {
        let worker = self.worker(request.instrument_id).await?;
        let report = worker.submit(request).await?;
        self.order_index
            .write()
            .await
            .insert(report.order.id, report.order.instrument_id);

        let _ = self.events.send(EngineEvent::OrderAccepted {
            order_id: report.order.id,
            instrument_id: report.order.instrument_id,
            user_id: report.order.user_id,
        });
        for execution in &report.executions {
            let _ = self.events.send(EngineEvent::TradeExecuted {
                transaction_id: execution.transaction_id,
                instrument_id: report.order.instrument_id,
                quantity: execution.quantity,
                price: execution.price,
            });
        }
        Ok(report)
    }

    /// Cancels an order located by its id alone.
    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        reason: &str,
        actor: Uuid,
    ) -> Result<Order, EngineError> {
        let instrument_id = self.instrument_for_order(order_id).await?;
        let worker = self.worker(instrument_id).await?;
        let order = worker.cancel(order_id, reason.to_string(), actor).await?;
        let _ = self.events.send(EngineEvent::OrderCancelled {
            order_id,
            instrument_id,
        });
        Ok(order)
    }

    pub async fn order_book(
        &self,
        instrument_id: Uuid,
        depth: usize,
    ) -> Result<BookSnapshot, EngineError> {
        self.worker(instrument_id).await?.book(depth).await
    }

    /// Runs the expiry sweep across every registered instrument, each through
    /// its own worker mailbox. Returns the total number of expired orders.
    pub async fn sweep_expired_orders(&self) -> Result<usize, EngineError> {
        let workers: Vec<WorkerClient> = self.workers.read().await.values().cloned().collect();
        let now = Utc::now();
        let mut total = 0;
        for worker in workers {
            total += worker.sweep_expired(now).await?;
        }
        if total > 0 {
            info!(count = total, "expiry sweep finished");
        }
        Ok(total)
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<Order, EngineError> {
        let instrument_id = self.instrument_for_order(order_id).await?;
        self.worker(instrument_id)
            .await?
            .get_order(order_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("order {order_id}")))
    }

    pub async fn instrument(&self, instrument_id: Uuid) -> Result<Instrument, EngineError> {
        self.worker(instrument_id).await?.instrument().await
    }

    pub fn account(&self, user_id: Uuid) -> Result<UserAccount, EngineError> {
        self.accounts
            .get(user_id)
            .ok_or_else(|| EngineError::NotFound(format!("account {user_id}")))
    }

    pub fn transactions(&self, instrument_id: Uuid) -> Vec<Transaction> {
        self.ledger.for_instrument(instrument_id)
    }

    async fn worker(&self, instrument_id: Uuid) -> Result<WorkerClient, EngineError> {
        self.workers
            .read()
            .await
            .get(&instrument_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("instrument {instrument_id}")))
    }

    async fn instrument_for_order(&self, order_id: Uuid) -> Result<Uuid, EngineError> {
        self.order_index
            .read()
            .await
            .get(&order_id)
            .copied()
            .ok_or_else(|| EngineError::NotFound(format!("order {order_id}")))
    }
}
