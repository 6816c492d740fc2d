//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// This module implements the per-instrument worker task. It uses message passing so the
// InstrumentEngine is only ever touched by one task: commands arrive through an mpsc mailbox
// and are processed strictly in arrival order, which is what serializes all matching,
// cancellation and sweeping for the instrument.
//
// | Component         | Description                                                 |
// |-------------------|-------------------------------------------------------------|
// | InstrumentWorker  | Task owning an InstrumentEngine                             |
// | WorkerClient      | Client interface to interact with the worker                |
// | EngineCommand     | Commands sent to the worker                                 |
//--------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use crate::domain::models::account::Instrument;
use crate::domain::models::types::Order;
use crate::domain::services::matching::{
    EngineError, InstrumentEngine, NewOrderRequest, SubmitReport,
};
use crate::domain::services::orderbook::BookSnapshot;

const MAILBOX_CAPACITY: usize = 1000;

/// Commands that can be sent to an InstrumentWorker.
#[derive(Debug)]
enum EngineCommand {
    Submit {
        request: NewOrderRequest,
        response_tx: oneshot::Sender<Result<SubmitReport, EngineError>>,
    },
    Cancel {
        order_id: Uuid,
        reason: String,
        actor: Uuid,
        response_tx: oneshot::Sender<Result<Order, EngineError>>,
    },
    Book {
        depth: usize,
        response_tx: oneshot::Sender<BookSnapshot>,
    },
    SweepExpired {
        now: DateTime<Utc>,
        response_tx: oneshot::Sender<usize>,
    },
    GetOrder {
        order_id: Uuid,
        response_tx: oneshot::Sender<Option<Order>>,
    },
    Instrument {
        response_tx: oneshot::Sender<Instrument>,
    },
    Shutdown,
}

/// Task that processes one instrument's engine operations.
pub struct InstrumentWorker {
    engine: InstrumentEngine,
}

impl InstrumentWorker {
    pub fn new(engine: InstrumentEngine) -> Self {
        Self { engine }
    }

    /// Spawns the worker task and returns a client to interact with it.
    pub fn start(self) -> (WorkerClient, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(MAILBOX_CAPACITY);
        let instrument_id = self.engine.instrument().id;
        let client = WorkerClient::new(instrument_id, command_tx);
        let handle = tokio::spawn(self.run(command_rx));
        (client, handle)
    }

    async fn run(mut self, mut command_rx: Receiver<EngineCommand>) {
        let instrument_id = self.engine.instrument().id;
        info!(instrument = %instrument_id, "instrument worker started");
        while let Some(cmd) = command_rx.recv().await {
            match cmd {
                EngineCommand::Shutdown => break,
                cmd => self.handle_command(cmd),
            }
        }
        info!(instrument = %instrument_id, "instrument worker stopped");
    }

    fn handle_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::Submit {
                request,
                response_tx,
            } => {
                let _ = response_tx.send(self.engine.submit(request));
            }
            EngineCommand::Cancel {
                order_id,
                reason,
                actor,
                response_tx,
            } => {
                let _ = response_tx.send(self.engine.cancel(order_id, &reason, actor));
            }
            EngineCommand::Book { depth, response_tx } => {
                let _ = response_tx.send(self.engine.book_snapshot(depth));
            }
            EngineCommand::SweepExpired { now, response_tx } => {
                let _ = response_tx.send(self.engine.sweep_expired(now));
            }
            EngineCommand::GetOrder {
                order_id,
                response_tx,
            } => {
                let _ = response_tx.send(self.engine.get_order(order_id));
            }
            EngineCommand::Instrument { response_tx } => {
                let _ = response_tx.send(self.engine.instrument().clone());
            }
            EngineCommand::Shutdown => {}
        }
    }
}

/// Client interface to one instrument's worker. Cheap to clone.
#[derive(Debug, Clone)]
pub struct WorkerClient {
    instrument_id: Uuid,
    command_tx: Sender<EngineCommand>,
}

impl WorkerClient {
    fn new(instrument_id: Uuid, command_tx: Sender<EngineCommand>) -> Self {
        Self {
            instrument_id,
            command_tx,
        }
    }

    pub fn instrument_id(&self) -> Uuid {
        self.instrument_id
    }

    pub async fn submit(&self, request: NewOrderRequest) -> Result<SubmitReport, EngineError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(EngineCommand::Submit {
                request,
                response_tx,
            })
            .await
            .map_err(|_| closed(self.instrument_id))?;
        response_rx.await.map_err(|_| closed(self.instrument_id))?
    }

    pub async fn cancel(
        &self,
        order_id: Uuid,
        reason: String,
        actor: Uuid,
    ) -> Result<Order, EngineError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(EngineCommand::Cancel {
                order_id,
                reason,
                actor,
                response_tx,
            })
            .await
            .map_err(|_| closed(self.instrument_id))?;
        response_rx.await.map_err(|_| closed(self.instrument_id))?
    }

    pub async fn book(&self, depth: usize) -> Result<BookSnapshot, EngineError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(EngineCommand::Book { depth, response_tx })
            .await
            .map_err(|_| closed(self.instrument_id))?;
        response_rx.await.map_err(|_| closed(self.instrument_id))
    }

    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, EngineError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(EngineCommand::SweepExpired { now, response_tx })
            .await
            .map_err(|_| closed(self.instrument_id))?;
        response_rx.await.map_err(|_| closed(self.instrument_id))
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>, EngineError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(EngineCommand::GetOrder {
                order_id,
                response_tx,
            })
            .await
            .map_err(|_| closed(self.instrument_id))?;
        response_rx.await.map_err(|_| closed(self.instrument_id))
    }

    pub async fn instrument(&self) -> Result<Instrument, EngineError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(EngineCommand::Instrument { response_tx })
            .await
            .map_err(|_| closed(self.instrument_id))?;
        response_rx.await.map_err(|_| closed(self.instrument_id))
    }

    pub async fn shutdown(&self) -> Result<(), EngineError> {
        self.command_tx
            .send(EngineCommand::Shutdown)
            .await
            .map_err(|_| closed(self.instrument_id))
    }
}

fn closed(instrument_id: Uuid) -> EngineError {
    EngineError::ConcurrencyConflict(format!("worker for instrument {instrument_id} unavailable"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::account::UserAccount;
    use crate::domain::models::types::{OrderKind, OrderStatus, Side, TimeInForce};
    use crate::domain::services::accounts::AccountStore;
    use crate::domain::services::ledger::Ledger;
    use crate::domain::services::matching::EngineSettings;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn start_worker(total_tokens: u64) -> (WorkerClient, Arc<AccountStore>, Uuid) {
        let accounts = Arc::new(AccountStore::new());
        let ledger = Arc::new(Ledger::new());
        let instrument = Instrument::new(Uuid::new_v4(), "GOV-2030", total_tokens, dec!(100));
        let instrument_id = instrument.id;
        let engine = InstrumentEngine::new(
            instrument,
            Arc::clone(&accounts),
            ledger,
            EngineSettings::default(),
        );
        let (client, _handle) = InstrumentWorker::new(engine).start();
        (client, accounts, instrument_id)
    }

    fn limit_request(
        instrument_id: Uuid,
        user: Uuid,
        side: Side,
        quantity: u64,
        price: rust_decimal::Decimal,
    ) -> NewOrderRequest {
        NewOrderRequest {
            user_id: user,
            instrument_id,
            side,
            kind: OrderKind::Limit,
            quantity,
            limit_price: Some(price),
            trigger_price: None,
            time_in_force: TimeInForce::Gtc,
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn test_submit_and_match_through_worker() {
        let (client, accounts, instrument_id) = start_worker(1_000);
        let seller = Uuid::new_v4();
        let buyer = Uuid::new_v4();
        accounts.insert(UserAccount::new(seller, dec!(0), true));
        accounts.insert(UserAccount::new(buyer, dec!(20000), true));

        let resting = client
            .submit(limit_request(
                instrument_id,
                seller,
                Side::Sell,
                100,
                dec!(105),
            ))
            .await
            .unwrap();
        assert_eq!(resting.order.status, OrderStatus::Open);

        let taker = client
            .submit(limit_request(
                instrument_id,
                buyer,
                Side::Buy,
                100,
                dec!(105),
            ))
            .await
            .unwrap();
        assert_eq!(taker.order.status, OrderStatus::Filled);

        let maker = client.get_order(resting.order.id).await.unwrap().unwrap();
        assert_eq!(maker.status, OrderStatus::Filled);
        assert!(client.book(10).await.unwrap().asks.is_empty());

        client.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_mailbox_is_a_conflict() {
        let (client, _accounts, instrument_id) = start_worker(1_000);
        client.shutdown().await.unwrap();
        // Give the worker a chance to drain and drop its receiver.
        tokio::task::yield_now().await;

        let user = Uuid::new_v4();
        let result = client
            .submit(limit_request(instrument_id, user, Side::Sell, 1, dec!(100)))
            .await;
        assert!(matches!(result, Err(EngineError::ConcurrencyConflict(_))));
    }
}
