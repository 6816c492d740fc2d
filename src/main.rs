//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Entry point for the bond matching engine API server. Reads configuration from the
// environment, starts the engine service, subscribes a logging listener to engine events
// and serves the REST API until shutdown.
//--------------------------------------------------------------------------------------------------

use std::sync::Arc;

use tracing::{info, Level};

use bond_matching_engine::api::Api;
use bond_matching_engine::config::Config;
use bond_matching_engine::domain::services::engine::{EngineEvent, EngineService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("starting bond matching engine");
    let config = Config::from_env();
    let service = Arc::new(EngineService::new(config.engine_settings()));

    // Log engine events; matching never depends on this listener.
    let mut events = service.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                EngineEvent::OrderAccepted { order_id, .. } => {
                    info!(order = %order_id, "event: order accepted");
                }
                EngineEvent::TradeExecuted {
                    transaction_id,
                    quantity,
                    price,
                    ..
                } => {
                    info!(transaction = %transaction_id, quantity, %price, "event: trade executed");
                }
                EngineEvent::OrderCancelled { order_id, .. } => {
                    info!(order = %order_id, "event: order cancelled");
                }
            }
        }
    });

    let api = Api::new(config.bind_addr, service);
    api.serve().await
}
