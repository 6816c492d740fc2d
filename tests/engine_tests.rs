//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// End-to-end engine scenarios driven through the EngineService: full order lifecycles,
// concurrent submissions against shared inventory and wallets, and replay determinism.
//--------------------------------------------------------------------------------------------------

use std::sync::Arc;

use chrono::Datelike;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use bond_matching_engine::{
    EngineService, EngineSettings, FeeSchedule, Instrument, NewOrderRequest, OrderKind,
    OrderStatus, Side, TimeInForce, UserAccount,
};

fn market_order(instrument_id: Uuid, user: Uuid, side: Side, quantity: u64) -> NewOrderRequest {
    NewOrderRequest {
        user_id: user,
        instrument_id,
        side,
        kind: OrderKind::Market,
        quantity,
        limit_price: None,
        trigger_price: None,
        time_in_force: TimeInForce::Gtc,
        expires_at: None,
    }
}

fn limit_order(
    instrument_id: Uuid,
    user: Uuid,
    side: Side,
    quantity: u64,
    price: Decimal,
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

async fn service_with_instrument(total_tokens: u64, price: Decimal) -> (Arc<EngineService>, Uuid) {
    let service = Arc::new(EngineService::new(EngineSettings::default()));
    let instrument = Instrument::new(Uuid::new_v4(), "GOV-2030", total_tokens, price);
    let instrument_id = instrument.id;
    service.register_instrument(instrument).await.unwrap();
    (service, instrument_id)
}

#[tokio::test]
async fn full_lifecycle_limit_match() {
    let (service, instrument_id) = service_with_instrument(1_000, dec!(100)).await;
    let seller = Uuid::new_v4();
    let buyer = Uuid::new_v4();
    service.register_user(UserAccount::new(seller, dec!(0), true));
    service.register_user(UserAccount::new(buyer, dec!(20000), true));

    let resting = service
        .submit_order(limit_order(instrument_id, seller, Side::Sell, 100, dec!(105)))
        .await
        .unwrap();
    assert_eq!(resting.order.status, OrderStatus::Open);
    assert_eq!(
        service.order_book(instrument_id, 10).await.unwrap().asks.len(),
        1
    );

    let taker = service
        .submit_order(limit_order(instrument_id, buyer, Side::Buy, 100, dec!(105)))
        .await
        .unwrap();
    assert_eq!(taker.order.status, OrderStatus::Filled);
    assert_eq!(taker.total_executed, 100);
    assert_eq!(taker.average_execution_price, Some(dec!(105)));

    // Both sides of the trade are final.
    let maker = service.get_order(resting.order.id).await.unwrap();
    assert_eq!(maker.status, OrderStatus::Filled);
    assert_eq!(maker.filled_quantity, maker.quantity);

    // Ledger carries exactly one transaction with a T+2 settlement date on a
    // weekday.
    let transactions = service.transactions(instrument_id);
    assert_eq!(transactions.len(), 1);
    let tx = &transactions[0];
    assert_eq!(tx.total_value, dec!(10500));
    assert_eq!(tx.buyer_id, Some(buyer));
    assert_eq!(tx.seller_id, Some(seller));
    assert!(tx.settlement_date > tx.executed_at.date_naive());
    assert!(!matches!(
        tx.settlement_date.weekday(),
        chrono::Weekday::Sat | chrono::Weekday::Sun
    ));

    // Wallets: buyer paid value + fees, seller received value - fees.
    let fees = FeeSchedule::Detailed.calculate(dec!(10500));
    assert_eq!(
        service.account(buyer).unwrap().balance,
        dec!(20000) - dec!(10500) - fees.total
    );
    assert_eq!(
        service.account(seller).unwrap().balance,
        dec!(10500) - fees.total
    );
    // Both parties earned points for the trade.
    assert_eq!(service.account(buyer).unwrap().points, 10);
    assert_eq!(service.account(seller).unwrap().trade_count, 1);

    // Peer-to-peer trades never touch the primary pool.
    assert_eq!(
        service.instrument(instrument_id).await.unwrap().available_tokens,
        1_000
    );
}

#[tokio::test]
async fn concurrent_market_buys_respect_inventory() {
    let (service, instrument_id) = service_with_instrument(1_000, dec!(100)).await;
    let buyer_a = Uuid::new_v4();
    let buyer_b = Uuid::new_v4();
    service.register_user(UserAccount::new(buyer_a, dec!(100000), true));
    service.register_user(UserAccount::new(buyer_b, dec!(100000), true));

    let task_a = tokio::spawn({
        let service = Arc::clone(&service);
        async move {
            service
                .submit_order(market_order(instrument_id, buyer_a, Side::Buy, 600))
                .await
                .unwrap()
        }
    });
    let task_b = tokio::spawn({
        let service = Arc::clone(&service);
        async move {
            service
                .submit_order(market_order(instrument_id, buyer_b, Side::Buy, 600))
                .await
                .unwrap()
        }
    });
    let report_a = task_a.await.unwrap();
    let report_b = task_b.await.unwrap();

    // Whatever the interleaving, the pool never oversells.
    let total = report_a.total_executed + report_b.total_executed;
    assert!(total <= 1_000);
    assert_eq!(total, 1_000); // 600 for the winner, 400 for the loser

    let instrument = service.instrument(instrument_id).await.unwrap();
    assert_eq!(instrument.available_tokens, 0);

    // The partially filled order reports a consistent remainder.
    let loser = if report_a.total_executed < report_b.total_executed {
        &report_a
    } else {
        &report_b
    };
    assert_eq!(loser.order.status, OrderStatus::PartiallyFilled);
    assert_eq!(loser.total_executed, 400);
    assert_eq!(loser.remaining_quantity, 200);
    assert_eq!(
        loser.order.quantity - loser.order.filled_quantity,
        loser.remaining_quantity
    );
}

#[tokio::test]
async fn replay_reproduces_identical_state() {
    async fn run_scenario() -> (Decimal, Decimal, u64, Decimal) {
        let service = Arc::new(EngineService::new(EngineSettings::default()));
        let instrument = Instrument::new(Uuid::from_u128(1), "GOV-2030", 1_000, dec!(100));
        let instrument_id = instrument.id;
        service.register_instrument(instrument).await.unwrap();

        let alice = Uuid::from_u128(10);
        let bob = Uuid::from_u128(11);
        service.register_user(UserAccount::new(alice, dec!(50000), true));
        service.register_user(UserAccount::new(bob, dec!(50000), true));

        service
            .submit_order(market_order(instrument_id, alice, Side::Buy, 200))
            .await
            .unwrap();
        service
            .submit_order(limit_order(instrument_id, alice, Side::Sell, 150, dec!(102)))
            .await
            .unwrap();
        service
            .submit_order(limit_order(instrument_id, bob, Side::Buy, 100, dec!(102)))
            .await
            .unwrap();
        service
            .submit_order(market_order(instrument_id, bob, Side::Sell, 50))
            .await
            .unwrap();

        let instrument = service.instrument(instrument_id).await.unwrap();
        let total_traded: Decimal = service
            .transactions(instrument_id)
            .iter()
            .map(|t| t.total_value)
            .sum();
        (
            service.account(alice).unwrap().balance,
            service.account(bob).unwrap().balance,
            instrument.available_tokens,
            total_traded,
        )
    }

    let first = run_scenario().await;
    let second = run_scenario().await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn expiry_sweep_and_cancellation_across_service() {
    let (service, instrument_id) = service_with_instrument(1_000, dec!(100)).await;
    let buyer = Uuid::new_v4();
    service.register_user(UserAccount::new(buyer, dec!(100000), true));

    let mut stale = limit_order(instrument_id, buyer, Side::Buy, 10, dec!(95));
    stale.expires_at = Some(chrono::Utc::now() - chrono::Duration::minutes(5));
    let stale = service.submit_order(stale).await.unwrap();

    let live = service
        .submit_order(limit_order(instrument_id, buyer, Side::Buy, 10, dec!(96)))
        .await
        .unwrap();

    assert_eq!(service.sweep_expired_orders().await.unwrap(), 1);
    assert_eq!(
        service.get_order(stale.order.id).await.unwrap().status,
        OrderStatus::Expired
    );

    // Expired orders cannot be cancelled afterwards.
    let err = service
        .cancel_order(stale.order.id, "too late", buyer)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        bond_matching_engine::EngineError::InvalidStateTransition {
            from: OrderStatus::Expired
        }
    ));

    // The live order still cancels normally and leaves the book.
    let cancelled = service
        .cancel_order(live.order.id, "user requested", buyer)
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert!(service
        .order_book(instrument_id, 10)
        .await
        .unwrap()
        .bids
        .is_empty());
}
