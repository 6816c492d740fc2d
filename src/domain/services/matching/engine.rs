//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// The matching core for one instrument. An InstrumentEngine owns the instrument record, its
// order book and the full order history; the owning worker task is the only caller, so every
// operation here runs strictly sequentially for the instrument.
//
// Matching rules:
//   * Market orders fill against the instrument's primary token pool at the reference price
//     and never rest in the book. An unexecuted remainder stays on the order.
//   * Limit orders scan the opposite side in price-time priority and execute at the MAKER's
//     price. The scan examines at most `max_scan_depth` resting candidates per submission;
//     the GTC remainder rests, the IOC remainder is cancelled.
//   * Stop orders are validated (trigger price required) and held open without matching;
//     trigger conversion belongs to an external price feed.
//
// Each execution commits all-or-nothing: ledger transaction, buyer debit, seller credit,
// inventory delta and both orders' fill state, or none of it.
//
// | Component        | Description                                             |
// |------------------|---------------------------------------------------------|
// | EngineSettings   | Matching tunables (scan depth, KYC threshold, fees).    |
// | NewOrderRequest  | Validated submission input.                             |
// | SubmitReport     | Order plus execution summary returned to the caller.    |
// | InstrumentEngine | submit / cancel / sweep / snapshot operations.          |
//--------------------------------------------------------------------------------------------------

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::models::account::Instrument;
use crate::domain::models::types::{
    Counterparty, Execution, Order, OrderKind, Side, TimeInForce, DEFAULT_ORDER_LIFETIME_HOURS,
};
use crate::domain::services::accounts::{AccountError, AccountStore};
use crate::domain::services::fees::{buyer_net_amount, seller_net_amount, FeeSchedule};
use crate::domain::services::ledger::{settlement_date, Ledger, SettlementStatus, Transaction};
use crate::domain::services::matching::EngineError;
use crate::domain::services::orderbook::{BookSnapshot, OrderBook};

/// Matching tunables, normally derived from [`crate::config::Config`].
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    /// Maximum number of resting candidates examined per incoming order.
    pub max_scan_depth: usize,
    /// Order value above which the submitter must be KYC verified.
    pub kyc_threshold: Decimal,
    /// Lifetime applied when a submission carries no explicit expiry.
    pub default_order_lifetime: Duration,
    pub fee_schedule: FeeSchedule,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_scan_depth: 10,
            kyc_threshold: dec!(50000),
            default_order_lifetime: Duration::hours(DEFAULT_ORDER_LIFETIME_HOURS),
            fee_schedule: FeeSchedule::default(),
        }
    }
}

/// One order submission, as received from the service layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderRequest {
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

/// What a submission produced: the order's final state for this pass plus an
/// execution summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitReport {
    pub order: Order,
    pub executions: Vec<Execution>,
    pub total_executed: u64,
    pub average_execution_price: Option<Decimal>,
    pub remaining_quantity: u64,
}

impl SubmitReport {
    fn from_order(order: Order) -> Self {
        let executions = order.executions.clone();
        let total_executed: u64 = executions.iter().map(|e| e.quantity).sum();
        let average_execution_price = if total_executed == 0 {
            None
        } else {
            Some(order.average_filled_price)
        };
        let remaining_quantity = order.remaining_quantity();
        Self {
            order,
            executions,
            total_executed,
            average_execution_price,
            remaining_quantity,
        }
    }
}

/// Matching core for one instrument. Not `Sync`: exactly one worker task owns
/// it and serializes every call.
#[derive(Debug)]
pub struct InstrumentEngine {
    instrument: Instrument,
    book: OrderBook,
    /// Every order ever accepted, latest state. Resting orders also live in
    /// the book; this map is kept in step after every mutation.
    orders: HashMap<Uuid, Order>,
    accounts: Arc<AccountStore>,
    ledger: Arc<Ledger>,
    settings: EngineSettings,
}

impl InstrumentEngine {
    pub fn new(
        instrument: Instrument,
        accounts: Arc<AccountStore>,
        ledger: Arc<Ledger>,
        settings: EngineSettings,
    ) -> Self {
        let book = OrderBook::new(instrument.id);
        Self {
            instrument,
            book,
            orders: HashMap::new(),
            accounts,
            ledger,
            settings,
        }
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn get_order(&self, order_id: Uuid) -> Option<Order> {
        self.orders.get(&order_id).cloned()
    }

    pub fn book_snapshot(&self, depth: usize) -> BookSnapshot {
        self.book.snapshot(depth, Utc::now())
    }

    /// Validates, accepts and immediately matches one submission.
    pub fn submit(&mut self, request: NewOrderRequest) -> Result<SubmitReport, EngineError> {
        self.validate(&request)?;

        let expires_at = request
            .expires_at
            .unwrap_or_else(|| Utc::now() + self.settings.default_order_lifetime);
        let mut order = Order::new(
            request.user_id,
            request.instrument_id,
            request.side,
            request.kind,
            request.quantity,
            request.limit_price,
            request.trigger_price,
            request.time_in_force,
            Some(expires_at),
        );
        order.open();
        info!(
            order = %order.id,
            user = %order.user_id,
            side = ?order.side,
            kind = ?order.kind,
            quantity = order.quantity,
            "order accepted"
        );

        match order.kind {
            OrderKind::Market => self.fill_from_pool(&mut order),
            OrderKind::Limit => {
                self.match_limit(&mut order);
                if order.is_live() && order.remaining_quantity() > 0 {
                    match order.time_in_force {
                        TimeInForce::Gtc => {
                            // Remainder rests; book and history hold the same state.
                            if let Err(err) = self.book.insert(order.clone()) {
                                warn!(order = %order.id, %err, "failed to rest remainder");
                            }
                        }
                        TimeInForce::Ioc => {
                            order.cancel("immediate-or-cancel remainder", order.user_id)?;
                        }
                    }
                }
            }
            // Stop orders wait for an external trigger; nothing to match yet.
            OrderKind::Stop => {}
        }

        self.orders.insert(order.id, order.clone());
        Ok(SubmitReport::from_order(order))
    }

    /// Cancels a live order, removing any resting remainder from the book.
    pub fn cancel(
        &mut self,
        order_id: Uuid,
        reason: &str,
        actor: Uuid,
    ) -> Result<Order, EngineError> {
        let mut order = self
            .orders
            .get(&order_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("order {order_id}")))?;
        order.cancel(reason, actor)?;
        if self.book.contains(order_id) {
            // Book copy is superseded by the cancelled one.
            let _ = self.book.remove(order_id);
        }
        info!(order = %order_id, reason, "order cancelled");
        self.orders.insert(order_id, order.clone());
        Ok(order)
    }

    /// Expires every live order whose deadline has passed. Returns how many
    /// were transitioned.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> usize {
        let expired_ids: Vec<Uuid> = self
            .orders
            .values()
            .filter(|o| o.is_live() && o.is_expired(now))
            .map(|o| o.id)
            .collect();

        let mut swept = 0;
        for order_id in expired_ids {
            if self.book.contains(order_id) {
                let _ = self.book.remove(order_id);
            }
            if let Some(order) = self.orders.get_mut(&order_id) {
                if order.expire().is_ok() {
                    swept += 1;
                    info!(order = %order_id, "order expired by sweep");
                }
            }
        }
        swept
    }

    fn validate(&self, request: &NewOrderRequest) -> Result<(), EngineError> {
        if request.instrument_id != self.instrument.id {
            return Err(EngineError::NotFound(format!(
                "instrument {}",
                request.instrument_id
            )));
        }
        if !self.instrument.tradable {
            return Err(EngineError::Validation(
                "instrument is not currently tradable".into(),
            ));
        }
        if request.quantity == 0 {
            return Err(EngineError::Validation(
                "quantity must be at least 1".into(),
            ));
        }
        match request.kind {
            OrderKind::Market => {}
            OrderKind::Limit | OrderKind::Stop => {
                let price = request
                    .limit_price
                    .ok_or_else(|| EngineError::Validation("limit price is required".into()))?;
                if price <= Decimal::ZERO {
                    return Err(EngineError::Validation(
                        "limit price must be positive".into(),
                    ));
                }
                if request.kind == OrderKind::Stop && request.trigger_price.is_none() {
                    return Err(EngineError::Validation(
                        "stop orders require a trigger price".into(),
                    ));
                }
            }
        }

        let kyc_verified = self
            .accounts
            .is_kyc_verified(request.user_id)
            .ok_or_else(|| EngineError::Validation(format!("unknown user {}", request.user_id)))?;

        // Estimated value: limit price when the order carries one, otherwise
        // the instrument's reference price.
        let reference_price = request
            .limit_price
            .unwrap_or(self.instrument.current_price);
        let estimated_value = Decimal::from(request.quantity) * reference_price;

        if estimated_value > self.settings.kyc_threshold && !kyc_verified {
            return Err(EngineError::KycRequired);
        }

        if request.side == Side::Buy {
            // Funds are checked at placement only and never reserved.
            let available = self
                .accounts
                .balance(request.user_id)
                .unwrap_or(Decimal::ZERO);
            if available < estimated_value {
                return Err(EngineError::InsufficientFunds {
                    required: estimated_value,
                    available,
                });
            }
            if request.kind == OrderKind::Market && self.instrument.pool_capacity_for_buy() == 0 {
                return Err(EngineError::InsufficientInventory);
            }
        }
        // Sell orders are accepted without a held-position check.
        Ok(())
    }

    /// Market path: one execution against the primary token pool at the
    /// reference price, capped at the pool's capacity for the side.
    fn fill_from_pool(&mut self, order: &mut Order) {
        let capacity = match order.side {
            Side::Buy => self.instrument.pool_capacity_for_buy(),
            Side::Sell => self.instrument.pool_capacity_for_sell(),
        };
        let quantity = order.remaining_quantity().min(capacity);
        if quantity == 0 {
            return;
        }

        let price = self.instrument.current_price;
        let value = Decimal::from(quantity) * price;
        let fees = self.settings.fee_schedule.calculate(value);
        let (buyer, seller) = match order.side {
            Side::Buy => (Some(order.user_id), None),
            Side::Sell => (None, Some(order.user_id)),
        };
        if let Err(err) = self.accounts.settle_execution(
            buyer,
            seller,
            buyer_net_amount(value, &fees),
            seller_net_amount(value, &fees),
            value,
        ) {
            // Abandoned before any write; the order stays open unfilled.
            warn!(order = %order.id, %err, "market execution abandoned");
            return;
        }

        match order.side {
            Side::Buy => self.instrument.consume_tokens(quantity),
            Side::Sell => self.instrument.release_tokens(quantity),
        }

        let executed_at = Utc::now();
        let transaction = Transaction {
            id: Uuid::new_v4(),
            instrument_id: self.instrument.id,
            buy_order_id: buyer.map(|_| order.id),
            sell_order_id: seller.map(|_| order.id),
            buyer_id: buyer,
            seller_id: seller,
            quantity,
            price,
            total_value: value,
            fees,
            buyer_net_amount: buyer_net_amount(value, &fees),
            seller_net_amount: seller_net_amount(value, &fees),
            executed_at,
            settlement_date: settlement_date(executed_at.date_naive()),
            settlement_status: SettlementStatus::Pending,
        };
        let transaction_id = transaction.id;
        self.ledger.record(transaction);

        order.apply_execution(Execution {
            quantity,
            price,
            executed_at,
            counterparty: Counterparty::MarketMaker,
            fees,
            transaction_id,
        });
        info!(
            order = %order.id,
            transaction = %transaction_id,
            quantity,
            %price,
            "market order executed against the pool"
        );
    }

    /// Limit path: price-time priority scan of the opposite side, bounded at
    /// `max_scan_depth` candidates, executing at each maker's price.
    fn match_limit(&mut self, taker: &mut Order) {
        let taker_limit = match taker.limit_price {
            Some(price) => price,
            None => return,
        };
        let mut scanned = 0;

        while taker.remaining_quantity() > 0 && scanned < self.settings.max_scan_depth {
            let (best_id, maker_price) = match self.book.peek_best(taker.side.opposite()) {
                Some(best) => match best.limit_price {
                    Some(price) => (best.id, price),
                    None => break,
                },
                None => break,
            };
            let crosses = match taker.side {
                Side::Buy => maker_price <= taker_limit,
                Side::Sell => maker_price >= taker_limit,
            };
            if !crosses {
                break;
            }
            scanned += 1;

            let mut maker = match self.book.remove(best_id) {
                Ok(maker) => maker,
                Err(_) => break,
            };

            let quantity = taker.remaining_quantity().min(maker.remaining_quantity());
            match self.commit_peer_match(taker, &mut maker, quantity, maker_price) {
                Ok(()) => {}
                Err(err) => {
                    // Nothing was written for this candidate; prior fills
                    // stand. The maker keeps its place in the queue.
                    warn!(
                        taker = %taker.id,
                        maker = %maker.id,
                        %err,
                        "execution abandoned"
                    );
                    if let Err(book_err) = self.book.reinsert_front(maker.clone()) {
                        warn!(maker = %maker.id, %book_err, "failed to restore maker");
                    }
                    break;
                }
            }

            self.orders.insert(maker.id, maker.clone());
            if maker.is_live() && maker.remaining_quantity() > 0 {
                // Front of its level: a partial fill must not cost the maker
                // its time priority.
                if let Err(err) = self.book.reinsert_front(maker.clone()) {
                    warn!(maker = %maker.id, %err, "failed to restore maker");
                }
            }
        }
    }

    /// Applies one peer-to-peer execution end to end, or nothing at all.
    fn commit_peer_match(
        &mut self,
        taker: &mut Order,
        maker: &mut Order,
        quantity: u64,
        price: Decimal,
    ) -> Result<(), AccountError> {
        let (buyer, seller) = match taker.side {
            Side::Buy => (&*taker, &*maker),
            Side::Sell => (&*maker, &*taker),
        };
        let buyer_id = buyer.user_id;
        let seller_id = seller.user_id;
        let buy_order_id = buyer.id;
        let sell_order_id = seller.id;

        let value = Decimal::from(quantity) * price;
        let fees = self.settings.fee_schedule.calculate(value);
        self.accounts.settle_execution(
            Some(buyer_id),
            Some(seller_id),
            buyer_net_amount(value, &fees),
            seller_net_amount(value, &fees),
            value,
        )?;

        let executed_at = Utc::now();
        let transaction = Transaction {
            id: Uuid::new_v4(),
            instrument_id: self.instrument.id,
            buy_order_id: Some(buy_order_id),
            sell_order_id: Some(sell_order_id),
            buyer_id: Some(buyer_id),
            seller_id: Some(seller_id),
            quantity,
            price,
            total_value: value,
            fees,
            buyer_net_amount: buyer_net_amount(value, &fees),
            seller_net_amount: seller_net_amount(value, &fees),
            executed_at,
            settlement_date: settlement_date(executed_at.date_naive()),
            settlement_status: SettlementStatus::Pending,
        };
        let transaction_id = transaction.id;
        self.ledger.record(transaction);

        taker.apply_execution(Execution {
            quantity,
            price,
            executed_at,
            counterparty: Counterparty::Peer {
                order_id: maker.id,
                user_id: maker.user_id,
            },
            fees,
            transaction_id,
        });
        maker.apply_execution(Execution {
            quantity,
            price,
            executed_at,
            counterparty: Counterparty::Peer {
                order_id: taker.id,
                user_id: taker.user_id,
            },
            fees,
            transaction_id,
        });
        info!(
            taker = %taker.id,
            maker = %maker.id,
            transaction = %transaction_id,
            quantity,
            %price,
            "orders matched"
        );
        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
//  TESTS
//--------------------------------------------------------------------------------------------------
// | Name                                  | Description                                      |
// |---------------------------------------|--------------------------------------------------|
// | test_market_buy_fills_from_pool       | Pool fill, inventory delta, ledger record.       |
// | test_market_sell_capped_at_pool_gap   | Market sell ceiling is total - available.        |
// | test_limit_cross_full_fill            | Crossing limit orders both reach Filled.         |
// | test_price_time_priority              | Better-priced later maker fills first.           |
// | test_maker_price_execution            | Execution happens at the resting price.          |
// | test_bounded_scan_depth               | At most max_scan_depth candidates examined.      |
// | test_ioc_remainder_cancelled          | IOC remainder does not rest.                     |
// | test_atomic_commit_abort              | Failed commit leaves zero traces.                |
// | test_overcommit_without_escrow        | Funds checked at placement, never reserved.      |
// | test_sell_without_position_accepted   | No held-position check on sells.                 |
// | test_stop_order_rests_untriggered     | Stop orders never match in-process.              |
// | test_validation_failures              | Rejections and their error variants.             |
// | test_cancel_terminal_fails            | Cancel allowed only from live states.            |
// | test_sweep_expired                    | Sweep expires and unbooks stale orders.          |
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::account::UserAccount;
    use crate::domain::models::types::OrderStatus;

    struct Harness {
        engine: InstrumentEngine,
        accounts: Arc<AccountStore>,
        ledger: Arc<Ledger>,
    }

    fn harness(total_tokens: u64, price: Decimal) -> Harness {
        let accounts = Arc::new(AccountStore::new());
        let ledger = Arc::new(Ledger::new());
        let instrument = Instrument::new(Uuid::new_v4(), "GOV-2030", total_tokens, price);
        let engine = InstrumentEngine::new(
            instrument,
            Arc::clone(&accounts),
            Arc::clone(&ledger),
            EngineSettings::default(),
        );
        Harness {
            engine,
            accounts,
            ledger,
        }
    }

    fn fund_user(harness: &Harness, balance: Decimal) -> Uuid {
        let user = Uuid::new_v4();
        harness
            .accounts
            .insert(UserAccount::new(user, balance, true));
        user
    }

    fn request(
        harness: &Harness,
        user: Uuid,
        side: Side,
        kind: OrderKind,
        quantity: u64,
        limit_price: Option<Decimal>,
    ) -> NewOrderRequest {
        NewOrderRequest {
            user_id: user,
            instrument_id: harness.engine.instrument().id,
            side,
            kind,
            quantity,
            limit_price,
            trigger_price: None,
            time_in_force: TimeInForce::Gtc,
            expires_at: None,
        }
    }

    #[test]
    fn test_market_buy_fills_from_pool() {
        let mut h = harness(1_000, dec!(100));
        let buyer = fund_user(&h, dec!(10000));

        let report = h
            .engine
            .submit(request(&h, buyer, Side::Buy, OrderKind::Market, 50, None))
            .unwrap();

        assert_eq!(report.total_executed, 50);
        assert_eq!(report.remaining_quantity, 0);
        assert_eq!(report.order.status, OrderStatus::Filled);
        assert_eq!(report.average_execution_price, Some(dec!(100)));
        assert_eq!(
            report.executions[0].counterparty,
            Counterparty::MarketMaker
        );
        assert_eq!(h.engine.instrument().available_tokens, 950);

        let transactions = h.ledger.all();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].total_value, dec!(5000));
        assert_eq!(transactions[0].seller_id, None);
        // 5000 + (5.00 + 0.90 + 5.00 + 0.75) fees
        assert_eq!(h.accounts.balance(buyer), Some(dec!(4988.35)));
    }

    #[test]
    fn test_market_sell_capped_at_pool_gap() {
        let mut h = harness(1_000, dec!(100));
        let buyer = fund_user(&h, dec!(100000));
        let seller = fund_user(&h, dec!(0));

        h.engine
            .submit(request(&h, buyer, Side::Buy, OrderKind::Market, 600, None))
            .unwrap();
        assert_eq!(h.engine.instrument().available_tokens, 400);

        // Only 600 tokens have ever left the pool, so a sell of 700 caps there.
        let report = h
            .engine
            .submit(request(&h, seller, Side::Sell, OrderKind::Market, 700, None))
            .unwrap();
        assert_eq!(report.total_executed, 600);
        assert_eq!(report.remaining_quantity, 100);
        assert_eq!(report.order.status, OrderStatus::PartiallyFilled);
        assert_eq!(h.engine.instrument().available_tokens, 1_000);
    }

    #[test]
    fn test_limit_cross_full_fill() {
        let mut h = harness(1_000, dec!(100));
        let seller = fund_user(&h, dec!(0));
        let buyer = fund_user(&h, dec!(20000));

        let resting = h
            .engine
            .submit(request(
                &h,
                seller,
                Side::Sell,
                OrderKind::Limit,
                100,
                Some(dec!(105)),
            ))
            .unwrap();
        assert_eq!(resting.order.status, OrderStatus::Open);

        let taker = h
            .engine
            .submit(request(
                &h,
                buyer,
                Side::Buy,
                OrderKind::Limit,
                100,
                Some(dec!(105)),
            ))
            .unwrap();

        assert_eq!(taker.order.status, OrderStatus::Filled);
        assert_eq!(taker.average_execution_price, Some(dec!(105)));
        let maker = h.engine.get_order(resting.order.id).unwrap();
        assert_eq!(maker.status, OrderStatus::Filled);
        assert_eq!(h.ledger.all()[0].total_value, dec!(10500));
        // Peer match: the pool counter does not move.
        assert_eq!(h.engine.instrument().available_tokens, 1_000);
        // Seller receives value minus fees.
        let fees = FeeSchedule::Detailed.calculate(dec!(10500));
        assert_eq!(h.accounts.balance(seller), Some(dec!(10500) - fees.total));
    }

    #[test]
    fn test_price_time_priority() {
        let mut h = harness(1_000, dec!(100));
        let seller_a = fund_user(&h, dec!(0));
        let seller_b = fund_user(&h, dec!(0));
        let buyer = fund_user(&h, dec!(10000));

        let at_105 = h
            .engine
            .submit(request(
                &h,
                seller_a,
                Side::Sell,
                OrderKind::Limit,
                10,
                Some(dec!(105)),
            ))
            .unwrap();
        let at_104 = h
            .engine
            .submit(request(
                &h,
                seller_b,
                Side::Sell,
                OrderKind::Limit,
                10,
                Some(dec!(104)),
            ))
            .unwrap();

        let taker = h
            .engine
            .submit(request(
                &h,
                buyer,
                Side::Buy,
                OrderKind::Limit,
                10,
                Some(dec!(106)),
            ))
            .unwrap();

        // Better price wins even though it arrived later.
        assert_eq!(taker.average_execution_price, Some(dec!(104)));
        assert_eq!(
            h.engine.get_order(at_104.order.id).unwrap().status,
            OrderStatus::Filled
        );
        assert_eq!(
            h.engine.get_order(at_105.order.id).unwrap().status,
            OrderStatus::Open
        );
    }

    #[test]
    fn test_maker_price_execution() {
        let mut h = harness(1_000, dec!(100));
        let seller = fund_user(&h, dec!(0));
        let buyer = fund_user(&h, dec!(20000));

        h.engine
            .submit(request(
                &h,
                seller,
                Side::Sell,
                OrderKind::Limit,
                10,
                Some(dec!(102)),
            ))
            .unwrap();
        // Taker is willing to pay 110 but executes at the resting 102.
        let taker = h
            .engine
            .submit(request(
                &h,
                buyer,
                Side::Buy,
                OrderKind::Limit,
                10,
                Some(dec!(110)),
            ))
            .unwrap();
        assert_eq!(taker.executions[0].price, dec!(102));
        assert_eq!(h.ledger.all()[0].price, dec!(102));
    }

    #[test]
    fn test_bounded_scan_depth() {
        let mut h = harness(1_000, dec!(100));
        let buyer = fund_user(&h, dec!(10000));
        for _ in 0..12 {
            let seller = fund_user(&h, dec!(0));
            h.engine
                .submit(request(
                    &h,
                    seller,
                    Side::Sell,
                    OrderKind::Limit,
                    1,
                    Some(dec!(100)),
                ))
                .unwrap();
        }

        let report = h
            .engine
            .submit(request(
                &h,
                buyer,
                Side::Buy,
                OrderKind::Limit,
                12,
                Some(dec!(100)),
            ))
            .unwrap();

        // Twelve eligible makers, but only ten candidates are ever examined.
        assert_eq!(report.total_executed, 10);
        assert_eq!(report.remaining_quantity, 2);
        assert_eq!(report.order.status, OrderStatus::PartiallyFilled);
        // The remainder rests.
        let snapshot = h.engine.book_snapshot(20);
        assert_eq!(snapshot.bids.len(), 1);
        assert_eq!(snapshot.bids[0].remaining_quantity, 2);
        assert_eq!(snapshot.asks.len(), 2);
    }

    #[test]
    fn test_ioc_remainder_cancelled() {
        let mut h = harness(1_000, dec!(100));
        let seller = fund_user(&h, dec!(0));
        let buyer = fund_user(&h, dec!(10000));

        h.engine
            .submit(request(
                &h,
                seller,
                Side::Sell,
                OrderKind::Limit,
                5,
                Some(dec!(100)),
            ))
            .unwrap();

        let mut ioc = request(&h, buyer, Side::Buy, OrderKind::Limit, 10, Some(dec!(100)));
        ioc.time_in_force = TimeInForce::Ioc;
        let report = h.engine.submit(ioc).unwrap();

        assert_eq!(report.total_executed, 5);
        assert_eq!(report.order.status, OrderStatus::Cancelled);
        assert!(h.engine.book_snapshot(10).bids.is_empty());
    }

    #[test]
    fn test_atomic_commit_abort() {
        let mut h = harness(1_000, dec!(100));
        // Covers the placement estimate (100 * 100) exactly, but not fees.
        let buyer = fund_user(&h, dec!(10000));

        let report = h
            .engine
            .submit(request(&h, buyer, Side::Buy, OrderKind::Market, 100, None))
            .unwrap();

        assert_eq!(report.total_executed, 0);
        assert_eq!(report.order.status, OrderStatus::Open);
        assert!(h.ledger.is_empty());
        assert_eq!(h.accounts.balance(buyer), Some(dec!(10000)));
        assert_eq!(h.engine.instrument().available_tokens, 1_000);
    }

    #[test]
    fn test_overcommit_without_escrow() {
        let mut h = harness(1_000, dec!(100));
        let buyer = fund_user(&h, dec!(10000));

        // Two open buys worth 8000 each both pass the placement check: funds
        // are never reserved.
        for _ in 0..2 {
            let report = h
                .engine
                .submit(request(
                    &h,
                    buyer,
                    Side::Buy,
                    OrderKind::Limit,
                    100,
                    Some(dec!(80)),
                ))
                .unwrap();
            assert_eq!(report.order.status, OrderStatus::Open);
        }
        assert_eq!(h.engine.book_snapshot(10).bids.len(), 2);
        assert_eq!(h.accounts.balance(buyer), Some(dec!(10000)));
    }

    #[test]
    fn test_sell_without_position_accepted() {
        let mut h = harness(1_000, dec!(100));
        let seller = fund_user(&h, dec!(0));

        let report = h
            .engine
            .submit(request(
                &h,
                seller,
                Side::Sell,
                OrderKind::Limit,
                50,
                Some(dec!(101)),
            ))
            .unwrap();
        assert_eq!(report.order.status, OrderStatus::Open);
        assert_eq!(h.engine.book_snapshot(10).asks.len(), 1);
    }

    #[test]
    fn test_stop_order_rests_untriggered() {
        let mut h = harness(1_000, dec!(100));
        let seller = fund_user(&h, dec!(0));
        let buyer = fund_user(&h, dec!(20000));

        let mut stop = request(&h, seller, Side::Sell, OrderKind::Stop, 10, Some(dec!(95)));
        stop.trigger_price = Some(dec!(96));
        let report = h.engine.submit(stop).unwrap();
        assert_eq!(report.order.status, OrderStatus::Open);
        assert_eq!(report.total_executed, 0);

        // A crossing buy finds nothing: the stop order is not in the book.
        let taker = h
            .engine
            .submit(request(
                &h,
                buyer,
                Side::Buy,
                OrderKind::Limit,
                10,
                Some(dec!(100)),
            ))
            .unwrap();
        assert_eq!(taker.total_executed, 0);
    }

    #[test]
    fn test_validation_failures() {
        let mut h = harness(1_000, dec!(100));
        let user = fund_user(&h, dec!(1000));

        let zero_quantity = request(&h, user, Side::Buy, OrderKind::Limit, 0, Some(dec!(100)));
        assert!(matches!(
            h.engine.submit(zero_quantity),
            Err(EngineError::Validation(_))
        ));

        let no_price = request(&h, user, Side::Buy, OrderKind::Limit, 10, None);
        assert!(matches!(
            h.engine.submit(no_price),
            Err(EngineError::Validation(_))
        ));

        let unknown_user = request(
            &h,
            Uuid::new_v4(),
            Side::Buy,
            OrderKind::Limit,
            10,
            Some(dec!(100)),
        );
        assert!(matches!(
            h.engine.submit(unknown_user),
            Err(EngineError::Validation(_))
        ));

        let poor_buy = request(&h, user, Side::Buy, OrderKind::Limit, 100, Some(dec!(100)));
        assert_eq!(
            h.engine.submit(poor_buy),
            Err(EngineError::InsufficientFunds {
                required: dec!(10000),
                available: dec!(1000),
            })
        );

        // Unverified user above the KYC value threshold.
        let unverified = Uuid::new_v4();
        h.accounts
            .insert(UserAccount::new(unverified, dec!(1000000), false));
        let big = request(
            &h,
            unverified,
            Side::Buy,
            OrderKind::Limit,
            1000,
            Some(dec!(100)),
        );
        assert_eq!(h.engine.submit(big), Err(EngineError::KycRequired));

        // Market buy against an empty pool.
        let mut drained = harness(0, dec!(100));
        let rich = fund_user(&drained, dec!(100000));
        let starved = request(&drained, rich, Side::Buy, OrderKind::Market, 10, None);
        assert_eq!(
            drained.engine.submit(starved),
            Err(EngineError::InsufficientInventory)
        );

        // Validation failures never touch state.
        assert!(h.ledger.is_empty());
        assert!(h.engine.book_snapshot(10).bids.is_empty());
    }

    #[test]
    fn test_cancel_terminal_fails() {
        let mut h = harness(1_000, dec!(100));
        let buyer = fund_user(&h, dec!(10000));

        let filled = h
            .engine
            .submit(request(&h, buyer, Side::Buy, OrderKind::Market, 10, None))
            .unwrap();
        assert_eq!(filled.order.status, OrderStatus::Filled);
        assert_eq!(
            h.engine.cancel(filled.order.id, "too late", buyer),
            Err(EngineError::InvalidStateTransition {
                from: OrderStatus::Filled
            })
        );

        let resting = h
            .engine
            .submit(request(
                &h,
                buyer,
                Side::Buy,
                OrderKind::Limit,
                10,
                Some(dec!(90)),
            ))
            .unwrap();
        let cancelled = h
            .engine
            .cancel(resting.order.id, "user requested", buyer)
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert!(h.engine.book_snapshot(10).bids.is_empty());
        // Cancelling twice fails.
        assert_eq!(
            h.engine.cancel(resting.order.id, "again", buyer),
            Err(EngineError::InvalidStateTransition {
                from: OrderStatus::Cancelled
            })
        );

        assert!(matches!(
            h.engine.cancel(Uuid::new_v4(), "ghost", buyer),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn test_sweep_expired() {
        let mut h = harness(1_000, dec!(100));
        let buyer = fund_user(&h, dec!(10000));

        let mut stale = request(&h, buyer, Side::Buy, OrderKind::Limit, 10, Some(dec!(90)));
        stale.expires_at = Some(Utc::now() - Duration::minutes(1));
        let stale = h.engine.submit(stale).unwrap();

        let fresh = h
            .engine
            .submit(request(
                &h,
                buyer,
                Side::Buy,
                OrderKind::Limit,
                10,
                Some(dec!(91)),
            ))
            .unwrap();

        let swept = h.engine.sweep_expired(Utc::now());
        assert_eq!(swept, 1);
        assert_eq!(
            h.engine.get_order(stale.order.id).unwrap().status,
            OrderStatus::Expired
        );
        assert_eq!(
            h.engine.get_order(fresh.order.id).unwrap().status,
            OrderStatus::Open
        );
        // The expired order left the book; the fresh one stayed.
        let snapshot = h.engine.book_snapshot(10);
        assert_eq!(snapshot.bids.len(), 1);
        assert_eq!(snapshot.bids[0].order_id, fresh.order.id);
        // Second sweep finds nothing.
        assert_eq!(h.engine.sweep_expired(Utc::now()), 0);
    }
}
