//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Resting limit-order book for a single instrument, maintained in price-time priority.
//
// | Component     | Description                                                               |
// |---------------|---------------------------------------------------------------------------|
// | PriceLevel    | FIFO queue of orders at one price.                                        |
// | OrderBook     | Bid/ask BTreeMaps plus an O(1) id -> location map.                        |
// | BookSnapshot  | Read-only top-N view of live, unexpired resting orders.                   |
//
//--------------------------------------------------------------------------------------------------
// FUNCTIONS
//--------------------------------------------------------------------------------------------------
// | Name                  | Description                                  | Return Type            |
// |-----------------------|----------------------------------------------|------------------------|
// | insert                | Adds a resting order (back of its level)     | Result<(), BookError>  |
// | reinsert_front        | Puts a partially consumed maker back first   | Result<(), BookError>  |
// | remove                | Removes an order by id                       | Result<Order, BookError>|
// | peek_best             | Best-priced, oldest order on a side          | Option<&Order>         |
// | snapshot              | Top-N depth view per side                    | BookSnapshot           |
//--------------------------------------------------------------------------------------------------

use std::collections::{BTreeMap, HashMap, VecDeque};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::models::types::{Order, Side};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookError {
    #[error("order has no limit price and cannot rest in the book")]
    NoLimitPrice,

    #[error("order is for instrument {got}, book manages {expected}")]
    WrongInstrument { expected: Uuid, got: Uuid },

    #[error("order {0} not found in the book")]
    OrderNotFound(Uuid),

    #[error("order {0} is already resting in the book")]
    DuplicateOrder(Uuid),
}

/// Orders resting at one price, oldest first.
#[derive(Debug, Clone)]
pub struct PriceLevel {
    pub price: Decimal,
    pub orders: VecDeque<Order>,
    /// Sum of the level's remaining quantities.
    pub total_quantity: u64,
}

impl PriceLevel {
    fn new(price: Decimal) -> Self {
        Self {
            price,
            orders: VecDeque::with_capacity(4),
            total_quantity: 0,
        }
    }
}

/// One resting order as exposed by the depth view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookEntry {
    pub order_id: Uuid,
    pub price: Decimal,
    pub remaining_quantity: u64,
    pub placed_at: DateTime<Utc>,
}

/// Read-only aggregation of the book: top-N bids (price descending) and
/// top-N asks (price ascending), time-ordered within a level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub instrument_id: Uuid,
    pub bids: Vec<BookEntry>,
    pub asks: Vec<BookEntry>,
    pub captured_at: DateTime<Utc>,
}

/// Limit-order book for one instrument. Only the owning instrument worker
/// ever mutates it.
#[derive(Debug)]
pub struct OrderBook {
    instrument_id: Uuid,
    /// Buy orders by price; iterated in reverse for best-first.
    bids: BTreeMap<Decimal, PriceLevel>,
    /// Sell orders by price; iterated forward for best-first.
    asks: BTreeMap<Decimal, PriceLevel>,
    /// O(1) lookup: order id -> (side, price).
    order_map: HashMap<Uuid, (Side, Decimal)>,
}

impl OrderBook {
    pub fn new(instrument_id: Uuid) -> Self {
        Self {
            instrument_id,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            order_map: HashMap::new(),
        }
    }

    pub fn instrument_id(&self) -> Uuid {
        self.instrument_id
    }

    pub fn len(&self) -> usize {
        self.order_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order_map.is_empty()
    }

    pub fn contains(&self, order_id: Uuid) -> bool {
        self.order_map.contains_key(&order_id)
    }

    /// Adds a resting order at the back of its price level (time priority).
    pub fn insert(&mut self, order: Order) -> Result<(), BookError> {
        let price = self.admit(&order)?;
        self.order_map.insert(order.id, (order.side, price));
        let level = self
            .side_levels_mut(order.side)
            .entry(price)
            .or_insert_with(|| PriceLevel::new(price));
        level.total_quantity += order.remaining_quantity();
        level.orders.push_back(order);
        Ok(())
    }

    /// Puts a partially consumed maker back at the FRONT of its level so it
    /// keeps its time priority for the next incoming order.
    pub fn reinsert_front(&mut self, order: Order) -> Result<(), BookError> {
        let price = self.admit(&order)?;
        self.order_map.insert(order.id, (order.side, price));
        let level = self
            .side_levels_mut(order.side)
            .entry(price)
            .or_insert_with(|| PriceLevel::new(price));
        level.total_quantity += order.remaining_quantity();
        level.orders.push_front(order);
        Ok(())
    }

    /// Removes an order by id, returning it.
    pub fn remove(&mut self, order_id: Uuid) -> Result<Order, BookError> {
        let (side, price) = self
            .order_map
            .remove(&order_id)
            .ok_or(BookError::OrderNotFound(order_id))?;

        let levels = self.side_levels_mut(side);
        let level = levels
            .get_mut(&price)
            .ok_or(BookError::OrderNotFound(order_id))?;
        let index = level
            .orders
            .iter()
            .position(|o| o.id == order_id)
            .ok_or(BookError::OrderNotFound(order_id))?;
        let order = level
            .orders
            .remove(index)
            .ok_or(BookError::OrderNotFound(order_id))?;
        level.total_quantity = level.total_quantity.saturating_sub(order.remaining_quantity());
        if level.orders.is_empty() {
            levels.remove(&price);
        }
        Ok(order)
    }

    /// Best-priced, oldest resting order on a side: highest bid or lowest ask.
    pub fn peek_best(&self, side: Side) -> Option<&Order> {
        match side {
            Side::Buy => self
                .bids
                .values()
                .next_back()
                .and_then(|level| level.orders.front()),
            Side::Sell => self
                .asks
                .values()
                .next()
                .and_then(|level| level.orders.front()),
        }
    }

    pub fn best_bid_price(&self) -> Option<Decimal> {
        self.bids.keys().next_back().copied()
    }

    pub fn best_ask_price(&self) -> Option<Decimal> {
        self.asks.keys().next().copied()
    }

    /// Top-`depth` live, unexpired orders per side. Read-only.
    pub fn snapshot(&self, depth: usize, now: DateTime<Utc>) -> BookSnapshot {
        let collect = |orders: &mut dyn Iterator<Item = &PriceLevel>| {
            orders
                .flat_map(|level| level.orders.iter())
                .filter(|order| order.is_live() && !order.is_expired(now))
                .take(depth)
                .map(|order| BookEntry {
                    order_id: order.id,
                    price: order.limit_price.unwrap_or_default(),
                    remaining_quantity: order.remaining_quantity(),
                    placed_at: order.placed_at,
                })
                .collect::<Vec<_>>()
        };
        BookSnapshot {
            instrument_id: self.instrument_id,
            bids: collect(&mut self.bids.values().rev()),
            asks: collect(&mut self.asks.values()),
            captured_at: now,
        }
    }

    fn admit(&self, order: &Order) -> Result<Decimal, BookError> {
        let price = order.limit_price.ok_or(BookError::NoLimitPrice)?;
        if order.instrument_id != self.instrument_id {
            return Err(BookError::WrongInstrument {
                expected: self.instrument_id,
                got: order.instrument_id,
            });
        }
        if self.order_map.contains_key(&order.id) {
            return Err(BookError::DuplicateOrder(order.id));
        }
        Ok(price)
    }

    fn side_levels_mut(&mut self, side: Side) -> &mut BTreeMap<Decimal, PriceLevel> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }
}

//--------------------------------------------------------------------------------------------------
//  TESTS
//--------------------------------------------------------------------------------------------------
// | Name                            | Description                                      |
// |---------------------------------|--------------------------------------------------|
// | test_empty_book                 | Fresh book state.                                |
// | test_price_time_priority        | Best-first across levels, FIFO within.           |
// | test_reinsert_front             | Partially consumed maker keeps its place.        |
// | test_remove_order               | Removal by id and level cleanup.                 |
// | test_snapshot_ordering          | Bid/ask ordering and depth limit.                |
// | test_snapshot_filters_expired   | Expired orders are hidden from the view.         |
//--------------------------------------------------------------------------------------------------
