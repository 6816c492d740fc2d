pub mod accounts;
pub mod engine;
pub mod fees;
pub mod ledger;
pub mod matching;
pub mod orderbook;
