// core/src/cart/mod.rs

pub mod ledger;

pub use ledger::CartLedger;
