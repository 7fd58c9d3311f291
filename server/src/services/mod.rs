// server/src/services/mod.rs

pub mod mobile_money;

pub use mobile_money::HttpMobileMoneyGateway;
