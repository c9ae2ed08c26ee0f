pub mod aggregator;
pub mod fabric;
pub mod mac;
