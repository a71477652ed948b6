pub mod aggregator;
pub mod diversification;
