//! Port traits at the boundary of the domain.

pub mod config_port;
pub mod market_data_port;
pub mod result_port;
pub mod store_port;
