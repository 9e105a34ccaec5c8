pub mod configuration;
pub mod error_handling;
pub mod log_store;
pub mod pruner;
pub mod web_interface;
