pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod hub;
pub mod model;
