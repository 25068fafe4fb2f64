pub mod device;
pub mod message;
pub mod state;
