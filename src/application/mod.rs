// Application layer - settlement rules on top of the store.

mod config;
pub mod error;
mod service;

pub use config::*;
pub use error::*;
pub use service::*;
