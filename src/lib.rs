pub mod api;
pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod storage;

pub use domain::*;
pub use error::{LedgerError, LedgerResult};
pub use storage::{LedgerStore, MemoryStore};
