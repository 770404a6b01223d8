pub mod application;
pub mod config;
pub mod domain;
pub mod logging;
pub mod storage;

pub use application::{AppError, ErrorKind, TransferResult, TransferService};
pub use config::{DatabaseConfig, LogConfig};
pub use domain::*;
pub use storage::{LedgerStore, Repository, TxRepository};
