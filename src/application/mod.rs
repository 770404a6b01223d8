// Application layer - use cases and orchestration
//
// - error: error kinds callers branch on (validation, not found, conflict, ...)
// - tx: transaction manager running units of work atomically
// - service: the transfer protocol and pass-through reads

pub mod error;
pub mod service;
pub mod tx;

pub use error::*;
pub use service::*;
pub use tx::*;
