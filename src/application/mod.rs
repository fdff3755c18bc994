// Application layer: the ledger core and its error taxonomy.
// HTTP handlers in `crate::api` are the only caller in the binary.

pub mod error;
pub mod service;

pub use error::*;
pub use service::*;
