// Application layer - use cases and orchestration.
// Presentation layers (CLI, HTTP) talk to the bank only through LedgerService.

pub mod error;
mod locks;
pub mod service;

pub use error::*;
pub(crate) use locks::AccountLocks;
pub use service::*;
