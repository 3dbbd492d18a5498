pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod http;
pub mod io;
pub mod observability;
pub mod storage;

pub use application::{AppError, ErrorKind, LedgerService, ServiceConfig};
pub use domain::*;
pub use storage::Repository;
