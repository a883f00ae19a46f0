pub mod audit;
pub mod config;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod model;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod utils;

pub use error::{ErrorKind, LedgerError, Result};
pub use identity::{Identity, Scope};
pub use ledger::StockLevel;
pub use service::AssetService;
pub use store::Store;
