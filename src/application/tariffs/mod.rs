pub mod ingest;
pub mod service;

pub use ingest::{BatchInput, BatchPayload};
pub use service::{CostQuote, TariffService};
