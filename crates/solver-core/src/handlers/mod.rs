//! Per-order processing and the destination chain handler cache.

pub mod chains;
pub mod order;

pub use chains::ChainHandlers;
pub use order::OrderOrchestrator;
