/// Room event log abstractions.
pub mod event_store;
/// In-memory room event log.
pub mod memory;
/// Storage error types shared by log backends.
pub mod storage;
