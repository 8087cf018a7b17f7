//! Raw SQL operations, grouped by concern. All functions take a
//! `&Connection` and are composed under transactions by the engine.

pub mod cleanup_ops;
pub mod lifeline_ops;
pub mod metadata_ops;
pub mod scan_ops;
