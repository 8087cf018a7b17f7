//! # hindsight-core
//!
//! Foundation crate for the hindsight mirror store.
//! Defines the versioned-record envelope, the shape capability trait,
//! attribute selectors, errors, and config. No I/O happens here —
//! persistence lives in `hindsight-storage`.

pub mod config;
pub mod errors;
pub mod record;
pub mod selector;

pub use config::StoreConfig;
pub use errors::{StoreError, StoreResult};
pub use record::{AccessMask, Containment, Envelope, OwnerId, RecordShape, END_OF_TIME};
pub use selector::{AttributeSelector, FieldKind, FieldSelector, LifelineFilter};
