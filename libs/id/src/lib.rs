//! # brew-id
//!
//! Typed identifiers for the brew order scheduler.
//!
//! Every record the scheduler stores (orders, workers, drinks) carries a
//! typed ID so that an order ID can never be passed where a worker ID is
//! expected.
//!
//! ## ID Format
//!
//! IDs render as `{prefix}_{ulid}`:
//! - `ord_01HV4Z2WQXKJNM8GPQY6VBKC3D`
//! - `wrk_01HV4Z3MXNKPQR9HSTZ7WCLD4E`
//! - `drk_01HV4Z4NYPLTRS0JTUA8XDME5F`
//!
//! Parsing is strict: the prefix must match the type and the suffix must be
//! a valid ULID.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;
