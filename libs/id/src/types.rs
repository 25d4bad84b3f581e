//! Typed ID definitions for scheduler records.

use crate::define_id;

// =============================================================================
// Records
// =============================================================================

define_id!(OrderId, "ord");
define_id!(WorkerId, "wrk");
define_id!(DrinkId, "drk");

// =============================================================================
// Requests
// =============================================================================

define_id!(RequestId, "req");

// =============================================================================
// Tests
// =============================================================================
