//! Common test fixtures and constants.

use async_agentx::{Oid, oid};

// =============================================================================
// Example enterprise subtree (1.3.6.1.4.1.99999.*)
// =============================================================================

pub fn enterprise() -> Oid {
    oid!(1, 3, 6, 1, 4, 1, 99999)
}

/// Integer scalar at 1.3.6.1.4.1.99999.1
pub fn answer_oid() -> Oid {
    oid!(1, 3, 6, 1, 4, 1, 99999, 1)
}

/// Unregistered sibling of [`answer_oid`].
pub fn unregistered_oid() -> Oid {
    oid!(1, 3, 6, 1, 4, 1, 99999, 2)
}

/// Writable display string at 1.3.6.1.4.1.99999.3.0
pub fn name_oid() -> Oid {
    oid!(1, 3, 6, 1, 4, 1, 99999, 3, 0)
}

/// Entry OID of the port table, columns 1..=2.
pub fn port_entry() -> Oid {
    oid!(1, 3, 6, 1, 4, 1, 99999, 7, 1)
}

/// One cell of the port table.
pub fn port_cell(column: u32, index: u32) -> Oid {
    port_entry().child(column).child(index)
}

// =============================================================================
// Session ids
// =============================================================================

/// Session id the fake master hands out.
pub const SESSION_ID: u32 = 0x1234;
