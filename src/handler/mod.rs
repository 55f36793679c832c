//! Handler types and traits.
//!
//! A subagent serves its part of the MIB through handlers, one per
//! registration. There are three kinds:
//!
//! - [`ScalarHandler`] - a single object instance such as `sysDescr.0`.
//!   [`ScalarCell`] is a ready-made implementation holding a typed value.
//! - [`TableHandler`] - a conceptual table, walked lazily row by row.
//!   [`IndexedRows`] is a sorted row store to build one on.
//! - [`MibHandler`] - a free-form subtree with its own successor logic.
//!
//! The registry stores them as the tagged [`Handler`] enum, and each kind
//! declares which operations it accepts through [`Capabilities`].
//!
//! # Sets
//!
//! The master drives a Set as four separate PDUs: TestSet validates every
//! VarBind, CommitSet applies them, UndoSet reverts a commit the master
//! decided to roll back, and CleanupSet ends the transaction. Before each
//! commit the dispatcher reads the current value, so undo methods receive
//! the value to restore rather than having to remember it.
//!
//! # Example
//!
//! A writable scalar and a read-only one:
//!
//! ```rust
//! use std::sync::Arc;
//! use async_agentx::handler::{Capabilities, ScalarCell, ScalarHandler};
//! use async_agentx::oid;
//!
//! let name = Arc::new(
//!     ScalarCell::display_string(oid!(1, 3, 6, 1, 4, 1, 99999, 1, 0), "rack-4")
//!         .unwrap()
//!         .writable(),
//! );
//! let uptime = Arc::new(ScalarCell::timeticks(oid!(1, 3, 6, 1, 4, 1, 99999, 3, 0), 0));
//!
//! assert_eq!(name.capabilities(), Capabilities::READ_WRITE);
//! assert_eq!(uptime.capabilities(), Capabilities::READ_ONLY);
//! ```

mod context;
mod kind;
mod results;
mod rows;
mod scalar;
mod traits;

pub use context::RequestContext;
pub use kind::Handler;
pub use results::{GetNextResult, GetResult, SetResult};
pub use rows::IndexedRows;
pub use scalar::{MAX_STRING_SIZE, ScalarCell, ScalarKind};
pub use traits::{BoxFuture, Capabilities, MibHandler, ScalarHandler, TableHandler};
