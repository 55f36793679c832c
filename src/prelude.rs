//! Prelude module for convenient imports.
//!
//! ```rust,no_run
//! use async_agentx::prelude::*;
//! ```
//!
//! This imports:
//! - Session types: [`Session`], [`SessionBuilder`], [`CloseReason`]
//! - Core types: [`Oid`], [`Value`], [`VarBind`]
//! - Handler traits and helpers: [`ScalarHandler`], [`TableHandler`],
//!   [`MibHandler`], [`ScalarCell`] and the result types
//! - Error handling: [`Error`], [`Result`]
//! - The [`oid!`] macro for compile-time OID construction

pub use crate::error::{Error, Result};
pub use crate::handler::{
    BoxFuture, Capabilities, GetNextResult, GetResult, IndexedRows, MibHandler, RequestContext,
    ScalarCell, ScalarHandler, SetResult, TableHandler,
};
pub use crate::oid::Oid;
pub use crate::pdu::CloseReason;
pub use crate::registry::Registration;
pub use crate::session::{Session, SessionBuilder};
pub use crate::value::Value;
pub use crate::varbind::VarBind;

#[doc(no_inline)]
pub use crate::oid;
