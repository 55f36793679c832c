//! Async AgentX (RFC 2741) subagent library.
//!
//! An AgentX subagent extends a master SNMP agent's MIB over a local
//! stream socket: it opens a session, registers the subtrees it serves,
//! and answers the Get, GetNext, GetBulk and two-phase Set requests the
//! master forwards to it.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use async_agentx::handler::ScalarCell;
//! use async_agentx::pdu::CloseReason;
//! use async_agentx::session::SessionBuilder;
//! use async_agentx::oid;
//!
//! #[tokio::main]
//! async fn main() -> async_agentx::Result<()> {
//!     let session = SessionBuilder::new()
//!         .socket_path("/var/run/agentx/master")
//!         .description("example subagent")
//!         .connect()
//!         .await?;
//!
//!     let answer = Arc::new(ScalarCell::integer32(oid!(1, 3, 6, 1, 4, 1, 99999, 1, 0), 42));
//!     session.register_cell(answer).await?;
//!
//!     tokio::signal::ctrl_c().await.ok();
//!     session.close(CloseReason::Shutdown).await
//! }
//! ```
//!
//! # Modules
//!
//! - [`session`]: connection lifecycle, registration and master-bound requests
//! - [`handler`]: the traits a subagent implements to serve its MIB
//! - [`registry`]: which registration owns which OID
//! - [`agent`]: the request dispatcher and Set transactions
//! - [`pdu`] and [`codec`]: the wire format
//! - [`transport`]: socket connection, framing and the egress writer

#![allow(clippy::result_large_err)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod agent;
pub mod codec;
pub mod error;
pub mod handler;
pub mod oid;
pub mod pdu;
pub mod prelude;
pub mod registry;
pub mod session;
pub mod transport;
pub mod value;
pub mod varbind;
pub mod version;

#[cfg(feature = "cli")]
#[cfg_attr(docsrs, doc(cfg(feature = "cli")))]
pub mod cli;

pub use error::{Error, Result};
pub use oid::Oid;
pub use session::{Session, SessionBuilder, SessionState};
pub use value::Value;
pub use varbind::{SearchRange, VarBind};
pub use version::Version;
