//! Result types for handler operations.

use crate::error::ResponseError;
use crate::value::Value;
use crate::varbind::VarBind;

/// Outcome of one Set phase for one VarBind.
///
/// Variants correspond to the SNMP error-status codes the master relays in
/// its own response; `Ok` is the only success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetResult {
    Ok,
    /// The request's context may not modify this object.
    NoAccess,
    /// The object cannot be modified by anyone.
    NotWritable,
    WrongType,
    WrongLength,
    WrongEncoding,
    /// Well-typed value with an unacceptable meaning.
    WrongValue,
    /// Row creation is not supported.
    NoCreation,
    /// Conflicts with another VarBind in the same Set.
    InconsistentValue,
    ResourceUnavailable,
    CommitFailed,
    UndoFailed,
    InconsistentName,
    /// Anything else went wrong inside the handler.
    GenErr,
}

impl SetResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, SetResult::Ok)
    }

    /// The `res.error` code reported for this outcome.
    pub fn to_response_error(&self) -> ResponseError {
        match self {
            SetResult::Ok => ResponseError::NoError,
            SetResult::NoAccess => ResponseError::NoAccess,
            SetResult::NotWritable => ResponseError::NotWritable,
            SetResult::WrongType => ResponseError::WrongType,
            SetResult::WrongLength => ResponseError::WrongLength,
            SetResult::WrongEncoding => ResponseError::WrongEncoding,
            SetResult::WrongValue => ResponseError::WrongValue,
            SetResult::NoCreation => ResponseError::NoCreation,
            SetResult::InconsistentValue => ResponseError::InconsistentValue,
            SetResult::ResourceUnavailable => ResponseError::ResourceUnavailable,
            SetResult::CommitFailed => ResponseError::CommitFailed,
            SetResult::UndoFailed => ResponseError::UndoFailed,
            SetResult::InconsistentName => ResponseError::InconsistentName,
            SetResult::GenErr => ResponseError::GenErr,
        }
    }
}

/// Result of reading one OID.
///
/// `NoSuchObject` means the object type is not implemented at all;
/// `NoSuchInstance` means the type exists but this instance does not (a
/// missing table row, or a scalar asked for with a trailing index).
/// `Failed` reports a handler-internal error: the dispatcher logs it and
/// answers `noSuchObject` for that VarBind only.
#[derive(Debug, Clone, PartialEq)]
pub enum GetResult {
    Value(Value),
    NoSuchObject,
    NoSuchInstance,
    Failed(Box<str>),
}

impl GetResult {
    /// `Some(value)` becomes `Value`, `None` becomes `NoSuchObject`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use async_agentx::handler::GetResult;
    /// use async_agentx::Value;
    ///
    /// assert!(matches!(GetResult::from_option(Some(Value::Integer(1))), GetResult::Value(_)));
    /// assert!(matches!(GetResult::from_option(None), GetResult::NoSuchObject));
    /// ```
    pub fn from_option(value: Option<Value>) -> Self {
        value.map_or(GetResult::NoSuchObject, GetResult::Value)
    }

    pub fn is_value(&self) -> bool {
        matches!(self, GetResult::Value(_))
    }

    /// The value, if there is one.
    pub fn into_value(self) -> Option<Value> {
        match self {
            GetResult::Value(v) => Some(v),
            _ => None,
        }
    }

    /// The VarBind value to put on the wire for this result.
    pub(crate) fn into_wire_value(self) -> Value {
        match self {
            GetResult::Value(v) => v,
            GetResult::NoSuchInstance => Value::NoSuchInstance,
            GetResult::NoSuchObject | GetResult::Failed(_) => Value::NoSuchObject,
        }
    }
}

impl From<Value> for GetResult {
    fn from(value: Value) -> Self {
        GetResult::Value(value)
    }
}

impl From<Option<Value>> for GetResult {
    fn from(value: Option<Value>) -> Self {
        GetResult::from_option(value)
    }
}

/// Result of a successor lookup inside one handler's subtree.
///
/// The returned VarBind's OID must be strictly greater than the OID the
/// handler was asked about.
#[derive(Debug, Clone, PartialEq)]
pub enum GetNextResult {
    Value(VarBind),
    /// Nothing left in this handler after the given OID.
    EndOfMibView,
    Failed(Box<str>),
}

impl GetNextResult {
    pub fn from_option(value: Option<VarBind>) -> Self {
        value.map_or(GetNextResult::EndOfMibView, GetNextResult::Value)
    }

    pub fn is_value(&self) -> bool {
        matches!(self, GetNextResult::Value(_))
    }

    pub fn is_end_of_mib_view(&self) -> bool {
        matches!(self, GetNextResult::EndOfMibView)
    }

    /// The VarBind, if there is one. Failures collapse to `None`.
    pub fn into_option(self) -> Option<VarBind> {
        match self {
            GetNextResult::Value(vb) => Some(vb),
            _ => None,
        }
    }
}

impl From<VarBind> for GetNextResult {
    fn from(vb: VarBind) -> Self {
        GetNextResult::Value(vb)
    }
}

impl From<Option<VarBind>> for GetNextResult {
    fn from(vb: Option<VarBind>) -> Self {
        GetNextResult::from_option(vb)
    }
}
