use crate::{
    db::{
        convert::ConvertError,
        query::{BindError, QueryDerivationError},
        repository::DispatchError,
        template::TemplateError,
        workflow::HookError,
    },
    model::SchemaError,
};
use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable internal classification.
/// Every domain error converts into this type at the repository boundary;
/// the typed source error stays reachable through `detail`.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Optional structured error detail.
    /// The variant (if present) must correspond to `origin`.
    pub detail: Option<ErrorDetail>,
}

impl InternalError {
    /// Construct an InternalError without structured detail.
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            detail: None,
        }
    }

    /// Construct a dispatch-origin invariant violation.
    pub(crate) fn dispatch_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Dispatch,
            message.into(),
        )
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }

    // ------------------------------------------------------------------
    // Typed detail access
    // ------------------------------------------------------------------

    #[must_use]
    pub const fn schema_error(&self) -> Option<&SchemaError> {
        match &self.detail {
            Some(ErrorDetail::Schema(err)) => Some(err),
            _ => None,
        }
    }

    #[must_use]
    pub const fn derivation_error(&self) -> Option<&QueryDerivationError> {
        match &self.detail {
            Some(ErrorDetail::Derivation(err)) => Some(err),
            _ => None,
        }
    }

    #[must_use]
    pub const fn bind_error(&self) -> Option<&BindError> {
        match &self.detail {
            Some(ErrorDetail::Bind(err)) => Some(err),
            _ => None,
        }
    }

    #[must_use]
    pub const fn dispatch_error(&self) -> Option<&DispatchError> {
        match &self.detail {
            Some(ErrorDetail::Dispatch(err)) => Some(err),
            _ => None,
        }
    }

    #[must_use]
    pub const fn template_error(&self) -> Option<&TemplateError> {
        match &self.detail {
            Some(ErrorDetail::Template(err)) => Some(err),
            _ => None,
        }
    }

    fn with_detail(
        class: ErrorClass,
        origin: ErrorOrigin,
        message: String,
        detail: ErrorDetail,
    ) -> Self {
        Self {
            class,
            origin,
            message,
            detail: Some(detail),
        }
    }
}

///
/// ErrorDetail
///
/// Structured, origin-specific error detail carried by [`InternalError`].
///

#[derive(Debug, ThisError)]
pub enum ErrorDetail {
    #[error("{0}")]
    Schema(SchemaError),

    #[error("{0}")]
    Derivation(QueryDerivationError),

    #[error("{0}")]
    Bind(BindError),

    #[error("{0}")]
    Dispatch(DispatchError),

    #[error("{0}")]
    Convert(ConvertError),

    #[error("{0}")]
    Hook(HookError),

    #[error("{0}")]
    Template(TemplateError),
}

impl From<SchemaError> for InternalError {
    fn from(err: SchemaError) -> Self {
        Self::with_detail(
            err.class(),
            ErrorOrigin::Schema,
            err.to_string(),
            ErrorDetail::Schema(err),
        )
    }
}

impl From<QueryDerivationError> for InternalError {
    fn from(err: QueryDerivationError) -> Self {
        Self::with_detail(
            err.class(),
            ErrorOrigin::Query,
            err.to_string(),
            ErrorDetail::Derivation(err),
        )
    }
}

impl From<BindError> for InternalError {
    fn from(err: BindError) -> Self {
        Self::with_detail(
            err.class(),
            ErrorOrigin::Bind,
            err.to_string(),
            ErrorDetail::Bind(err),
        )
    }
}

impl From<DispatchError> for InternalError {
    fn from(err: DispatchError) -> Self {
        Self::with_detail(
            err.class(),
            ErrorOrigin::Dispatch,
            err.to_string(),
            ErrorDetail::Dispatch(err),
        )
    }
}

impl From<ConvertError> for InternalError {
    fn from(err: ConvertError) -> Self {
        Self::with_detail(
            err.class(),
            ErrorOrigin::Convert,
            err.to_string(),
            ErrorDetail::Convert(err),
        )
    }
}

impl From<HookError> for InternalError {
    fn from(err: HookError) -> Self {
        Self::with_detail(
            ErrorClass::Aborted,
            ErrorOrigin::Workflow,
            err.to_string(),
            ErrorDetail::Hook(err),
        )
    }
}

impl From<TemplateError> for InternalError {
    fn from(err: TemplateError) -> Self {
        Self::with_detail(
            err.class(),
            ErrorOrigin::Template,
            err.to_string(),
            ErrorDetail::Template(err),
        )
    }
}

///
/// ErrorClass
/// Internal error taxonomy for runtime classification.
/// Not a stable API; may change without notice.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Aborted,
    Internal,
    InvariantViolation,
    Unsupported,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Aborted => "aborted",
            Self::Internal => "internal",
            Self::InvariantViolation => "invariant_violation",
            Self::Unsupported => "unsupported",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Internal origin taxonomy for runtime classification.
/// Not a stable API; may change without notice.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Bind,
    Convert,
    Dispatch,
    Query,
    Schema,
    Template,
    Workflow,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Bind => "bind",
            Self::Convert => "convert",
            Self::Dispatch => "dispatch",
            Self::Query => "query",
            Self::Schema => "schema",
            Self::Template => "template",
            Self::Workflow => "workflow",
        };
        write!(f, "{label}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_errors_keep_typed_detail() {
        let err: InternalError = SchemaError::MultipleIds {
            entity: "Person".to_string(),
            fields: vec!["id".to_string(), "code".to_string()],
        }
        .into();

        assert_eq!(err.origin, ErrorOrigin::Schema);
        assert_eq!(err.class, ErrorClass::InvariantViolation);
        assert!(matches!(
            err.schema_error(),
            Some(SchemaError::MultipleIds { .. })
        ));
        assert!(err.dispatch_error().is_none());
    }

    #[test]
    fn display_with_class_prefixes_origin_and_class() {
        let err: InternalError = DispatchError::UnsupportedMethod {
            method: "frobnicate".to_string(),
        }
        .into();

        assert_eq!(
            err.display_with_class(),
            "dispatch:unsupported: unsupported repository method 'frobnicate'"
        );
    }
}
