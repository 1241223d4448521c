use crate::foundation::core::ReprKind;

/// Convenience result type used across reprcache.
pub type ReprResult<T> = Result<T, ReprError>;

/// Top-level error taxonomy used by cache, registry, and backend APIs.
#[derive(thiserror::Error, Debug)]
pub enum ReprError {
    /// A converter or constructor cannot handle the requested shape or numeric format.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// No chain of registered converters reaches the requested kind.
    #[error("no conversion path from {from} to {to}")]
    NoConversionPath {
        /// Source kind the search started from.
        from: String,
        /// Requested destination kind.
        to: String,
    },

    /// A converter or converter factory was registered twice.
    #[error("duplicate registration: {0}")]
    DuplicateRegistration(String),

    /// The external resource backing a representation is gone.
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// A converter received or produced a representation of the wrong kind.
    #[error("kind mismatch: expected {expected}, found {found}")]
    KindMismatch {
        /// Kind the caller required.
        expected: String,
        /// Kind that was actually present.
        found: String,
    },

    /// Invalid use of the cache or registry API.
    #[error("validation error: {0}")]
    Validation(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReprError {
    /// Build a [`ReprError::UnsupportedFormat`] value.
    pub fn unsupported_format(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    /// Build a [`ReprError::NoConversionPath`] value for a `from -> to` request.
    pub fn no_conversion_path(from: ReprKind, to: ReprKind) -> Self {
        Self::NoConversionPath {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Build a [`ReprError::DuplicateRegistration`] value.
    pub fn duplicate_registration(msg: impl Into<String>) -> Self {
        Self::DuplicateRegistration(msg.into())
    }

    /// Build a [`ReprError::ResourceUnavailable`] value.
    pub fn resource_unavailable(msg: impl Into<String>) -> Self {
        Self::ResourceUnavailable(msg.into())
    }

    /// Build a [`ReprError::KindMismatch`] value.
    pub fn kind_mismatch(expected: ReprKind, found: ReprKind) -> Self {
        Self::KindMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Build a [`ReprError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
