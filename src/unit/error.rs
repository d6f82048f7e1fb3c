//! Unit of work error types.

use std::any::Any;
use std::error::Error as StdError;

use thiserror::Error;

use crate::transaction::{BoxError, ContextKey};

/// Result type for unit of work operations.
pub type UnitOfWorkResult<T> = Result<T, UnitOfWorkError>;

/// Errors returned when building or running a unit of work.
///
/// Failures coming from a resource or from the unit-of-work closure render
/// exactly as the underlying error, so callers see the original message.
#[derive(Debug, Error)]
pub enum UnitOfWorkError {
    /// A component passed to the constructor cannot begin transactions.
    #[error("cannot create unit of work: component {type_name} does not implement Transactional")]
    NotTransactional {
        /// Position of the component in the constructor's input.
        index: usize,
        type_name: &'static str,
    },

    /// A resource failed to begin its transaction.
    #[error("{source}")]
    Begin {
        key: ContextKey,
        #[source]
        source: BoxError,
    },

    /// The unit-of-work closure returned an error, or panicked with one.
    #[error("{0}")]
    Work(#[source] BoxError),

    /// The unit-of-work closure panicked with a non-error payload.
    #[error("recovered: {message}")]
    Panicked { message: String },

    /// A transaction failed to commit.
    #[error("{source}")]
    Commit {
        key: ContextKey,
        #[source]
        source: BoxError,
    },
}

impl UnitOfWorkError {
    /// Convert a panic payload into an error.
    ///
    /// A [`UnitOfWorkError`] payload passes through unchanged and a
    /// [`BoxError`] payload becomes [`UnitOfWorkError::Work`]. String payloads
    /// become [`UnitOfWorkError::Panicked`] carrying their text.
    ///
    /// A payload can only be recognized by its exact type, so a concrete error
    /// such as `std::io::Error` passed to `panic_any` is not seen as an error
    /// and renders as `recovered: Box<dyn Any>`. Box it into a [`BoxError`]
    /// before panicking to have it passed through.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let payload = match payload.downcast::<UnitOfWorkError>() {
            Ok(err) => return *err,
            Err(other) => other,
        };
        let payload = match payload.downcast::<BoxError>() {
            Ok(err) => return UnitOfWorkError::Work(*err),
            Err(other) => other,
        };
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Box<dyn Any>".to_string()
        };
        UnitOfWorkError::Panicked { message }
    }

    /// Check if this error came from building the unit of work rather than
    /// running it.
    pub fn is_construction(&self) -> bool {
        matches!(self, UnitOfWorkError::NotTransactional { .. })
    }

    /// Check if the unit-of-work closure itself failed or panicked.
    pub fn is_work_failure(&self) -> bool {
        matches!(
            self,
            UnitOfWorkError::Work(_) | UnitOfWorkError::Panicked { .. }
        )
    }

    /// Key of the resource that failed, for begin and commit failures.
    pub fn key(&self) -> Option<&ContextKey> {
        match self {
            UnitOfWorkError::Begin { key, .. } | UnitOfWorkError::Commit { key, .. } => Some(key),
            _ => None,
        }
    }

    /// The original error reported by a resource or the closure.
    pub fn inner(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            UnitOfWorkError::Begin { source, .. }
            | UnitOfWorkError::Commit { source, .. }
            | UnitOfWorkError::Work(source) => Some(source.as_ref()),
            _ => None,
        }
    }

    /// Borrow the original error as a concrete type.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.inner().and_then(|err| err.downcast_ref::<E>())
    }

    /// Take the original error out of this one.
    pub fn into_inner(self) -> Option<BoxError> {
        match self {
            UnitOfWorkError::Begin { source, .. }
            | UnitOfWorkError::Commit { source, .. }
            | UnitOfWorkError::Work(source) => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug, PartialEq)]
    struct Boom;

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "boom")
        }
    }

    impl StdError for Boom {}

    #[test]
    fn test_display_is_transparent() {
        let begin = UnitOfWorkError::Begin {
            key: ContextKey::shared("db"),
            source: "begin err".into(),
        };
        assert_eq!(begin.to_string(), "begin err");

        let commit = UnitOfWorkError::Commit {
            key: ContextKey::shared("db"),
            source: Box::new(Boom),
        };
        assert_eq!(commit.to_string(), "boom");
        assert!(commit.source().is_some());

        let work = UnitOfWorkError::Work("boom a".into());
        assert_eq!(work.to_string(), "boom a");
    }

    #[test]
    fn test_not_transactional_message() {
        let err = UnitOfWorkError::NotTransactional {
            index: 0,
            type_name: "app::Cache",
        };
        assert_eq!(
            err.to_string(),
            "cannot create unit of work: component app::Cache does not implement Transactional"
        );
        assert!(err.is_construction());
        assert!(err.inner().is_none());
    }

    #[test]
    fn test_from_panic_payloads() {
        let err = UnitOfWorkError::from_panic(Box::new("boom"));
        assert_eq!(err.to_string(), "recovered: boom");

        let err = UnitOfWorkError::from_panic(Box::new(String::from("boom")));
        assert_eq!(err.to_string(), "recovered: boom");
        assert!(err.is_work_failure());

        let err = UnitOfWorkError::from_panic(Box::new(42_u32));
        assert_eq!(err.to_string(), "recovered: Box<dyn Any>");

        let boxed: BoxError = Box::new(Boom);
        let err = UnitOfWorkError::from_panic(Box::new(boxed));
        assert_eq!(err.to_string(), "boom");
        assert_eq!(err.downcast_ref::<Boom>(), Some(&Boom));

        let err = UnitOfWorkError::from_panic(Box::new(Boom));
        assert_eq!(err.to_string(), "recovered: Box<dyn Any>");
        assert!(err.downcast_ref::<Boom>().is_none());

        let inner = UnitOfWorkError::Work("boom b".into());
        let err = UnitOfWorkError::from_panic(Box::new(inner));
        assert_eq!(err.to_string(), "boom b");
    }

    #[test]
    fn test_key_and_into_inner() {
        let err = UnitOfWorkError::Commit {
            key: ContextKey::shared("cache"),
            source: Box::new(Boom),
        };
        assert_eq!(err.key(), Some(&ContextKey::shared("cache")));

        let inner = err.into_inner().unwrap();
        assert!(inner.downcast_ref::<Boom>().is_some());

        let panicked = UnitOfWorkError::Panicked {
            message: "x".to_string(),
        };
        assert!(panicked.key().is_none());
        assert!(panicked.into_inner().is_none());
    }
}
