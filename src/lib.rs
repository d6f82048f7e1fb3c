//! uow - run operations across independently transactional resources as one.
//!
//! Each resource (a SQL repository, a cache client, a document store) keeps
//! managing its own transaction. A [`UnitOfWork`] begins one transaction per
//! resource, hands them to your closure, and then commits all of them or
//! rolls all of them back.
//!
//! Commits happen one after another. If a later commit fails, the earlier
//! ones are rolled back as well, which only helps if the resource can still
//! undo them; this is not two-phase commit.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use uow::transaction::{BoxError, NopTransaction, Transaction, Transactional};
//! use uow::{component, UnitOfWork};
//!
//! struct Cache;
//!
//! impl Transactional for Cache {
//!     fn begin(&self) -> Result<Box<dyn Transaction>, BoxError> {
//!         Ok(Box::new(NopTransaction))
//!     }
//! }
//!
//! component!(Cache: Transactional);
//!
//! let cache = Arc::new(Cache);
//! let unit = UnitOfWork::new([cache.clone() as Arc<dyn uow::Component>]).unwrap();
//!
//! let transactional = unit
//!     .run(|ctx| Ok::<_, BoxError>(ctx.context(&*cache).is_transactional()))
//!     .unwrap();
//! assert!(transactional);
//! ```

pub mod transaction;
pub mod unit;

pub use transaction::{
    BoxError, Component, ContextKey, ContextProvider, NopTransaction, Transaction, Transactional,
};
pub use unit::{
    RollbackFailure, RunOutcome, RunReport, RunState, TxContext, UnitContext, UnitOfWork,
    UnitOfWorkConfig, UnitOfWorkError, UnitOfWorkResult,
};

/// Implement [`Component`] for a type, declaring its capabilities.
///
/// ```
/// # use uow::transaction::{BoxError, ContextKey, ContextProvider, NopTransaction, Transaction, Transactional};
/// struct Plain;
/// uow::component!(Plain);
///
/// struct Session;
/// impl Transactional for Session {
///     fn begin(&self) -> Result<Box<dyn Transaction>, BoxError> {
///         Ok(Box::new(NopTransaction))
///     }
/// }
/// impl ContextProvider for Session {
///     fn context_key(&self) -> ContextKey {
///         ContextKey::shared("primary")
///     }
/// }
/// uow::component!(Session: Transactional, ContextProvider);
/// ```
#[macro_export]
macro_rules! component {
    ($ty:ty: Transactional, ContextProvider) => {
        impl $crate::transaction::Component for $ty {
            fn as_transactional(&self) -> Option<&dyn $crate::transaction::Transactional> {
                Some(self)
            }

            fn as_context_provider(&self) -> Option<&dyn $crate::transaction::ContextProvider> {
                Some(self)
            }
        }
    };
    ($ty:ty: Transactional) => {
        impl $crate::transaction::Component for $ty {
            fn as_transactional(&self) -> Option<&dyn $crate::transaction::Transactional> {
                Some(self)
            }
        }
    };
    ($ty:ty) => {
        impl $crate::transaction::Component for $ty {}
    };
}
