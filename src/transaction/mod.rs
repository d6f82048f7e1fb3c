//! Contracts implemented by resources taking part in a unit of work.
//!
//! A resource is any [`Component`] that exposes the [`Transactional`]
//! capability. Beginning it yields a [`Transaction`] handle, which the unit
//! of work later commits or rolls back.
//!
//! ```text
//!   Component ──as_transactional()──▶ Transactional ──begin()──▶ Transaction
//!       │                                                      commit()
//!       └──as_context_provider()──▶ ContextProvider            rollback()
//!                                     context_key()
//! ```
//!
//! Resources that share an underlying connection (two repositories over the
//! same database session, say) implement [`ContextProvider`] and return the
//! same [`ContextKey`]; they are then begun once and share one handle.
//!
//! # Usage
//!
//! ```
//! use uow::transaction::{BoxError, Component, NopTransaction, Transaction, Transactional};
//!
//! struct AuditLog;
//!
//! impl Transactional for AuditLog {
//!     fn begin(&self) -> Result<Box<dyn Transaction>, BoxError> {
//!         Ok(Box::new(NopTransaction))
//!     }
//! }
//!
//! impl Component for AuditLog {
//!     fn as_transactional(&self) -> Option<&dyn Transactional> {
//!         Some(self)
//!     }
//! }
//! ```

mod handle;
mod resource;

pub use handle::{AsAny, BoxError, NopTransaction, Transaction};
pub use resource::{Component, ContextKey, ContextProvider, Transactional};
