//! Unit of work coordination.
//!
//! A [`UnitOfWork`] groups resources that each manage their own transaction
//! and runs a closure over them as one all-or-nothing unit.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        UnitOfWork                           │
//! │   (validates resources, drives begin / commit / rollback)   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ per run
//!        ┌─────────────────────┼─────────────────────┐
//!        │                     │                     │
//!        ▼                     ▼                     ▼
//!  ┌─────────────┐       ┌─────────────┐       ┌─────────────┐
//!  │ UnitContext │       │  RunState   │       │  RunReport  │
//!  │ (TxContext) │       │  (phases)   │       │ (diagnostic)│
//!  └─────────────┘       └─────────────┘       └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use uow::{UnitOfWork, BoxError};
//!
//! let unit = UnitOfWork::new([orders.clone() as _, ledger.clone() as _])?;
//!
//! unit.run(|ctx| {
//!     orders.insert(&ctx.context(&*orders), order)?;
//!     ledger.debit(&ctx.context(&*ledger), amount)?;
//!     Ok::<_, BoxError>(())
//! })?;
//! ```

mod config;
mod context;
mod error;
mod manager;
mod report;
mod state;

pub use config::UnitOfWorkConfig;
pub use context::{TxContext, UnitContext};
pub use error::{UnitOfWorkError, UnitOfWorkResult};
pub use manager::UnitOfWork;
pub use report::{RollbackFailure, RunOutcome, RunReport};
pub use state::RunState;
