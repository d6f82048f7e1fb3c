//! Unit of work - runs a closure over several transactional resources as one.
//!
//! A run has three phases:
//! - begin one transaction per distinct coordination key, in resource order
//! - execute the caller's closure with a lookup for those transactions
//! - commit every transaction in begin order, or roll every one back
//!
//! Any failure (a begin error, a closure error or panic, a commit error)
//! rolls back every transaction begun so far, in begin order, and the first
//! failure is what the run returns. Commits are sequential, not atomic: when
//! a commit fails, transactions that already committed are rolled back too,
//! but whether that undoes anything is up to the resource.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, info_span, trace, warn};
use ulid::Ulid;

use crate::transaction::{BoxError, Component, ContextKey};
use crate::unit::config::UnitOfWorkConfig;
use crate::unit::context::{ContextMap, UnitContext};
use crate::unit::error::{UnitOfWorkError, UnitOfWorkResult};
use crate::unit::report::{RollbackFailure, RunOutcome, RunReport};
use crate::unit::state::RunState;

/// Why a run is being aborted.
enum Abort {
    Error(UnitOfWorkError),
    /// A `begin` panic to re-raise once cleanup is done.
    Unwind(Box<dyn Any + Send>),
}

impl From<UnitOfWorkError> for Abort {
    fn from(err: UnitOfWorkError) -> Self {
        Abort::Error(err)
    }
}

/// Coordinates transactions across a fixed set of resources.
///
/// Thread-safe: runs keep their transactions in per-run state, so a single
/// unit of work can be shared and run from several threads, provided the
/// resources tolerate concurrent begins.
pub struct UnitOfWork {
    config: UnitOfWorkConfig,
    components: Vec<Arc<dyn Component>>,
}

impl UnitOfWork {
    /// Create a unit of work over the given components.
    ///
    /// Fails if any component does not implement
    /// [`Transactional`](crate::transaction::Transactional).
    pub fn new<I>(components: I) -> UnitOfWorkResult<Self>
    where
        I: IntoIterator<Item = Arc<dyn Component>>,
    {
        Self::with_config(UnitOfWorkConfig::default(), components)
    }

    /// Create a unit of work with a specific configuration.
    pub fn with_config<I>(config: UnitOfWorkConfig, components: I) -> UnitOfWorkResult<Self>
    where
        I: IntoIterator<Item = Arc<dyn Component>>,
    {
        let components: Vec<_> = components.into_iter().collect();

        for (index, component) in components.iter().enumerate() {
            if component.as_transactional().is_none() {
                return Err(UnitOfWorkError::NotTransactional {
                    index,
                    type_name: component.type_name(),
                });
            }
        }

        Ok(Self { config, components })
    }

    /// Get the configuration.
    pub fn config(&self) -> &UnitOfWorkConfig {
        &self.config
    }

    /// Number of resources, before deduplication by key.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Coordination key of every resource, in order.
    pub fn keys(&self) -> Vec<ContextKey> {
        self.components
            .iter()
            .map(|c| ContextKey::of(c.as_ref()))
            .collect()
    }

    /// Check if a component is one of this unit's resources.
    pub fn contains(&self, component: &dyn Component) -> bool {
        let identity = ContextKey::identity(component);
        self.components
            .iter()
            .any(|c| ContextKey::identity(c.as_ref()) == identity)
    }

    /// Run `f` as a single unit of work.
    ///
    /// If `f` returns `Ok`, every transaction is committed. If it returns
    /// `Err` or panics, every transaction is rolled back.
    pub fn run<T, E, F>(&self, f: F) -> UnitOfWorkResult<T>
    where
        F: FnOnce(&UnitContext<'_>) -> Result<T, E>,
        E: Into<BoxError>,
    {
        self.run_with(&(), f)
    }

    /// Run `f` with a caller-supplied base context.
    ///
    /// `base` is reachable from every transaction context handed to `f`.
    pub fn run_with<C, T, E, F>(&self, base: &C, f: F) -> UnitOfWorkResult<T>
    where
        C: ?Sized,
        F: FnOnce(&UnitContext<'_, C>) -> Result<T, E>,
        E: Into<BoxError>,
    {
        self.run_reported_with(base, f).into_result()
    }

    /// Run `f` and return a report of the run alongside the result.
    pub fn run_reported<T, E, F>(&self, f: F) -> RunOutcome<T>
    where
        F: FnOnce(&UnitContext<'_>) -> Result<T, E>,
        E: Into<BoxError>,
    {
        self.run_reported_with(&(), f)
    }

    /// Run `f` with a base context and return a report of the run.
    ///
    /// # Panics
    ///
    /// Re-raises a panic from a resource's `begin` after rolling back, when
    /// `catch_begin_panics` is disabled.
    ///
    /// Panics raised by `commit` or `rollback` are not caught. A panicking
    /// `commit` unwinds straight out of the run: transactions still open at
    /// that point are dropped without a call to `rollback`, so resources must
    /// treat dropping an uncommitted handle as abandoning it.
    pub fn run_reported_with<C, T, E, F>(&self, base: &C, f: F) -> RunOutcome<T>
    where
        C: ?Sized,
        F: FnOnce(&UnitContext<'_, C>) -> Result<T, E>,
        E: Into<BoxError>,
    {
        let run_id = Ulid::new().to_string().to_lowercase();
        let span = info_span!("unit_of_work", name = %self.config.name, run_id = %run_id);
        let _enter = span.enter();

        let mut report = RunReport::new(run_id, self.config.name.clone());
        let mut map = ContextMap::with_capacity(self.components.len());

        match self.drive(base, f, &mut map, &mut report) {
            Ok(value) => {
                report.transition(RunState::Done);
                debug!(committed = report.committed.len(), "unit of work committed");
                RunOutcome {
                    result: Ok(value),
                    report,
                }
            }
            Err(abort) => {
                report.transition(RunState::RollingBack);
                self.rollback_all(&mut map, &mut report);
                report.transition(RunState::Failed);

                match abort {
                    Abort::Error(err) => {
                        debug!(
                            error = %err,
                            rolled_back = report.rolled_back.len(),
                            rollback_failures = report.rollback_failures.len(),
                            "unit of work rolled back"
                        );
                        RunOutcome {
                            result: Err(err),
                            report,
                        }
                    }
                    Abort::Unwind(payload) => {
                        debug!("resuming panic raised while beginning");
                        panic::resume_unwind(payload)
                    }
                }
            }
        }
    }

    /// Begin, execute and commit. Any error leaves the begun transactions in
    /// `map` for the caller to roll back.
    fn drive<C, T, E, F>(
        &self,
        base: &C,
        f: F,
        map: &mut ContextMap,
        report: &mut RunReport,
    ) -> Result<T, Abort>
    where
        C: ?Sized,
        F: FnOnce(&UnitContext<'_, C>) -> Result<T, E>,
        E: Into<BoxError>,
    {
        report.transition(RunState::Beginning);
        self.begin_all(map, report)?;

        report.transition(RunState::Executing);
        let executed = {
            let ctx = UnitContext::new(base, &self.components, &*map);
            panic::catch_unwind(AssertUnwindSafe(|| f(&ctx)))
        };
        let value = match executed {
            Ok(Ok(value)) => value,
            Ok(Err(err)) => return Err(UnitOfWorkError::Work(err.into()).into()),
            Err(payload) => return Err(UnitOfWorkError::from_panic(payload).into()),
        };

        report.transition(RunState::Committing);
        self.commit_all(map, report)?;
        Ok(value)
    }

    fn begin_all(&self, map: &mut ContextMap, report: &mut RunReport) -> Result<(), Abort> {
        for component in &self.components {
            let key = ContextKey::of(component.as_ref());
            if map.contains(&key) {
                self.log_handle("sharing transaction", &key);
                continue;
            }
            // Checked in `with_config`.
            let Some(resource) = component.as_transactional() else {
                continue;
            };

            let handle = match panic::catch_unwind(AssertUnwindSafe(|| resource.begin())) {
                Ok(Ok(handle)) => handle,
                Ok(Err(source)) => return Err(UnitOfWorkError::Begin { key, source }.into()),
                Err(payload) if self.config.catch_begin_panics => {
                    return Err(UnitOfWorkError::from_panic(payload).into())
                }
                Err(payload) => return Err(Abort::Unwind(payload)),
            };

            self.log_handle("began", &key);
            report.begun.push(key.clone());
            map.insert(key, handle);
        }
        Ok(())
    }

    /// Commit in begin order, stopping at the first failure.
    fn commit_all(&self, map: &mut ContextMap, report: &mut RunReport) -> Result<(), Abort> {
        for tx in map.active_mut() {
            let committed = tx.handle_mut().commit();
            match committed {
                Ok(()) => {
                    self.log_handle("committed", &tx.key);
                    report.committed.push(tx.key.clone());
                }
                Err(source) => {
                    return Err(UnitOfWorkError::Commit {
                        key: tx.key.clone(),
                        source,
                    }
                    .into())
                }
            }
        }
        Ok(())
    }

    /// Roll back every begun transaction in begin order. Failures are logged
    /// and recorded but never stop the loop.
    fn rollback_all(&self, map: &mut ContextMap, report: &mut RunReport) {
        for tx in map.active_mut() {
            let rolled_back = tx.handle_mut().rollback();
            report.rolled_back.push(tx.key.clone());
            match rolled_back {
                Ok(()) => self.log_handle("rolled back", &tx.key),
                Err(error) => {
                    warn!(key = %tx.key, error = %error, "rollback failed");
                    report.rollback_failures.push(RollbackFailure {
                        key: tx.key.clone(),
                        error,
                    });
                }
            }
        }
    }

    fn log_handle(&self, action: &str, key: &ContextKey) {
        if self.config.verbose {
            debug!(key = %key, "{}", action);
        } else {
            trace!(key = %key, "{}", action);
        }
    }
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("name", &self.config.name)
            .field(
                "components",
                &self.components.iter().map(|c| c.type_name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
