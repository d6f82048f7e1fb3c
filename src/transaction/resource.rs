//! Resource contracts: components, transactional resources and context keys.

use std::borrow::Cow;
use std::fmt;

use crate::transaction::handle::{BoxError, Transaction};

/// A resource able to start a transaction.
pub trait Transactional: Send + Sync {
    /// Begin a new transaction on this resource.
    ///
    /// Called at most once per run for each distinct [`ContextKey`].
    fn begin(&self) -> Result<Box<dyn Transaction>, BoxError>;
}

/// Lets a resource declare the key of the transaction it shares.
///
/// Resources returning equal keys are coalesced into a single transaction:
/// only the first one in a unit of work is begun, and all of them see the
/// same handle.
pub trait ContextProvider: Send + Sync {
    fn context_key(&self) -> ContextKey;
}

/// Any value handed to a unit of work.
///
/// A component advertises what it can do through the capability accessors.
/// Both default to `None`, so a plain type can implement `Component` with an
/// empty impl block and will be rejected when a unit of work is built from
/// it. The [`component!`](crate::component) macro writes these impls.
pub trait Component: Send + Sync + 'static {
    fn as_transactional(&self) -> Option<&dyn Transactional> {
        None
    }

    fn as_context_provider(&self) -> Option<&dyn ContextProvider> {
        None
    }

    /// Name of the concrete type, for error messages.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Identity used to decide which resources share one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContextKey {
    /// The resource itself, by the address of its allocation.
    Resource(usize),
    /// A key declared through [`ContextProvider`].
    Shared(Cow<'static, str>),
}

impl ContextKey {
    /// A shared key with the given name.
    pub fn shared(name: impl Into<Cow<'static, str>>) -> Self {
        ContextKey::Shared(name.into())
    }

    /// The coordination key of a component.
    ///
    /// The provider's key when the component implements [`ContextProvider`],
    /// otherwise the component's own identity.
    pub fn of(component: &dyn Component) -> Self {
        match component.as_context_provider() {
            Some(provider) => provider.context_key(),
            None => Self::identity(component),
        }
    }

    /// The identity key of a component, ignoring any provider.
    pub fn identity(component: &dyn Component) -> Self {
        let addr = component as *const dyn Component as *const () as usize;
        ContextKey::Resource(addr)
    }

    /// Check if this key was declared by a provider.
    pub fn is_shared(&self) -> bool {
        matches!(self, ContextKey::Shared(_))
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextKey::Resource(addr) => write!(f, "resource@{:#x}", addr),
            ContextKey::Shared(name) => write!(f, "shared:{}", name),
        }
    }
}
