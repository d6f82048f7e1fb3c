//! Transaction handle contract and the no-op handle.

use std::any::Any;
use std::error::Error;

/// Boxed error returned by resources and unit-of-work closures.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Upcast to `Any` so a boxed handle can be downcast to its concrete type.
///
/// Implemented for every `'static` type; never implement it by hand.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// One resource's in-flight transaction.
///
/// The coordinator calls `commit` and `rollback` at most once each per run.
/// `rollback` must be safe to call when `commit` was never attempted, and
/// must tolerate being called after a successful `commit` (a later handle's
/// commit failed and the whole unit is being cleaned up).
pub trait Transaction: AsAny + Send {
    /// Make the transaction's changes durable.
    fn commit(&mut self) -> Result<(), BoxError>;

    /// Discard the transaction's changes.
    fn rollback(&mut self) -> Result<(), BoxError>;
}

impl dyn Transaction {
    /// Borrow the handle as its concrete type.
    pub fn downcast_ref<T: Transaction>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Mutably borrow the handle as its concrete type.
    pub fn downcast_mut<T: Transaction>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// A transaction that does nothing.
///
/// Lets resources without real transactional behavior take part in a unit
/// of work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NopTransaction;

impl Transaction for NopTransaction {
    fn commit(&mut self) -> Result<(), BoxError> {
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), BoxError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counting {
        commits: u32,
    }

    impl Transaction for Counting {
        fn commit(&mut self) -> Result<(), BoxError> {
            self.commits += 1;
            Ok(())
        }

        fn rollback(&mut self) -> Result<(), BoxError> {
            Ok(())
        }
    }

    #[test]
    fn test_nop_transaction() {
        let mut tx = NopTransaction;
        assert!(tx.commit().is_ok());
        assert!(tx.rollback().is_ok());
        // Rollback after commit is fine too.
        assert!(tx.rollback().is_ok());
    }

    #[test]
    fn test_downcast_boxed_handle() {
        let mut boxed: Box<dyn Transaction> = Box::new(Counting { commits: 0 });
        boxed.commit().unwrap();

        assert_eq!(boxed.downcast_ref::<Counting>().unwrap().commits, 1);
        assert!(boxed.downcast_ref::<NopTransaction>().is_none());

        boxed.downcast_mut::<Counting>().unwrap().commits = 5;
        assert_eq!(boxed.downcast_ref::<Counting>().unwrap().commits, 5);
    }
}
