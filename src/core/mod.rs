pub mod time;

pub use time::Time;

use std::sync::{Mutex, MutexGuard, PoisonError};

// A poisoned lock still holds usable state; recover it so teardown paths
// cannot panic.
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
