use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if another thread panicked while holding it.
///
/// None of the state guarded in this crate can be left half-updated by a panic: every mutation
/// is a single assignment or a `HashMap`/`Vec` operation.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
