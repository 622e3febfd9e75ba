//! Construct-once singleton cell
//!
//! A handle starts empty and is filled at most once. The constructor runs
//! while the write lock is held, so concurrent initializers never build two
//! instances and readers wait for an in-flight construction to finish.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

/// Shared, serialized access to a constructed instance
pub type Instance<T> = Arc<Mutex<T>>;

pub struct Handle<T> {
    cell: RwLock<Option<Instance<T>>>,
}

impl<T> Handle<T> {
    pub fn new() -> Self {
        Self {
            cell: RwLock::new(None),
        }
    }

    /// Get the instance if it has been constructed
    pub fn get(&self) -> Option<Instance<T>> {
        self.cell.read().clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.read().is_some()
    }

    /// Construct the instance unless it already exists.
    ///
    /// Returns `true` when this call performed the construction. A failed
    /// constructor leaves the handle empty.
    pub fn get_or_try_init<E>(&self, init: impl FnOnce() -> Result<T, E>) -> Result<bool, E> {
        if self.cell.read().is_some() {
            return Ok(false);
        }

        let mut write_guard = self.cell.write();

        // Double-check after acquiring write lock
        if write_guard.is_some() {
            return Ok(false);
        }

        let instance = init()?;
        *write_guard = Some(Arc::new(Mutex::new(instance)));
        Ok(true)
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_init_once() {
        let handle: Handle<u32> = Handle::new();
        assert!(!handle.is_initialized());
        assert!(handle.get().is_none());

        let first = handle.get_or_try_init(|| Ok::<_, ()>(7)).unwrap();
        let second = handle.get_or_try_init(|| Ok::<_, ()>(9)).unwrap();
        assert!(first);
        assert!(!second);
        assert_eq!(*handle.get().unwrap().lock(), 7);
    }

    #[test]
    fn test_failed_init_leaves_handle_empty() {
        let handle: Handle<u32> = Handle::new();
        let result = handle.get_or_try_init(|| Err("checkpoint missing"));
        assert_eq!(result, Err("checkpoint missing"));
        assert!(!handle.is_initialized());

        assert!(handle.get_or_try_init(|| Ok::<_, &str>(1)).unwrap());
    }

    #[test]
    fn test_concurrent_init_constructs_once() {
        let handle: Handle<usize> = Handle::new();
        let constructed = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for i in 0..8 {
                let handle = &handle;
                let constructed = &constructed;
                scope.spawn(move || {
                    handle
                        .get_or_try_init(|| {
                            constructed.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(10));
                            Ok::<_, ()>(i)
                        })
                        .unwrap();
                });
            }
        });

        assert_eq!(constructed.load(Ordering::SeqCst), 1);
        assert!(handle.is_initialized());
    }
}
