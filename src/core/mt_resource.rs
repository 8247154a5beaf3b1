//! # Multi-threaded Resource
//!
//! `MtResource` wraps a value in an `Arc<RwLock<_>>` so it can be shared between
//! the authoritative thread and tasks running on the worker pool.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A thread-safe, reference-counted resource container with read-write locking.
///
/// `MtResource` is how the authoritative thread shares state such as the world
/// with tasks. Tasks normally carry an `MtResource` only as a back-reference for
/// the result applier; they should not lock it while running on a worker, or the
/// authoritative thread may block when it applies results.
///
/// # Type Parameters
/// - `T`: The type of the contained resource, must be `Send + Sync`
///
/// # Examples
///
/// ```
/// use voxel_chunk_tasks::core::MtResource;
///
/// let counter = MtResource::new(0);
/// let handle = counter.clone();
///
/// std::thread::spawn(move || *handle.get_mut() += 1).join().unwrap();
/// assert_eq!(*counter.get(), 1);
/// assert!(counter.ptr_eq(&counter.clone()));
/// ```
///
/// # Poisoning
/// A panic while a guard is held poisons the lock. `MtResource` recovers the
/// inner value instead of propagating the panic, since result appliers are
/// allowed to panic without taking the authoritative thread down with them.
#[derive(Debug, Default)]
pub struct MtResource<T: Send + Sync> {
    resource: Arc<RwLock<T>>,
}

impl<T: Send + Sync> MtResource<T> {
    /// Creates a new `MtResource` containing the given value.
    pub fn new(resource: T) -> Self {
        Self {
            resource: Arc::new(RwLock::new(resource)),
        }
    }

    /// Returns a guard that allows reading the contained value.
    pub fn get(&self) -> RwLockReadGuard<'_, T> {
        self.resource.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a guard that allows modifying the contained value.
    ///
    /// Blocks until every outstanding read guard has been released.
    pub fn get_mut(&self) -> RwLockWriteGuard<'_, T> {
        self.resource.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether both handles point at the same resource.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.resource, &other.resource)
    }
}

impl<T: Send + Sync> Clone for MtResource<T> {
    fn clone(&self) -> Self {
        Self {
            resource: self.resource.clone(),
        }
    }
}
