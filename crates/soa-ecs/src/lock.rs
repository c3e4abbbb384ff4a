//! Advisory re-entrant locks scoped to one stored type.
//!
//! Stores never take these internally. A caller composing several accesses
//! (read a column, compute, write it back) holds the lock for the whole
//! sequence so other threads that also lock see it as one step.

use std::{fmt, sync::Arc};

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

/// Guard returned by [`TypeLock::lock`]. Releases on drop.
pub type TypeLockGuard<'a> = ReentrantMutexGuard<'a, ()>;

/// Cloneable handle to one type's re-entrant lock.
///
/// Clones share the same lock. The owning thread may acquire it again while
/// already holding it.
#[derive(Clone, Default)]
pub struct TypeLock {
    inner: Arc<ReentrantMutex<()>>,
}

impl TypeLock {
    /// Create an unlocked lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the lock is held by this thread.
    pub fn lock(&self) -> TypeLockGuard<'_> {
        self.inner.lock()
    }

    /// Acquire without blocking, if no other thread holds the lock.
    #[must_use]
    pub fn try_lock(&self) -> Option<TypeLockGuard<'_>> {
        self.inner.try_lock()
    }

    /// Run `f` with the lock held. The lock is released however `f` exits.
    pub fn with<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.lock();
        f()
    }

    /// Check if any thread holds the lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}

impl fmt::Debug for TypeLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeLock")
            .field("locked", &self.is_locked())
            .finish()
    }
}
