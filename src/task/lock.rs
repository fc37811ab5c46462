//! Three-mode coordination lock guarding the task registry.
//!
//! - **write**: exclusive, for structural changes. Queued writers block new
//!   readers and refreshes, so writers cannot starve.
//! - **read**: shared between any number of readers.
//! - **refresh**: at most one holder, compatible with readers. A refresh
//!   request made while another one is already pending is dropped, so a
//!   burst of requests collapses into a single pass.

use std::ops::{Deref, DerefMut};
use std::sync::{
    Condvar, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockMode {
    Write,
    Read,
    Refresh,
}

/// Snapshot of the lock bookkeeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockState {
    pub write_busy: bool,
    pub refresh_busy: bool,
    pub readers: usize,
    pub queued_writers: usize,
    pub refresh_pending: bool,
}

impl LockState {
    pub fn read_busy(&self) -> bool {
        self.readers > 0
    }

    fn any_busy(&self) -> bool {
        self.write_busy || self.refresh_busy || self.read_busy()
    }
}

pub struct TaskLock<T> {
    state: Mutex<LockState>,
    cond: Condvar,
    /// Only touched once `state` admitted the caller, so it never contends
    data: RwLock<T>,
}

impl<T> TaskLock<T> {
    pub fn new(data: T) -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            cond: Condvar::new(),
            data: RwLock::new(data),
        }
    }

    /// Block until no other mode is held, then take exclusive access
    pub fn write(&self) -> WriteGuard<'_, T> {
        let mut state = self.lock_state();
        state.queued_writers += 1;
        let mut state = self
            .cond
            .wait_while(state, |s| s.any_busy())
            .unwrap_or_else(PoisonError::into_inner);
        state.queued_writers -= 1;
        state.write_busy = true;
        drop(state);
        WriteGuard {
            data: self.data.write().unwrap_or_else(PoisonError::into_inner),
            _release: Release::new(self, LockMode::Write),
        }
    }

    /// Block while a writer holds or waits for the lock, then share access
    pub fn read(&self) -> ReadGuard<'_, T> {
        let state = self.lock_state();
        let mut state = self
            .cond
            .wait_while(state, |s| s.write_busy || s.queued_writers > 0)
            .unwrap_or_else(PoisonError::into_inner);
        state.readers += 1;
        drop(state);
        ReadGuard {
            data: self.shared_data(),
            _release: Release::new(self, LockMode::Read),
        }
    }

    /// Take the refresh slot, or return `None` right away if a refresh is
    /// already pending
    pub fn try_refresh(&self) -> Option<RefreshGuard<'_, T>> {
        let mut state = self.lock_state();
        if state.refresh_pending {
            return None;
        }
        state.refresh_pending = true;
        let mut state = self
            .cond
            .wait_while(state, |s| {
                s.write_busy || s.refresh_busy || s.queued_writers > 0
            })
            .unwrap_or_else(PoisonError::into_inner);
        state.refresh_pending = false;
        state.refresh_busy = true;
        drop(state);
        Some(RefreshGuard {
            data: self.shared_data(),
            _release: Release::new(self, LockMode::Refresh),
        })
    }

    pub fn state(&self) -> LockState {
        *self.lock_state()
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn shared_data(&self) -> RwLockReadGuard<'_, T> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_state(&self) -> MutexGuard<'_, LockState> {
        // The state is plain counters, always consistent between statements
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, mode: LockMode) {
        let mut state = self.lock_state();
        match mode {
            LockMode::Write => state.write_busy = false,
            LockMode::Read => state.readers -= 1,
            LockMode::Refresh => state.refresh_busy = false,
        }
        let wake_all = mode == LockMode::Write || state.queued_writers > 0;
        drop(state);

        if wake_all {
            self.cond.notify_all();
        } else {
            self.cond.notify_one();
        }
    }
}

impl<T: Default> Default for TaskLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> std::fmt::Debug for TaskLock<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskLock")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Gives a mode back on drop. Guards declare it after their data so the
/// data is released first.
struct Release<'a, T> {
    lock: &'a TaskLock<T>,
    mode: LockMode,
}

impl<'a, T> Release<'a, T> {
    fn new(lock: &'a TaskLock<T>, mode: LockMode) -> Self {
        Self { lock, mode }
    }
}

impl<T> Drop for Release<'_, T> {
    fn drop(&mut self) {
        self.lock.release(self.mode);
    }
}

pub struct WriteGuard<'a, T> {
    data: RwLockWriteGuard<'a, T>,
    _release: Release<'a, T>,
}

impl<T> Deref for WriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

impl<T> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.data
    }
}

pub struct ReadGuard<'a, T> {
    data: RwLockReadGuard<'a, T>,
    _release: Release<'a, T>,
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

pub struct RefreshGuard<'a, T> {
    data: RwLockReadGuard<'a, T>,
    _release: Release<'a, T>,
}

impl<T> Deref for RefreshGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}
