//! Disposal handles returned by registrations.

use std::fmt;
use std::sync::{Mutex, PoisonError};

type DisposeFn = Box<dyn FnOnce() + Send>;

/// A handle that runs its teardown action at most once.
///
/// Dropping a `Disposable` does **not** dispose it; registrations live until
/// [`dispose`](Disposable::dispose) is called explicitly (usually by the
/// owning [`DisposableStore`] at host teardown).
#[must_use = "dropping a Disposable leaves the registration in place forever"]
pub struct Disposable {
    action: Mutex<Option<DisposeFn>>,
}

impl Disposable {
    pub fn new(action: impl FnOnce() + Send + 'static) -> Self {
        Self {
            action: Mutex::new(Some(Box::new(action))),
        }
    }

    /// Run the teardown action. Subsequent calls are no-ops.
    pub fn dispose(&self) {
        let action = self
            .action
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(action) = action {
            action();
        }
    }

    /// Returns `true` once the action has run.
    pub fn is_disposed(&self) -> bool {
        self.action
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl fmt::Debug for Disposable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposable")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// A bag of disposables torn down together.
#[derive(Debug, Default)]
pub struct DisposableStore {
    items: Mutex<Vec<Disposable>>,
}

impl DisposableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, disposable: Disposable) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(disposable);
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dispose every held item, in reverse order of insertion.
    pub fn dispose_all(&self) {
        let items = std::mem::take(&mut *self.items.lock().unwrap_or_else(PoisonError::into_inner));
        for item in items.into_iter().rev() {
            item.dispose();
        }
    }
}
