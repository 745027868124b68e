//! Live result sets.
//!
//! A [`LiveResults`] handle is a read-only view the store keeps current: after
//! each committed write touching its type, the store reloads the view in
//! place and then calls its observers. Dropping every handle unregisters the
//! view on the next write.

use super::schema::StoredObject;
use super::StoreResult;
use log::warn;
use rusqlite::Connection;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

type Observer<T> = Arc<dyn Fn(&[T]) + Send + Sync>;

/// Handle returned by [`LiveResults::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverToken(u64);

/// Type-erased side of a live view, held weakly by the store.
pub(crate) trait LiveRefresh: Send + Sync {
    fn object_type(&self) -> &'static str;
    fn reload(&self, conn: &Connection) -> StoreResult<()>;
    fn notify(&self);
}

pub(crate) struct LiveInner<T: StoredObject> {
    items: RwLock<Vec<T>>,
    observers: Mutex<Vec<(ObserverToken, Observer<T>)>>,
    next_token: AtomicU64,
}

impl<T: StoredObject> LiveInner<T> {
    pub(crate) fn new(items: Vec<T>) -> Self {
        Self {
            items: RwLock::new(items),
            observers: Mutex::new(Vec::new()),
            next_token: AtomicU64::new(1),
        }
    }
}

impl<T: StoredObject> LiveRefresh for LiveInner<T> {
    fn object_type(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn reload(&self, conn: &Connection) -> StoreResult<()> {
        let fresh = super::store::load_objects::<T>(conn)?;
        *self.items.write().unwrap_or_else(PoisonError::into_inner) = fresh;
        Ok(())
    }

    fn notify(&self) {
        let observers = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect::<Vec<_>>();
        if observers.is_empty() {
            return;
        }

        let snapshot = self
            .items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in observers {
            observer(&snapshot);
        }
    }
}

/// Live, insertion-ordered view over every object of type `T`.
pub struct LiveResults<T: StoredObject> {
    inner: Arc<LiveInner<T>>,
}

impl<T: StoredObject> Clone for LiveResults<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: StoredObject> LiveResults<T> {
    pub(crate) fn from_inner(inner: Arc<LiveInner<T>>) -> Self {
        Self { inner }
    }

    /// Copies the current contents.
    pub fn snapshot(&self) -> Vec<T> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.read().get(index).cloned()
    }

    /// Registers `observer`, called with the full contents after each change.
    pub fn observe(&self, observer: impl Fn(&[T]) + Send + Sync + 'static) -> ObserverToken {
        let token = ObserverToken(self.inner.next_token.fetch_add(1, Ordering::Relaxed));
        self.inner
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((token, Arc::new(observer)));
        token
    }

    /// Removes an observer. Returns `false` for unknown tokens.
    pub fn unobserve(&self, token: ObserverToken) -> bool {
        let mut observers = self
            .inner
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != token);
        if observers.len() == before {
            warn!(
                "event=live_unobserve module=object status=noop object_type={}",
                T::TYPE_NAME
            );
            return false;
        }
        true
    }

    pub fn observer_count(&self) -> usize {
        self.inner
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub(crate) fn as_refresh(&self) -> Arc<dyn LiveRefresh> {
        Arc::clone(&self.inner) as Arc<dyn LiveRefresh>
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<T>> {
        self.inner.items.read().unwrap_or_else(PoisonError::into_inner)
    }
}
