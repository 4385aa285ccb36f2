//! Concurrent Model Pool
//!
//! Model instances are slow to load and must not be used by two callers at
//! once, but are fine to reuse sequentially. The pool keeps N interchangeable
//! instances so that N predictions run in parallel while caller N+1 waits, up
//! to a timeout, for one to come back.
//!
//! ```text
//!   predict ──▶ Semaphore (FIFO) ──▶ idle queue ──▶ spawn_blocking(model.predict)
//!                    ▲                    ▲                    │
//!                    └──── permit ────────┴──── PooledModel::drop
//! ```
//!
//! Waiters are served in arrival order: `tokio::sync::Semaphore` is fair.
//! A permit is only released after its instance is back in the idle queue, so
//! holding a permit always means an idle instance exists.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::forecast::{ModelLoader, ParameterAdaptor, Prediction, PredictiveModel};
use crate::{AppError, AppResult};

/// Default time to wait for an idle instance
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

type Slot<M> = Arc<Mutex<M>>;

struct PoolInner<M> {
    idle: Mutex<VecDeque<Slot<M>>>,
    permits: Arc<Semaphore>,
    /// Every instance, checked out or not, for bulk loading
    instances: Vec<Slot<M>>,
    loader: Option<Arc<dyn ModelLoader>>,
}

/// Fixed-size pool of model instances
pub struct ModelPool<M> {
    inner: Arc<PoolInner<M>>,
}

impl<M> Clone for ModelPool<M> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<M: PredictiveModel + 'static> ModelPool<M> {
    /// Eagerly builds `size` instances with `factory`
    pub fn new<F>(size: usize, loader: Option<Arc<dyn ModelLoader>>, mut factory: F) -> AppResult<Self>
    where
        F: FnMut() -> M,
    {
        if size == 0 {
            return Err(AppError::Validation("Model pool size must be at least 1".to_string()));
        }

        let instances: Vec<Slot<M>> = (0..size).map(|_| Arc::new(Mutex::new(factory()))).collect();
        let idle: VecDeque<Slot<M>> = instances.iter().cloned().collect();

        tracing::info!("Model pool created with {} instances", size);

        Ok(Self {
            inner: Arc::new(PoolInner {
                idle: Mutex::new(idle),
                permits: Arc::new(Semaphore::new(size)),
                instances,
                loader,
            }),
        })
    }

    /// Number of instances in circulation
    pub fn size(&self) -> usize {
        self.inner.instances.len()
    }

    /// Number of instances currently idle
    pub fn available(&self) -> usize {
        self.inner.permits.available_permits()
    }

    /// Load (or reload) every instance from `path`.
    ///
    /// Each instance is swapped while its own lock is held, so once the call
    /// succeeds a prediction sees either the old or the new artifacts of that
    /// instance. Instances are reloaded one after another; until the call
    /// returns the pool may serve from old and new instances side by side.
    /// A failed load is not rolled back and can leave an instance mixed.
    pub fn load(&self, path: &Path) -> AppResult<()> {
        let loader = self.inner.loader.as_deref();

        for (index, instance) in self.inner.instances.iter().enumerate() {
            instance.lock().load(path, loader)?;
            tracing::debug!("Pool instance {} loaded from {}", index, path.display());
        }

        tracing::info!("Loaded {} pooled models from {}", self.size(), path.display());
        Ok(())
    }

    /// Check out an idle instance, waiting at most `timeout`
    pub async fn acquire(&self, timeout: Duration) -> AppResult<PooledModel<M>> {
        let permit = match tokio::time::timeout(timeout, self.inner.permits.clone().acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(AppError::Internal("Model pool is closed".to_string())),
            Err(_) => {
                tracing::warn!("No model available in pool after {:?}", timeout);
                return Err(AppError::PoolExhausted(timeout));
            }
        };

        let slot = self
            .inner
            .idle
            .lock()
            .pop_front()
            .ok_or_else(|| AppError::Internal("Model pool idle queue out of sync with permits".to_string()))?;

        Ok(PooledModel {
            slot,
            pool: self.inner.clone(),
            _permit: permit,
        })
    }

    /// Run one prediction on an idle instance.
    ///
    /// The instance goes back to the pool on every exit path, including a
    /// failing or panicking prediction. Errors are never retried here.
    pub async fn predict<A>(&self, parameters: A, timeout: Duration) -> AppResult<Prediction>
    where
        A: ParameterAdaptor + 'static,
    {
        let pooled = self.acquire(timeout).await?;

        tokio::task::spawn_blocking(move || {
            let model = pooled.lock();
            model.predict(&parameters)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Prediction task failed: {}", e)))?
    }
}

/// An instance checked out of a [`ModelPool`]; returned to the pool on drop
pub struct PooledModel<M> {
    slot: Slot<M>,
    pool: Arc<PoolInner<M>>,
    // Dropped after `Drop::drop` has re-queued the slot
    _permit: OwnedSemaphorePermit,
}

impl<M> PooledModel<M> {
    pub fn lock(&self) -> MutexGuard<'_, M> {
        self.slot.lock()
    }
}

impl<M> Drop for PooledModel<M> {
    fn drop(&mut self) {
        self.pool.idle.lock().push_back(self.slot.clone());
    }
}

#[cfg(test)]
mod tests;
