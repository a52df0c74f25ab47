//! Memoized, single-flight model loading
//!
//! The first `ensure_loaded` caller spawns the loader on the runtime and
//! installs a shared in-flight future. Concurrent callers await that same
//! future. Only success moves the slot to `Ready`; a failure is recorded but a
//! later call starts a fresh attempt. Loading keeps running if every caller
//! stops waiting.

use crate::{
    capability::BackendId,
    error::{EngineError, Result, SegmentationError},
};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::{
    future::Future,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

/// Lifecycle of a backend model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LoadState {
    Unloaded,
    Loading,
    Ready,
    /// Last attempt failed; the next `ensure_loaded` retries
    Failed(String),
}

impl LoadState {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Constructs an engine model from its settings
#[async_trait]
pub trait ModelLoader<M, C>: Send + Sync
where
    M: ?Sized + Send + Sync + 'static,
    C: Send + Sync + 'static,
{
    async fn load(&self, config: &C) -> std::result::Result<Arc<M>, EngineError>;
}

/// A [`ModelLoader`] backed by a closure
pub struct FnLoader<F>(F);

/// Wrap a closure returning a load future as a [`ModelLoader`]
pub fn loader_fn<F>(f: F) -> FnLoader<F> {
    FnLoader(f)
}

#[async_trait]
impl<M, C, F, Fut> ModelLoader<M, C> for FnLoader<F>
where
    M: ?Sized + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
    F: Fn(C) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<Arc<M>, EngineError>> + Send,
{
    async fn load(&self, config: &C) -> std::result::Result<Arc<M>, EngineError> {
        (self.0)(config.clone()).await
    }
}

type SharedLoad<M> = Shared<BoxFuture<'static, std::result::Result<Arc<M>, String>>>;

enum Slot<M: ?Sized> {
    Unloaded,
    Loading { attempt: usize, load: SharedLoad<M> },
    Ready(Arc<M>),
    Failed(String),
}

type SharedSlot<M> = Arc<Mutex<Slot<M>>>;

/// A lazily constructed, process-wide model handle
pub struct LazyModel<M, C>
where
    M: ?Sized + Send + Sync + 'static,
    C: Send + Sync + 'static,
{
    backend: BackendId,
    loader: Arc<dyn ModelLoader<M, C>>,
    config: Arc<C>,
    slot: SharedSlot<M>,
    constructions: AtomicUsize,
}

impl<M, C> LazyModel<M, C>
where
    M: ?Sized + Send + Sync + 'static,
    C: Send + Sync + 'static,
{
    pub fn new(backend: BackendId, loader: Arc<dyn ModelLoader<M, C>>, config: C) -> Self {
        Self {
            backend,
            loader,
            config: Arc::new(config),
            slot: Arc::new(Mutex::new(Slot::Unloaded)),
            constructions: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn config(&self) -> &C {
        &self.config
    }

    /// Number of times the loader has been started
    #[must_use]
    pub fn construction_count(&self) -> usize {
        self.constructions.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn load_state(&self) -> LoadState {
        let Ok(slot) = self.slot.lock() else {
            return LoadState::Failed("model slot lock poisoned".to_string());
        };
        match &*slot {
            Slot::Unloaded => LoadState::Unloaded,
            Slot::Ready(_) => LoadState::Ready,
            Slot::Failed(message) => LoadState::Failed(message.clone()),
            Slot::Loading { load, .. } => match load.clone().now_or_never() {
                Some(Ok(_)) => LoadState::Ready,
                Some(Err(message)) => LoadState::Failed(message),
                None => LoadState::Loading,
            },
        }
    }

    /// The loaded model, or `ModelNotLoaded`
    pub fn get(&self) -> Result<Arc<M>> {
        let slot = lock_slot(&self.slot)?;
        match &*slot {
            Slot::Ready(model) => Ok(Arc::clone(model)),
            Slot::Loading { load, .. } => match load.clone().now_or_never() {
                Some(Ok(model)) => Ok(model),
                _ => Err(SegmentationError::ModelNotLoaded {
                    backend: self.backend,
                }),
            },
            Slot::Unloaded | Slot::Failed(_) => Err(SegmentationError::ModelNotLoaded {
                backend: self.backend,
            }),
        }
    }

    /// Load the model once, sharing an in-flight load with concurrent callers
    ///
    /// # Errors
    /// - `ModelLoad` when the loader fails; the next call retries
    pub async fn ensure_loaded(&self) -> Result<Arc<M>> {
        let load = {
            let mut slot = lock_slot(&self.slot)?;
            let in_flight = match &*slot {
                Slot::Ready(model) => return Ok(Arc::clone(model)),
                Slot::Loading { load, .. } => Some(load.clone()),
                Slot::Unloaded | Slot::Failed(_) => None,
            };
            match in_flight {
                Some(load) => match load.clone().now_or_never() {
                    Some(Ok(model)) => {
                        *slot = Slot::Ready(Arc::clone(&model));
                        return Ok(model);
                    },
                    // A finished failure is never replayed
                    Some(Err(_)) => self.start_load(&mut slot),
                    None => load,
                },
                None => self.start_load(&mut slot),
            }
        };

        load.await.map_err(|message| {
            tracing::warn!(backend = %self.backend, error = %message, "model load failed");
            SegmentationError::model_load(self.backend, message)
        })
    }

    /// Spawn the loader and install it as the in-flight load
    ///
    /// The spawned task settles the slot itself, so the outcome is recorded
    /// even when no caller is still waiting.
    fn start_load(&self, slot: &mut Slot<M>) -> SharedLoad<M> {
        let attempt = self.constructions.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(backend = %self.backend, attempt, "🔄 Loading segmentation model");

        let loader = Arc::clone(&self.loader);
        let config = Arc::clone(&self.config);
        let shared_slot = Arc::clone(&self.slot);
        let backend = self.backend;
        let handle = tokio::spawn(async move {
            let start = instant::Instant::now();
            let result = loader.load(&config).await.map_err(|e| e.to_string());
            match &result {
                Ok(_) => tracing::info!(
                    backend = %backend,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "✅ Model loaded"
                ),
                Err(message) => {
                    tracing::debug!(backend = %backend, attempt, error = %message, "load attempt failed");
                },
            }
            settle(&shared_slot, attempt, &result);
            result
        });

        let load = async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(format!("{} loader task failed: {}", backend, e)),
            }
        }
        .boxed()
        .shared();

        *slot = Slot::Loading {
            attempt,
            load: load.clone(),
        };
        load
    }
}

/// Record the outcome of `attempt` unless a newer attempt replaced it
fn settle<M: ?Sized>(
    slot: &SharedSlot<M>,
    attempt: usize,
    result: &std::result::Result<Arc<M>, String>,
) {
    let Ok(mut slot) = slot.lock() else {
        return;
    };
    if matches!(&*slot, Slot::Loading { attempt: current, .. } if *current == attempt) {
        *slot = match result {
            Ok(model) => Slot::Ready(Arc::clone(model)),
            Err(message) => Slot::Failed(message.clone()),
        };
    }
}

fn lock_slot<M: ?Sized>(slot: &SharedSlot<M>) -> Result<MutexGuard<'_, Slot<M>>> {
    slot.lock()
        .map_err(|_| SegmentationError::internal("model slot lock poisoned"))
}

impl<M, C> std::fmt::Debug for LazyModel<M, C>
where
    M: ?Sized + Send + Sync + 'static,
    C: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyModel")
            .field("backend", &self.backend)
            .field("constructions", &self.constructions.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
