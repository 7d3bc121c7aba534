//! Pool of retained incremental build sessions
//!
//! The first build of a document path opens a bundler session and performs
//! a cold build; every later build of the same path reuses that session and
//! only rebuilds incrementally, which skips re-resolving and re-parsing the
//! dependency graph. A failed build keeps its session so the next attempt
//! can succeed once the input is fixed.

use crate::collab::{BuildOptions, BuildOutput, BuildSession, Bundler};
use crate::error::ErrorObject;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One retained bundler session
pub struct BuildContext {
    /// Correlation id for log lines
    pub id: Uuid,

    /// Entry document of the session
    pub path: PathBuf,

    /// Number of builds run on this session (cold build included)
    pub builds: u64,

    pub created_at: DateTime<Utc>,

    last_used: Instant,

    /// `None` until the bundler has opened the session, and again after disposal
    session: Option<Box<dyn BuildSession>>,

    disposed: bool,
}

impl BuildContext {
    fn empty(path: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4(),
            path,
            builds: 0,
            created_at: Utc::now(),
            last_used: Instant::now(),
            session: None,
            disposed: false,
        }
    }

    /// Run a build on the retained session.
    ///
    /// Fails without reaching the bundler once the context is disposed.
    pub async fn rebuild(&mut self) -> Result<BuildOutput, ErrorObject> {
        let kind = if self.builds == 0 { "cold build" } else { "incremental rebuild" };
        let open = if self.disposed { None } else { self.session.as_mut() };
        let Some(session) = open else {
            return Err(ErrorObject::new(format!("build context for {} is not open", self.path.display()))
                .with_name("ContextDisposed"));
        };

        let start = Instant::now();
        self.builds += 1;
        self.last_used = Instant::now();
        let result = session.rebuild().await;

        match &result {
            Ok(_) => debug!(
                "[context {}] {} of {} completed in {:.2}ms",
                self.id,
                kind,
                self.path.display(),
                start.elapsed().as_secs_f64() * 1000.0
            ),
            Err(e) => warn!("[context {}] {} of {} failed: {}", self.id, kind, self.path.display(), e),
        }

        result
    }

    /// Time since the last build on this session
    pub fn idle_for(&self) -> Duration {
        self.last_used.elapsed()
    }

    /// Whether the session was released; a disposed context never builds again
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Age of the context, measured from when its slot was opened
    pub fn age(&self) -> Duration {
        (Utc::now() - self.created_at).to_std().unwrap_or_default()
    }

    async fn dispose(&mut self) {
        self.disposed = true;
        if let Some(mut session) = self.session.take() {
            debug!(
                "[context {}] Disposing build context for {} after {} builds ({:.1}s old)",
                self.id,
                self.path.display(),
                self.builds,
                self.age().as_secs_f64()
            );
            session.dispose().await;
        }
    }
}

/// Handle to a pooled context; holding the lock serializes builds of a path
pub type ContextHandle = Arc<Mutex<BuildContext>>;

/// Process-lifetime pool of build contexts keyed by document path.
///
/// The map lock is only held to look up or insert a slot; opening a
/// session, building and disposing happen under the per-path lock, so a
/// slow bundler call on one path never holds up another.
pub struct BuildContextPool {
    bundler: Arc<dyn Bundler>,
    contexts: RwLock<HashMap<PathBuf, ContextHandle>>,
}

impl BuildContextPool {
    pub fn new(bundler: Arc<dyn Bundler>) -> Self {
        Self {
            bundler,
            contexts: RwLock::new(HashMap::new()),
        }
    }

    /// The slot for `path`, inserting an unopened one if needed
    async fn slot(&self, path: &Path) -> ContextHandle {
        if let Some(handle) = self.contexts.read().await.get(path) {
            return Arc::clone(handle);
        }

        let mut contexts = self.contexts.write().await;
        let handle = contexts
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(BuildContext::empty(path.to_path_buf()))));
        Arc::clone(handle)
    }

    /// Drop `handle` from the map unless it was already replaced
    async fn forget(&self, path: &Path, handle: &ContextHandle) {
        let mut contexts = self.contexts.write().await;
        if contexts.get(path).is_some_and(|current| Arc::ptr_eq(current, handle)) {
            contexts.remove(path);
        }
    }

    /// Return the context for `path`, opening a session on first use
    pub async fn get_or_create(&self, path: &Path, options: &BuildOptions) -> Result<ContextHandle, ErrorObject> {
        loop {
            let handle = self.slot(path).await;
            let mut context = handle.lock().await;

            if context.disposed {
                // Disposed after we looked it up; the map already holds a fresh slot or none
                continue;
            }

            if context.session.is_none() {
                match self.bundler.create_context(options).await {
                    Ok(session) => {
                        context.session = Some(session);
                        info!("[context {}] Created build context for {}", context.id, path.display());
                    }
                    Err(e) => {
                        // Forget the slot before releasing it so waiters retry on a new one
                        context.disposed = true;
                        self.forget(path, &handle).await;
                        return Err(e);
                    }
                }
            }

            drop(context);
            return Ok(handle);
        }
    }

    /// Build `path`: cold on first use, incremental afterwards
    pub async fn build(&self, path: &Path, options: &BuildOptions) -> Result<BuildOutput, ErrorObject> {
        loop {
            let handle = self.get_or_create(path, options).await?;
            let mut context = handle.lock().await;

            if context.disposed {
                debug!("[context {}] Disposed before build of {}, retrying", context.id, path.display());
                continue;
            }

            return context.rebuild().await;
        }
    }

    /// Whether a context is retained for `path`
    pub async fn contains(&self, path: &Path) -> bool {
        self.contexts.read().await.contains_key(path)
    }

    /// Number of retained contexts
    pub async fn len(&self) -> usize {
        self.contexts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.contexts.read().await.is_empty()
    }

    /// Dispose contexts that have not built anything for `max_idle`.
    ///
    /// Contexts currently locked (building or being opened) are skipped.
    /// A caller still holding a handle to a disposed context gets a fresh
    /// one on its next build.
    pub async fn dispose_idle(&self, max_idle: Duration) -> usize {
        let idle: Vec<OwnedMutexGuard<BuildContext>> = {
            let mut contexts = self.contexts.write().await;
            let mut idle = Vec::new();

            contexts.retain(|_, handle| match Arc::clone(handle).try_lock_owned() {
                Ok(context) if context.session.is_some() && context.idle_for() >= max_idle => {
                    idle.push(context);
                    false
                }
                _ => true,
            });
            idle
        };

        let count = idle.len();
        for mut context in idle {
            context.dispose().await;
        }

        if count > 0 {
            info!("Disposed {} idle build contexts", count);
        }
        count
    }

    /// Dispose every retained context; intended for process shutdown
    pub async fn dispose_all(&self) {
        let drained: Vec<(PathBuf, ContextHandle)> = self.contexts.write().await.drain().collect();
        let count = drained.len();

        for (_, handle) in drained {
            handle.lock().await.dispose().await;
        }

        info!("Disposed {} build contexts", count);
    }

    /// Alias of [`dispose_all`](Self::dispose_all)
    pub async fn shutdown(&self) {
        self.dispose_all().await
    }
}
