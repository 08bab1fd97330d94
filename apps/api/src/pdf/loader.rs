//! Lazy, shared loading of the PDF rendering library.
//!
//! The library is bound the first time anyone needs it. Callers that arrive
//! while that load is still running await the same shared future, so there is
//! never more than one load attempt in flight. A successful load is kept for
//! the lifetime of the loader; a failed one is handed to every caller that was
//! waiting on it and then forgotten, so the next call starts over.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use pdfium_render::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::engine::{PdfEngine, PdfiumEngine};

#[derive(Debug, Clone, Error)]
pub enum LoadError {
    #[error("PDF library could not be bound: {0}")]
    Bind(String),

    #[error("PDF library load task failed: {0}")]
    Task(String),
}

/// A loaded rendering library plus where it came from.
#[derive(Clone)]
pub struct LibraryHandle {
    engine: Arc<dyn PdfEngine>,
    origin: String,
}

impl LibraryHandle {
    pub fn new(engine: Arc<dyn PdfEngine>, origin: impl Into<String>) -> Self {
        Self {
            engine,
            origin: origin.into(),
        }
    }

    pub fn engine(&self) -> Arc<dyn PdfEngine> {
        self.engine.clone()
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }
}

/// Performs one load attempt. Injected into `LibraryLoader` so tests can count
/// and gate attempts.
#[async_trait]
pub trait LibrarySource: Send + Sync {
    async fn load(&self) -> Result<LibraryHandle, LoadError>;
}

type PendingLoad = Shared<BoxFuture<'static, Result<LibraryHandle, LoadError>>>;

enum Slot {
    Idle,
    Loading { attempt: u64, pending: PendingLoad },
    Ready(LibraryHandle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoaderStatus {
    Idle,
    Loading,
    Ready,
}

pub struct LibraryLoader {
    source: Arc<dyn LibrarySource>,
    slot: Mutex<Slot>,
    attempts: Mutex<u64>,
}

impl LibraryLoader {
    pub fn new(source: Arc<dyn LibrarySource>) -> Self {
        Self {
            source,
            slot: Mutex::new(Slot::Idle),
            attempts: Mutex::new(0),
        }
    }

    pub fn status(&self) -> LoaderStatus {
        match &*self.slot.lock() {
            Slot::Idle => LoaderStatus::Idle,
            Slot::Loading { .. } => LoaderStatus::Loading,
            Slot::Ready(_) => LoaderStatus::Ready,
        }
    }

    /// Returns the loaded library, starting or joining a load as needed.
    pub async fn ensure_loaded(&self) -> Result<LibraryHandle, LoadError> {
        let (attempt, pending) = {
            let mut slot = self.slot.lock();
            match &*slot {
                Slot::Ready(handle) => return Ok(handle.clone()),
                Slot::Loading { attempt, pending } => {
                    debug!("PDF library load already in progress, joining attempt {attempt}");
                    (*attempt, pending.clone())
                }
                Slot::Idle => {
                    let attempt = {
                        let mut attempts = self.attempts.lock();
                        *attempts += 1;
                        *attempts
                    };
                    info!("Loading PDF library (attempt {attempt})");

                    let source = self.source.clone();
                    let pending = async move { source.load().await }.boxed().shared();
                    *slot = Slot::Loading {
                        attempt,
                        pending: pending.clone(),
                    };
                    (attempt, pending)
                }
            }
        };

        let result = pending.await;

        let mut slot = self.slot.lock();
        // Only the attempt we awaited may settle the slot
        if matches!(&*slot, Slot::Loading { attempt: current, .. } if *current == attempt) {
            *slot = match &result {
                Ok(handle) => {
                    info!("PDF library loaded from {}", handle.origin());
                    Slot::Ready(handle.clone())
                }
                Err(e) => {
                    warn!("PDF library load failed, next call will retry: {e}");
                    Slot::Idle
                }
            };
        }
        result
    }

    #[cfg(test)]
    pub fn reset(&self) {
        *self.slot.lock() = Slot::Idle;
    }
}

/// Binds PDFium from the first location that works.
///
/// Search order:
/// 1. the configured library path, if any
/// 2. `lib/` under the current working directory (development)
/// 3. `lib/` next to the executable
/// 4. `Resources/lib/` in a macOS bundle
/// 5. the system library
pub struct PdfiumSource {
    configured_path: Option<PathBuf>,
}

impl PdfiumSource {
    pub fn new(configured_path: Option<PathBuf>) -> Self {
        Self { configured_path }
    }

    fn search_paths(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Some(path) = &self.configured_path {
            paths.push(path.clone());
        }

        if let Ok(cwd) = std::env::current_dir() {
            paths.push(Pdfium::pdfium_platform_library_name_at_path(&cwd.join("lib")));
        }

        if let Ok(exe) = std::env::current_exe() {
            if let Some(parent) = exe.parent() {
                paths.push(Pdfium::pdfium_platform_library_name_at_path(&parent.join("lib")));

                if let Some(grandparent) = parent.parent() {
                    paths.push(Pdfium::pdfium_platform_library_name_at_path(
                        &grandparent.join("Resources/lib"),
                    ));
                }
            }
        }

        paths
    }

    fn bind(paths: Vec<PathBuf>) -> Result<LibraryHandle, LoadError> {
        for path in paths {
            if !path.exists() {
                continue;
            }
            match Pdfium::bind_to_library(&path) {
                Ok(bindings) => {
                    let engine = PdfiumEngine::new(Pdfium::new(bindings));
                    return Ok(LibraryHandle::new(
                        Arc::new(engine),
                        path.display().to_string(),
                    ));
                }
                Err(e) => warn!("Could not bind PDFium at {}: {e}", path.display()),
            }
        }

        Pdfium::bind_to_system_library()
            .map(|bindings| {
                LibraryHandle::new(Arc::new(PdfiumEngine::new(Pdfium::new(bindings))), "system")
            })
            .map_err(|e| LoadError::Bind(e.to_string()))
    }
}

#[async_trait]
impl LibrarySource for PdfiumSource {
    async fn load(&self) -> Result<LibraryHandle, LoadError> {
        let paths = self.search_paths();
        tokio::task::spawn_blocking(move || Self::bind(paths))
            .await
            .map_err(|e| LoadError::Task(e.to_string()))?
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use image::DynamicImage;
    use tokio::sync::Semaphore;

    use super::*;
    use crate::pdf::RasterError;

    /// Engine that hands back a fixed image, or an error for documents that
    /// do not start with `%PDF`.
    pub struct FakeEngine {
        pub width: u32,
        pub height: u32,
    }

    impl PdfEngine for FakeEngine {
        fn render_first_page(&self, bytes: &[u8], scale: f32) -> Result<DynamicImage, RasterError> {
            if !bytes.starts_with(b"%PDF") {
                return Err(RasterError::Document("not a PDF".to_string()));
            }
            if bytes.ends_with(b"%%EMPTY") {
                return Err(RasterError::NoPages);
            }
            let w = (self.width as f32 * scale) as u32;
            let h = (self.height as f32 * scale) as u32;
            Ok(DynamicImage::new_rgba8(w, h))
        }
    }

    /// Counts load attempts and can hold them open until released.
    pub struct CountingSource {
        pub calls: AtomicUsize,
        gate: Option<Semaphore>,
        fail_first: AtomicUsize,
    }

    impl CountingSource {
        pub fn ready() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                gate: None,
                fail_first: AtomicUsize::new(0),
            }
        }

        /// Loads block until `release` is called.
        pub fn gated() -> Self {
            Self {
                gate: Some(Semaphore::new(0)),
                ..Self::ready()
            }
        }

        /// The first `n` attempts fail.
        pub fn failing(n: usize) -> Self {
            Self {
                fail_first: AtomicUsize::new(n),
                ..Self::ready()
            }
        }

        pub fn gated_failing(n: usize) -> Self {
            Self {
                gate: Some(Semaphore::new(0)),
                ..Self::failing(n)
            }
        }

        pub fn release(&self) {
            if let Some(gate) = &self.gate {
                gate.add_permits(1);
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LibrarySource for CountingSource {
        async fn load(&self) -> Result<LibraryHandle, LoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.acquire().await.expect("gate closed").forget();
            }
            let should_fail = self
                .fail_first
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if should_fail {
                return Err(LoadError::Bind("library missing".to_string()));
            }
            Ok(LibraryHandle::new(
                Arc::new(FakeEngine {
                    width: 10,
                    height: 12,
                }),
                "fake",
            ))
        }
    }

    /// Forwards to a shared `CountingSource` so the test keeps a handle on it.
    pub struct SharedSource(pub Arc<CountingSource>);

    #[async_trait]
    impl LibrarySource for SharedSource {
        async fn load(&self) -> Result<LibraryHandle, LoadError> {
            self.0.load().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{CountingSource, SharedSource};
    use super::*;

    fn loader_with(source: CountingSource) -> (Arc<LibraryLoader>, Arc<CountingSource>) {
        let source = Arc::new(source);
        let loader = Arc::new(LibraryLoader::new(Arc::new(SharedSource(source.clone()))));
        (loader, source)
    }

    #[tokio::test]
    async fn test_second_call_uses_cached_handle() {
        let (loader, source) = loader_with(CountingSource::ready());

        let first = loader.ensure_loaded().await.unwrap();
        let second = loader.ensure_loaded().await.unwrap();

        assert_eq!(source.calls(), 1);
        assert_eq!(first.origin(), "fake");
        assert_eq!(second.origin(), "fake");
        assert_eq!(loader.status(), LoaderStatus::Ready);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_load() {
        let (loader, source) = loader_with(CountingSource::gated());

        let waiters: Vec<_> = (0..8)
            .map(|_| {
                let loader = loader.clone();
                tokio::spawn(async move { loader.ensure_loaded().await })
            })
            .collect();

        // let every waiter reach the pending load
        while source.calls() == 0 {
            tokio::task::yield_now().await;
        }
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        assert_eq!(loader.status(), LoaderStatus::Loading);
        source.release();

        for waiter in waiters {
            assert!(waiter.await.unwrap().is_ok());
        }
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_failure() {
        let (loader, source) = loader_with(CountingSource::gated_failing(1));

        let first = {
            let loader = loader.clone();
            tokio::spawn(async move { loader.ensure_loaded().await })
        };
        while source.calls() == 0 {
            tokio::task::yield_now().await;
        }
        let second = {
            let loader = loader.clone();
            tokio::spawn(async move { loader.ensure_loaded().await })
        };
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        source.release();

        assert!(first.await.unwrap().is_err());
        assert!(second.await.unwrap().is_err());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_load_is_retried_on_next_call() {
        let (loader, source) = loader_with(CountingSource::failing(1));

        let err = loader.ensure_loaded().await.err().unwrap();
        assert!(matches!(err, LoadError::Bind(_)));
        assert_eq!(loader.status(), LoaderStatus::Idle);

        assert!(loader.ensure_loaded().await.is_ok());
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_reset_forces_reload() {
        let (loader, source) = loader_with(CountingSource::ready());
        loader.ensure_loaded().await.unwrap();
        loader.reset();
        loader.ensure_loaded().await.unwrap();
        assert_eq!(source.calls(), 2);
    }

    #[test]
    fn test_configured_path_searched_first() {
        let dir = tempfile::tempdir().unwrap();
        let configured = dir.path().join("libpdfium.so");
        let source = PdfiumSource::new(Some(configured.clone()));
        let paths = source.search_paths();
        assert_eq!(paths.first(), Some(&configured));
        assert!(paths.len() > 1);
    }
}
