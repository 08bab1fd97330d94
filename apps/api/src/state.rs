use std::sync::Arc;

use crate::analysis::FeedbackAnalyzer;
use crate::object_url::ObjectUrls;
use crate::pdf::PageRasterizer;
use crate::platform::Platform;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Auth, key-value records and blob storage.
    pub platform: Platform,
    /// Owns the lazily loaded PDF library; one per process.
    pub rasterizer: Arc<PageRasterizer>,
    /// Images produced by conversions, served at `/blob/<id>` until revoked.
    pub object_urls: ObjectUrls,
    /// Pluggable feedback backend. Default: LlmFeedbackAnalyzer.
    pub analyzer: Arc<dyn FeedbackAnalyzer>,
}

#[cfg(test)]
impl AppState {
    /// In-memory platform, fake PDF library, the given analyzer.
    pub fn for_tests(
        source: crate::pdf::loader::testing::CountingSource,
        analyzer: Arc<dyn FeedbackAnalyzer>,
    ) -> Self {
        let object_urls = ObjectUrls::default();
        let loader = Arc::new(crate::pdf::LibraryLoader::new(Arc::new(source)));
        Self {
            platform: Platform::in_memory(),
            rasterizer: Arc::new(PageRasterizer::new(loader, object_urls.clone())),
            object_urls,
            analyzer,
        }
    }
}
