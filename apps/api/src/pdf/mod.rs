//! PDF handling for uploaded resumes.
//!
//! - `loader` - lazy, shared PDFium binding
//! - `engine` - first-page rendering behind the `PdfEngine` trait
//! - `rasterizer` - file in, PNG + object URL out, failures folded into `Conversion`
//! - `text` - plain-text extraction for analysis

mod engine;
pub mod loader;
mod rasterizer;
mod text;

use thiserror::Error;

pub use loader::{LibraryLoader, LoadError, PdfiumSource};
pub use rasterizer::{Conversion, PageRasterizer};
pub use text::extract_text;

#[derive(Debug, Error)]
pub enum RasterError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("document could not be opened: {0}")]
    Document(String),

    #[error("document has no pages")]
    NoPages,

    #[error("page could not be rendered: {0}")]
    Render(String),

    #[error("{0}")]
    Encode(String),

    #[error("render task failed: {0}")]
    Task(String),
}
