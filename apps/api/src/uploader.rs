//! Resume uploader: a single selection slot that only a conforming PDF can
//! occupy.
//!
//! Every accepted selection or removal is reported through the callback given
//! at construction, so the holder of the uploader decides what happens to the
//! file. Rejected selections leave the slot untouched and report nothing.

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

pub const PDF_MIME: &str = "application/pdf";
/// 20 MiB.
pub const MAX_FILE_SIZE: usize = 20 * 1024 * 1024;

/// A file handed in by the client, fully buffered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    /// Declared content type; empty when the client sent none.
    pub mime: String,
    pub bytes: Bytes,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    fn is_pdf(&self) -> bool {
        if self.mime.is_empty() || self.mime == "application/octet-stream" {
            return self.name.to_ascii_lowercase().ends_with(".pdf");
        }
        self.mime == PDF_MIME
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("no file selected")]
    Empty,

    #[error("only one file can be uploaded at a time, got {0}")]
    TooManyFiles(usize),

    #[error("{name} is not a PDF")]
    NotPdf { name: String },

    #[error("{name} is {size} bytes, over the {max} byte limit")]
    TooLarge { name: String, size: usize, max: usize },
}

/// Checks a batch of candidate files against the slot constraints.
pub fn validate(files: &[UploadFile]) -> Result<&UploadFile, Rejection> {
    let file = match files {
        [] => return Err(Rejection::Empty),
        [file] => file,
        many => return Err(Rejection::TooManyFiles(many.len())),
    };
    if !file.is_pdf() {
        return Err(Rejection::NotPdf {
            name: file.name.clone(),
        });
    }
    if file.size() > MAX_FILE_SIZE {
        return Err(Rejection::TooLarge {
            name: file.name.clone(),
            size: file.size(),
            max: MAX_FILE_SIZE,
        });
    }
    Ok(file)
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UploaderState {
    #[default]
    Empty,
    Selected(UploadFile),
}

/// What the uploader shows: the held file, or the empty-state prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UploaderView {
    Empty { prompt: String },
    Selected { name: String, size: String },
}

pub type SelectionCallback = Box<dyn FnMut(Option<&UploadFile>) + Send>;

pub struct Uploader {
    state: UploaderState,
    on_select: SelectionCallback,
}

impl Uploader {
    pub fn new(on_select: impl FnMut(Option<&UploadFile>) + Send + 'static) -> Self {
        Self {
            state: UploaderState::Empty,
            on_select: Box::new(on_select),
        }
    }

    pub fn state(&self) -> &UploaderState {
        &self.state
    }

    pub fn selected(&self) -> Option<&UploadFile> {
        match &self.state {
            UploaderState::Selected(file) => Some(file),
            UploaderState::Empty => None,
        }
    }

    /// Offers a drop or picker selection. Only the most recent accepted file
    /// is kept.
    pub fn select(&mut self, files: Vec<UploadFile>) -> Result<(), Rejection> {
        validate(&files)?;
        let file = files.into_iter().next().ok_or(Rejection::Empty)?;
        self.state = UploaderState::Selected(file);
        if let UploaderState::Selected(file) = &self.state {
            (self.on_select)(Some(file));
        }
        Ok(())
    }

    pub fn remove(&mut self) {
        self.state = UploaderState::Empty;
        (self.on_select)(None);
    }

    /// Hands the held file to the caller and empties the slot without
    /// reporting a removal.
    pub fn take(&mut self) -> Option<UploadFile> {
        match std::mem::take(&mut self.state) {
            UploaderState::Selected(file) => Some(file),
            UploaderState::Empty => None,
        }
    }

    pub fn view(&self) -> UploaderView {
        match &self.state {
            UploaderState::Empty => UploaderView::Empty {
                prompt: prompt(),
            },
            UploaderState::Selected(file) => UploaderView::Selected {
                name: file.name.clone(),
                size: format_size(file.size() as u64),
            },
        }
    }
}

pub fn prompt() -> String {
    format!("PDF (max {})", format_size(MAX_FILE_SIZE as u64))
}

/// Human-readable byte count: `0 Bytes`, `1.5 KB`, `20 MB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let formatted = format!("{value:.2}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    type Calls = Arc<Mutex<Vec<Option<String>>>>;

    fn recording_uploader() -> (Uploader, Calls) {
        let calls: Calls = Arc::default();
        let sink = calls.clone();
        let uploader = Uploader::new(move |file| {
            sink.lock()
                .unwrap()
                .push(file.map(|f| f.name.clone()));
        });
        (uploader, calls)
    }

    fn pdf(name: &str, size: usize) -> UploadFile {
        UploadFile::new(name, PDF_MIME, vec![0u8; size])
    }

    #[test]
    fn test_conforming_pdf_is_selected() {
        let (mut uploader, calls) = recording_uploader();
        let file = pdf("cv.pdf", 1024);

        uploader.select(vec![file.clone()]).unwrap();

        assert_eq!(uploader.state(), &UploaderState::Selected(file));
        assert_eq!(*calls.lock().unwrap(), vec![Some("cv.pdf".to_string())]);
    }

    #[test]
    fn test_file_at_exact_limit_is_accepted() {
        let (mut uploader, _) = recording_uploader();
        uploader.select(vec![pdf("big.pdf", MAX_FILE_SIZE)]).unwrap();
        assert!(uploader.selected().is_some());
    }

    #[test]
    fn test_rejections_leave_state_and_skip_callback() {
        let (mut uploader, calls) = recording_uploader();

        let oversized = uploader.select(vec![pdf("big.pdf", MAX_FILE_SIZE + 1)]);
        assert!(matches!(oversized, Err(Rejection::TooLarge { .. })));

        let wrong_type = uploader.select(vec![UploadFile::new("cv.docx", "application/msword", "x")]);
        assert!(matches!(wrong_type, Err(Rejection::NotPdf { .. })));

        let many = uploader.select(vec![pdf("a.pdf", 1), pdf("b.pdf", 1)]);
        assert_eq!(many, Err(Rejection::TooManyFiles(2)));

        assert_eq!(uploader.select(vec![]), Err(Rejection::Empty));

        assert_eq!(uploader.state(), &UploaderState::Empty);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_rejection_keeps_previous_selection() {
        let (mut uploader, calls) = recording_uploader();
        let first = pdf("first.pdf", 10);
        uploader.select(vec![first.clone()]).unwrap();

        let _ = uploader.select(vec![pdf("huge.pdf", MAX_FILE_SIZE + 1)]);

        assert_eq!(uploader.selected(), Some(&first));
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_new_selection_replaces_held_file() {
        let (mut uploader, calls) = recording_uploader();
        uploader.select(vec![pdf("first.pdf", 10)]).unwrap();
        uploader.select(vec![pdf("second.pdf", 10)]).unwrap();

        assert_eq!(uploader.selected().unwrap().name, "second.pdf");
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_remove_resets_and_reports_none() {
        let (mut uploader, calls) = recording_uploader();
        uploader.select(vec![pdf("cv.pdf", 10)]).unwrap();
        uploader.remove();

        assert_eq!(uploader.state(), &UploaderState::Empty);
        assert_eq!(calls.lock().unwrap().last(), Some(&None));
    }

    #[test]
    fn test_pdf_extension_accepted_without_mime() {
        let (mut uploader, _) = recording_uploader();
        uploader
            .select(vec![UploadFile::new("Resume.PDF", "", "x")])
            .unwrap();
        assert!(uploader.selected().is_some());
    }

    #[test]
    fn test_view_shows_prompt_or_file() {
        let (mut uploader, _) = recording_uploader();
        assert_eq!(
            uploader.view(),
            UploaderView::Empty {
                prompt: "PDF (max 20 MB)".to_string()
            }
        );

        uploader.select(vec![pdf("cv.pdf", 1536)]).unwrap();
        assert_eq!(
            uploader.view(),
            UploaderView::Selected {
                name: "cv.pdf".to_string(),
                size: "1.5 KB".to_string()
            }
        );
    }

    #[test]
    fn test_take_empties_slot() {
        let (mut uploader, calls) = recording_uploader();
        uploader.select(vec![pdf("cv.pdf", 10)]).unwrap();
        let taken = uploader.take().unwrap();
        assert_eq!(taken.name, "cv.pdf");
        assert!(uploader.selected().is_none());
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 Bytes");
        assert_eq!(format_size(512), "512 Bytes");
        assert_eq!(format_size(1024), "1 KB");
        assert_eq!(format_size(20 * 1024 * 1024), "20 MB");
        assert_eq!(format_size(1_288_490_189), "1.2 GB");
    }
}
