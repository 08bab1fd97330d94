use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use image::{DynamicImage, ImageFormat};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::loader::LibraryLoader;
use super::RasterError;
use crate::object_url::ObjectUrls;
use crate::uploader::UploadFile;

/// Page one is rendered at 4x so resume text stays legible once the image is
/// scaled down for display.
pub const RENDER_SCALE: f32 = 4.0;

pub const PNG_MIME: &str = "image/png";

/// The PNG derived from an uploaded PDF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageFile {
    pub name: String,
    pub mime: String,
    #[serde(skip)]
    pub bytes: Bytes,
    pub size: usize,
}

/// Outcome of one rasterization. Failures are values, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversion {
    Ready { image_url: String, file: ImageFile },
    Failed { error: String },
}

impl Conversion {
    /// Empty on failure.
    pub fn image_url(&self) -> &str {
        match self {
            Conversion::Ready { image_url, .. } => image_url,
            Conversion::Failed { .. } => "",
        }
    }

    pub fn file(&self) -> Option<&ImageFile> {
        match self {
            Conversion::Ready { file, .. } => Some(file),
            Conversion::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Conversion::Ready { .. } => None,
            Conversion::Failed { error } => Some(error),
        }
    }
}

impl Serialize for Conversion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Shape<'a> {
            image_url: &'a str,
            file: Option<&'a ImageFile>,
            #[serde(skip_serializing_if = "Option::is_none")]
            error: Option<&'a str>,
        }

        Shape {
            image_url: self.image_url(),
            file: self.file(),
            error: self.error(),
        }
        .serialize(serializer)
    }
}

/// `resume.pdf` → `resume.png`. Only a trailing `.pdf` (any case) is replaced.
pub fn image_file_name(pdf_name: &str) -> String {
    let base = match pdf_name.len().checked_sub(4) {
        Some(cut) if pdf_name.is_char_boundary(cut)
            && pdf_name[cut..].eq_ignore_ascii_case(".pdf") =>
        {
            &pdf_name[..cut]
        }
        _ => pdf_name,
    };
    format!("{base}.png")
}

pub struct PageRasterizer {
    loader: Arc<LibraryLoader>,
    object_urls: ObjectUrls,
    scale: f32,
}

impl PageRasterizer {
    pub fn new(loader: Arc<LibraryLoader>, object_urls: ObjectUrls) -> Self {
        Self {
            loader,
            object_urls,
            scale: RENDER_SCALE,
        }
    }

    pub fn loader(&self) -> &LibraryLoader {
        &self.loader
    }

    /// Renders page one of `file` to a PNG and registers it under an object
    /// URL. The caller revokes the URL once the image is no longer shown.
    pub async fn render(&self, file: &UploadFile) -> Conversion {
        self.render_for(file, None).await
    }

    /// Like `render`, with the object URL owned by the `owner` session: only
    /// that session can fetch it, and signing out releases it.
    pub async fn render_for(&self, file: &UploadFile, owner: Option<&str>) -> Conversion {
        info!("Starting PDF to image conversion for {}", file.name);

        let png = match self.rasterize(file).await {
            Ok(png) => png,
            Err(e) => {
                warn!("PDF conversion failed for {}: {e}", file.name);
                let error = match e {
                    RasterError::Encode(_) => format!("Failed to create image blob: {e}"),
                    _ => format!("Failed to convert PDF: {e}"),
                };
                return Conversion::Failed { error };
            }
        };

        let image_url = self.object_urls.create(owner, PNG_MIME, png.clone());
        let file = ImageFile {
            name: image_file_name(&file.name),
            mime: PNG_MIME.to_string(),
            size: png.len(),
            bytes: png,
        };
        debug!("Conversion ready: {} at {image_url}", file.name);

        Conversion::Ready { image_url, file }
    }

    async fn rasterize(&self, file: &UploadFile) -> Result<Bytes, RasterError> {
        let handle = self.loader.ensure_loaded().await?;

        let engine = handle.engine();
        let bytes = file.bytes.clone();
        let scale = self.scale;
        let image = tokio::task::spawn_blocking(move || engine.render_first_page(&bytes, scale))
            .await
            .map_err(|e| RasterError::Task(e.to_string()))??;

        tokio::task::spawn_blocking(move || encode_png(&image))
            .await
            .map_err(|e| RasterError::Task(e.to_string()))?
    }
}

fn encode_png(image: &DynamicImage) -> Result<Bytes, RasterError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(RasterError::Encode("rendered page is empty".to_string()));
    }
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| RasterError::Encode(e.to_string()))?;
    Ok(Bytes::from(png))
}
