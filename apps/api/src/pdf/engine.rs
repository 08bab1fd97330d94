use image::DynamicImage;
use pdfium_render::prelude::*;

use super::RasterError;

/// Renders the first page of a PDF document to pixels.
///
/// Implementations are blocking; callers run them on a blocking thread.
pub trait PdfEngine: Send + Sync {
    fn render_first_page(&self, bytes: &[u8], scale: f32) -> Result<DynamicImage, RasterError>;
}

pub struct PdfiumEngine {
    pdfium: Pdfium,
}

impl PdfiumEngine {
    pub fn new(pdfium: Pdfium) -> Self {
        Self { pdfium }
    }
}

impl PdfEngine for PdfiumEngine {
    fn render_first_page(&self, bytes: &[u8], scale: f32) -> Result<DynamicImage, RasterError> {
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| RasterError::Document(e.to_string()))?;

        let pages = document.pages();
        let page_count = pages.len();
        tracing::debug!("PDF loaded, total pages: {page_count}");
        if page_count == 0 {
            return Err(RasterError::NoPages);
        }

        let page = pages
            .get(0)
            .map_err(|e| RasterError::Document(format!("page 1 access failed: {e}")))?;

        let config = PdfRenderConfig::new()
            .scale_page_by_factor(scale)
            .set_text_smoothing(true)
            .set_image_smoothing(true)
            .set_path_smoothing(true)
            .render_annotations(true)
            .render_form_data(true);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| RasterError::Render(e.to_string()))?;
        tracing::debug!(
            "Page 1 rendered at {}x{}",
            bitmap.width(),
            bitmap.height()
        );

        Ok(bitmap.as_image())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::loader::LibrarySource;
    use crate::pdf::PdfiumSource;

    /// A hand-written document with the given page sizes in points, with a
    /// correct cross-reference table.
    fn minimal_pdf(pages: &[(u32, u32)]) -> Vec<u8> {
        let page_ids: Vec<usize> = (0..pages.len()).map(|i| i + 3).collect();
        let kids = page_ids
            .iter()
            .map(|id| format!("{id} 0 R"))
            .collect::<Vec<_>>()
            .join(" ");

        let mut objects = vec![
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            format!("<< /Type /Pages /Kids [{kids}] /Count {} >>", pages.len()),
        ];
        for (width, height) in pages {
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {width} {height}] >>"
            ));
        }

        let mut pdf = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, object) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n{object}\nendobj\n", i + 1).as_bytes());
        }

        let xref_at = pdf.len();
        pdf.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
        pdf.extend_from_slice(b"0000000000 65535 f \n");
        for offset in offsets {
            pdf.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        pdf.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
                objects.len() + 1
            )
            .as_bytes(),
        );
        pdf
    }

    // One test binds the library once; PDFium is process-wide.
    #[tokio::test]
    async fn test_pdfium_renders_first_page_or_reports_failure() {
        let handle = match PdfiumSource::new(None).load().await {
            Ok(handle) => handle,
            Err(e) => {
                eprintln!("PDFium not available, skipping: {e}");
                return;
            }
        };
        let engine = handle.engine();

        // page one only, scaled by the factor
        let two_pages = minimal_pdf(&[(200, 100), (50, 50)]);
        let image = engine.render_first_page(&two_pages, 4.0).unwrap();
        assert_eq!((image.width(), image.height()), (800, 400));

        let empty = minimal_pdf(&[]);
        let err = engine.render_first_page(&empty, 4.0).unwrap_err();
        assert!(matches!(err, RasterError::NoPages), "got {err:?}");

        let err = engine.render_first_page(b"not a pdf at all", 4.0).unwrap_err();
        assert!(matches!(err, RasterError::Document(_)), "got {err:?}");
    }

    #[test]
    fn test_minimal_pdf_offsets_point_at_objects() {
        let pdf = minimal_pdf(&[(200, 100)]);
        let text = String::from_utf8(pdf).unwrap();
        let xref = text.find("xref\n").unwrap();
        let entries: Vec<usize> = text[xref..]
            .lines()
            .skip(3)
            .take(3)
            .map(|line| line[..10].parse().unwrap())
            .collect();
        for (i, offset) in entries.iter().enumerate() {
            assert!(text[*offset..].starts_with(&format!("{} 0 obj", i + 1)));
        }
    }
}
