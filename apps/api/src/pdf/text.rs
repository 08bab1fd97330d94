use anyhow::{Context, Result};
use bytes::Bytes;

/// Extracts the plain text of a PDF for analysis. Runs on a blocking thread.
pub async fn extract_text(bytes: Bytes) -> Result<String> {
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .context("text extraction task failed")?
        .context("Failed to extract text from PDF")?;

    Ok(normalize_whitespace(&text))
}

/// Collapses runs of blank lines and trailing spaces left by the extractor.
fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines().map(str::trim_end) {
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_blank_lines() {
        let raw = "Jane Doe   \n\n\n\nEngineer\n  \nRust\n\n";
        assert_eq!(normalize_whitespace(raw), "Jane Doe\n\nEngineer\n\nRust");
    }

    #[tokio::test]
    async fn test_garbage_is_an_error() {
        assert!(extract_text(Bytes::from_static(b"not a pdf")).await.is_err());
    }
}
