//! Resume feedback: a trait seam in front of whatever produces the scores.
//!
//! Default: `LlmFeedbackAnalyzer` (Claude via `llm_client`).
//! `AppState` holds an `Arc<dyn FeedbackAnalyzer>`; tests swap in a fixed one.

pub mod prompts;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info};

use crate::errors::AppError;
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::LlmClient;
use crate::models::resume::Feedback;
use crate::pdf::extract_text;
use prompts::{build_feedback_prompt, FEEDBACK_SYSTEM};

/// What the analyzer gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisRequest<'a> {
    pub resume_pdf: &'a Bytes,
    pub job_title: Option<&'a str>,
    pub job_description: Option<&'a str>,
}

#[async_trait]
pub trait FeedbackAnalyzer: Send + Sync {
    async fn analyze(&self, request: AnalysisRequest<'_>) -> Result<Feedback, AppError>;
}

pub struct LlmFeedbackAnalyzer {
    llm: LlmClient,
}

impl LlmFeedbackAnalyzer {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl FeedbackAnalyzer for LlmFeedbackAnalyzer {
    async fn analyze(&self, request: AnalysisRequest<'_>) -> Result<Feedback, AppError> {
        let text = extract_text(request.resume_pdf.clone())
            .await
            .map_err(|e| AppError::Validation(format!("Could not read the resume: {e:#}")))?;
        if text.trim().is_empty() {
            return Err(AppError::Validation(
                "The resume has no readable text to analyze".to_string(),
            ));
        }
        debug!("Extracted {} characters of resume text", text.len());

        let prompt = build_feedback_prompt(
            &text,
            request.job_title,
            request.job_description,
        );
        let system = format!("{FEEDBACK_SYSTEM} {JSON_ONLY_SYSTEM}");
        let feedback: Feedback = self
            .llm
            .call_json(&prompt, &system)
            .await
            .map_err(|e| AppError::Llm(format!("Failed to analyze resume: {e}")))?;

        let feedback = feedback.clamped();
        info!("Resume analyzed, overall score {}", feedback.overall_score);
        Ok(feedback)
    }
}
