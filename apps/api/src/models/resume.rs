use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::platform::KvItem;

pub const RESUME_KEY_PREFIX: &str = "resume:";

pub fn resume_key(id: &str) -> String {
    format!("{RESUME_KEY_PREFIX}{id}")
}

/// A stored resume record, serialized as JSON text under `resume:<id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resume {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_description: Option<String>,
    pub image_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_path: Option<String>,
    #[serde(default)]
    pub feedback: FeedbackState,
}

impl Resume {
    pub fn overall_score(&self) -> u32 {
        match &self.feedback {
            FeedbackState::Ready(feedback) => feedback.overall_score,
            FeedbackState::Pending(_) => 0,
        }
    }
}

/// Analysis output, or an empty string while analysis has not finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeedbackState {
    Ready(Feedback),
    Pending(String),
}

impl Default for FeedbackState {
    fn default() -> Self {
        FeedbackState::Pending(String::new())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub overall_score: u32,
    #[serde(rename = "ATS", default)]
    pub ats: Category,
    #[serde(default)]
    pub tone_and_style: Category,
    #[serde(default)]
    pub content: Category,
    #[serde(default)]
    pub structure: Category,
    #[serde(default)]
    pub skills: Category,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub tips: Vec<Tip>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tip {
    #[serde(rename = "type")]
    pub kind: TipKind,
    pub tip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipKind {
    Good,
    Improve,
}

impl Feedback {
    /// Clamps every score into 0–100; model output is not trusted to.
    pub fn clamped(mut self) -> Self {
        self.overall_score = self.overall_score.min(100);
        for category in [
            &mut self.ats,
            &mut self.tone_and_style,
            &mut self.content,
            &mut self.structure,
            &mut self.skills,
        ] {
            category.score = category.score.min(100);
        }
        self
    }
}

/// Parses listed records into resumes. Records that fail to parse are logged
/// and skipped.
pub fn parse_resumes(items: &[KvItem]) -> Vec<Resume> {
    items
        .iter()
        .filter_map(|item| match serde_json::from_str::<Resume>(&item.value) {
            Ok(resume) => Some(resume),
            Err(e) => {
                warn!("Skipping unreadable record {}: {e}", item.key);
                None
            }
        })
        .collect()
}
