// Resume feedback prompt templates.

pub const FEEDBACK_SYSTEM: &str = "\
You are an expert in ATS (Applicant Tracking System) and resume analysis. \
Rate resumes honestly: a weak resume gets a low score.";

pub const FEEDBACK_PROMPT: &str = r#"Analyze and rate the resume below, and suggest how to improve it.
Be thorough and detailed. Point out mistakes and areas for improvement; when there is a lot to improve, score accordingly.
If a job description is provided, take it into consideration.

JOB TITLE:
{job_title}

JOB DESCRIPTION:
{job_description}

RESUME TEXT:
{resume_text}

OUTPUT SCHEMA (return exactly this structure, every score is an integer 0-100):
{
  "overallScore": number,
  "ATS": {
    "score": number,
    "tips": [{"type": "good" | "improve", "tip": "string"}]
  },
  "toneAndStyle": {
    "score": number,
    "tips": [{"type": "good" | "improve", "tip": "short title", "explanation": "string"}]
  },
  "content": {
    "score": number,
    "tips": [{"type": "good" | "improve", "tip": "short title", "explanation": "string"}]
  },
  "structure": {
    "score": number,
    "tips": [{"type": "good" | "improve", "tip": "short title", "explanation": "string"}]
  },
  "skills": {
    "score": number,
    "tips": [{"type": "good" | "improve", "tip": "short title", "explanation": "string"}]
  }
}

Give 3-4 tips per category."#;

const NOT_PROVIDED: &str = "(not provided)";

pub fn build_feedback_prompt(
    resume_text: &str,
    job_title: Option<&str>,
    job_description: Option<&str>,
) -> String {
    let or_missing = |s: Option<&str>| {
        s.map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(NOT_PROVIDED)
            .to_string()
    };
    FEEDBACK_PROMPT
        .replace("{job_title}", &or_missing(job_title))
        .replace("{job_description}", &or_missing(job_description))
        .replace("{resume_text}", resume_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_fills_placeholders() {
        let prompt = build_feedback_prompt("Jane Doe\nRust", Some("Engineer"), None);
        assert!(prompt.contains("JOB TITLE:\nEngineer"));
        assert!(prompt.contains("JOB DESCRIPTION:\n(not provided)"));
        assert!(prompt.contains("RESUME TEXT:\nJane Doe\nRust"));
        assert!(!prompt.contains("{job_title}"));
    }

    #[test]
    fn test_blank_fields_count_as_missing() {
        let prompt = build_feedback_prompt("x", Some("   "), Some(""));
        assert!(prompt.contains("JOB TITLE:\n(not provided)"));
    }
}
