use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analysis::AnalysisRequest;
use crate::errors::AppError;
use crate::models::resume::{resume_key, Feedback, FeedbackState, Resume};
use crate::platform::{BlobStorage, KeyValue};
use crate::pages::{require_auth, SessionToken};
use crate::pdf::Conversion;
use crate::state::AppState;
use crate::uploader::{self, UploadFile, Uploader, UploaderView, PDF_MIME};

pub const STATUS_UPLOADING_FILE: &str = "Uploading the file...";
pub const STATUS_CONVERTING: &str = "Converting to image...";
pub const STATUS_UPLOADING_IMAGE: &str = "Uploading the image...";
pub const STATUS_PREPARING: &str = "Preparing data...";
pub const STATUS_ANALYZING: &str = "Analyzing...";
pub const STATUS_COMPLETE: &str = "Analysis complete, redirecting...";

/// Fields of the upload form.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub company_name: Option<String>,
    pub job_title: Option<String>,
    pub job_description: Option<String>,
    pub files: Vec<UploadFile>,
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let malformed = |e: axum::extract::multipart::MultipartError| {
            AppError::Validation(format!("Malformed upload: {e}"))
        };

        let mut form = UploadForm::default();
        while let Some(field) = multipart.next_field().await.map_err(malformed)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "company-name" => form.company_name = non_blank(field.text().await.map_err(malformed)?),
                "job-title" => form.job_title = non_blank(field.text().await.map_err(malformed)?),
                "job-description" => {
                    form.job_description = non_blank(field.text().await.map_err(malformed)?)
                }
                "file" => {
                    let file_name = field.file_name().unwrap_or("resume.pdf").to_string();
                    let mime = field.content_type().unwrap_or_default().to_string();
                    let bytes = field.bytes().await.map_err(malformed)?;
                    form.files.push(UploadFile::new(file_name, mime, bytes));
                }
                other => debug!("Ignoring form field '{other}'"),
            }
        }
        Ok(form)
    }
}

fn non_blank(s: String) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Offers the posted files to an uploader and returns the one it accepted.
pub fn select_resume(files: Vec<UploadFile>) -> Option<UploadFile> {
    let mut uploader = Uploader::new(|file| {
        if let Some(file) = file {
            debug!("Selected {} ({} bytes)", file.name, file.size());
        }
    });
    if let Err(rejection) = uploader.select(files) {
        debug!("Upload rejected: {rejection}");
    }
    uploader.take()
}

/// Status texts shown while a resume is processed, in order.
#[derive(Debug, Default, Serialize)]
pub struct StatusLog(Vec<String>);

impl StatusLog {
    fn push(&mut self, status: impl Into<String>) {
        let status = status.into();
        info!("Upload status: {status}");
        self.0.push(status);
    }

    pub fn entries(&self) -> &[String] {
        &self.0
    }
}

#[derive(Debug, Serialize)]
pub struct UploadOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub status: StatusLog,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadOutcome {
    fn failed(mut status: StatusLog, id: Option<String>, error: String) -> Self {
        status.push(format!("Error: {error}"));
        Self {
            id,
            status,
            redirect: None,
            error: Some(error),
        }
    }
}

/// Stores the PDF, renders and stores page one, writes the resume record,
/// analyzes it and writes the feedback back. Each step is recorded in the
/// status log; the first failure ends the run with an `Error:` status.
pub async fn process_upload(state: &AppState, form: UploadForm, file: UploadFile) -> UploadOutcome {
    let mut status = StatusLog::default();
    let id = Uuid::new_v4().to_string();
    let fs = &state.platform.fs;
    let kv = &state.platform.kv;

    status.push(STATUS_UPLOADING_FILE);
    let resume_path = format!("resumes/{id}.pdf");
    if let Err(e) = fs.write(&resume_path, file.bytes.clone(), PDF_MIME).await {
        warn!("Failed to store {}: {e}", file.name);
        return UploadOutcome::failed(status, None, "Failed to upload file".to_string());
    }

    status.push(STATUS_CONVERTING);
    let (image_url, image) = match state.rasterizer.render(&file).await {
        Conversion::Ready { image_url, file } => (image_url, file),
        Conversion::Failed { error } => {
            discard(fs.as_ref(), &resume_path).await;
            return UploadOutcome::failed(status, None, error);
        }
    };

    status.push(STATUS_UPLOADING_IMAGE);
    let image_path = format!("images/{id}.png");
    let stored = fs.write(&image_path, image.bytes, &image.mime).await;
    // the stored copy replaces the in-memory one from here on
    state.object_urls.revoke(&image_url);
    if let Err(e) = stored {
        warn!("Failed to store {}: {e}", image.name);
        discard(fs.as_ref(), &resume_path).await;
        return UploadOutcome::failed(status, None, "Failed to upload image".to_string());
    }

    status.push(STATUS_PREPARING);
    let mut resume = Resume {
        id: id.clone(),
        company_name: form.company_name,
        job_title: form.job_title,
        job_description: form.job_description,
        image_path,
        resume_path: Some(resume_path),
        feedback: FeedbackState::default(),
    };
    if let Err(e) = save(kv.as_ref(), &resume).await {
        warn!("Failed to save resume {id}: {e}");
        return UploadOutcome::failed(status, None, "Failed to save resume".to_string());
    }

    status.push(STATUS_ANALYZING);
    let feedback = match analyze(state, &resume, &file).await {
        Ok(feedback) => feedback,
        Err(e) => {
            warn!("Analysis of resume {id} failed: {e}");
            return UploadOutcome::failed(status, Some(id), format!("Failed to analyze resume: {e}"));
        }
    };

    resume.feedback = FeedbackState::Ready(feedback);
    if let Err(e) = save(kv.as_ref(), &resume).await {
        warn!("Failed to save feedback for resume {id}: {e}");
        return UploadOutcome::failed(status, Some(id), "Failed to save feedback".to_string());
    }

    status.push(STATUS_COMPLETE);
    UploadOutcome {
        redirect: Some(format!("/resume/{id}")),
        id: Some(id),
        status,
        error: None,
    }
}

/// Removes a stored file no record will point at.
async fn discard(fs: &dyn BlobStorage, path: &str) {
    if let Err(e) = fs.delete(path).await {
        warn!("Failed to remove orphaned {path}: {e}");
    }
}

async fn save(kv: &dyn KeyValue, resume: &Resume) -> Result<(), AppError> {
    let json = serde_json::to_string(resume).map_err(|e| AppError::Internal(e.into()))?;
    kv.set(&resume_key(&resume.id), &json).await?;
    Ok(())
}

async fn analyze(
    state: &AppState,
    resume: &Resume,
    file: &UploadFile,
) -> Result<Feedback, AppError> {
    state
        .analyzer
        .analyze(AnalysisRequest {
            resume_pdf: &file.bytes,
            job_title: resume.job_title.as_deref(),
            job_description: resume.job_description.as_deref(),
        })
        .await
}

#[derive(Debug, Serialize)]
pub struct UploadPageView {
    pub heading: &'static str,
    pub subheading: &'static str,
    pub fields: [&'static str; 4],
    pub uploader: UploaderView,
}

/// GET /upload
pub async fn handle_upload_page(
    State(state): State<AppState>,
    session: SessionToken,
) -> Result<Json<UploadPageView>, AppError> {
    require_auth(&state.platform, &session, "/upload").await?;
    Ok(Json(UploadPageView {
        heading: "Smart feedback for your dream job",
        subheading: "Drop your resume for an ATS score and improvement tips",
        fields: ["company-name", "job-title", "job-description", "file"],
        uploader: UploaderView::Empty {
            prompt: uploader::prompt(),
        },
    }))
}

/// POST /upload
pub async fn handle_upload(
    State(state): State<AppState>,
    session: SessionToken,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadOutcome>), AppError> {
    require_auth(&state.platform, &session, "/upload").await?;

    let mut form = UploadForm::read(multipart).await?;
    let file = select_resume(std::mem::take(&mut form.files)).ok_or_else(|| {
        AppError::Validation(format!("Upload a single PDF resume, {}", uploader::prompt()))
    })?;

    let outcome = process_upload(&state, form, file).await;
    let code = if outcome.error.is_some() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::OK
    };
    Ok((code, Json(outcome)))
}
