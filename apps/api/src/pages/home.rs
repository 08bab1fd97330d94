use std::sync::atomic::{AtomicBool, Ordering};

use axum::{extract::State, Json};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use crate::errors::AppError;
use crate::models::resume::{parse_resumes, Resume, RESUME_KEY_PREFIX};
use crate::pages::{require_auth, SessionToken};
use crate::platform::{KeyValue, PlatformError};
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq)]
pub enum Listing {
    Loading,
    Empty,
    Loaded(Vec<Resume>),
}

/// The home page's listing state.
///
/// Loading starts as soon as the page exists. A page that has been disposed
/// ignores a listing that completes afterwards.
pub struct HomePage {
    listing: Mutex<Listing>,
    disposed: AtomicBool,
}

impl Default for HomePage {
    fn default() -> Self {
        Self::new()
    }
}

impl HomePage {
    pub fn new() -> Self {
        Self {
            listing: Mutex::new(Listing::Loading),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn listing(&self) -> Listing {
        self.listing.lock().clone()
    }

    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }

    /// Issues the single listing call and parses every record.
    pub async fn load(&self, kv: &dyn KeyValue) -> Result<(), PlatformError> {
        *self.listing.lock() = Listing::Loading;

        let items = kv.list(&format!("{RESUME_KEY_PREFIX}*"), true).await?;
        let resumes = parse_resumes(&items);

        if self.disposed.load(Ordering::SeqCst) {
            debug!("Home page disposed before listing finished; dropping {} resumes", resumes.len());
            return Ok(());
        }

        info!("Listed {} resumes", resumes.len());
        *self.listing.lock() = if resumes.is_empty() {
            Listing::Empty
        } else {
            Listing::Loaded(resumes)
        };
        Ok(())
    }

    pub fn view(&self) -> HomeView {
        let listing = self.listing.lock();
        let (loading, cards) = match &*listing {
            Listing::Loading => (true, Vec::new()),
            Listing::Empty => (false, Vec::new()),
            Listing::Loaded(resumes) => (false, resumes.iter().map(ResumeCard::from).collect()),
        };
        let empty = !loading && cards.is_empty();

        HomeView {
            heading: "Track Your Application & Resume Ratings",
            subheading: if empty {
                "No resumes found. Upload your first resume to get feedback"
            } else {
                "Review your submissions and check AI-powered feedback."
            },
            loading,
            upload_link: empty.then_some("/upload"),
            resumes: cards,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HomeView {
    pub heading: &'static str,
    pub subheading: &'static str,
    pub loading: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_link: Option<&'static str>,
    pub resumes: Vec<ResumeCard>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResumeCard {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    pub score: u32,
    pub image_url: String,
    pub link: String,
}

impl From<&Resume> for ResumeCard {
    fn from(resume: &Resume) -> Self {
        let company = resume.company_name.clone().filter(|s| !s.is_empty());
        let job = resume.job_title.clone().filter(|s| !s.is_empty());
        let (title, subtitle) = match (company, job) {
            (Some(company), job) => (company, job),
            (None, Some(job)) => (job, None),
            (None, None) => ("Resume".to_string(), None),
        };

        Self {
            id: resume.id.clone(),
            title,
            subtitle,
            score: resume.overall_score(),
            image_url: format!("/files/{}", resume.image_path),
            link: format!("/resume/{}", resume.id),
        }
    }
}

/// GET /
pub async fn handle_home(
    State(state): State<AppState>,
    session: SessionToken,
) -> Result<Json<HomeView>, AppError> {
    require_auth(&state.platform, &session, "/").await?;

    let page = HomePage::new();
    page.load(state.platform.kv.as_ref()).await?;
    Ok(Json(page.view()))
}
