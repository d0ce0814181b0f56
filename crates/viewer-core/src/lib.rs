//! Viewer state and controller for the page viewer.
//!
//! [`ViewerController`] is the single owner of everything the user sees: the
//! loaded document, the current page, zoom and rotation, bookmarks,
//! thumbnails and appearance settings. Renders are funneled through
//! [`pageview_scheduler::RenderScheduler`] so only one full-page render runs at
//! a time and the latest request always wins.

mod appearance;
mod bookmarks;
mod config;
mod controller;
mod error;
mod input;
mod search;
mod state;
mod thumbnails;

pub use appearance::{AccentColor, Appearance, UnknownAccent};
pub use bookmarks::Bookmarks;
pub use config::{ConfigError, ViewerConfig};
pub use controller::{LoadSummary, PageRender, RenderedFrame, SharedEngine, ViewerController};
pub use error::ViewerError;
pub use input::{
    content_type_for, FileInput, NoPassword, PasswordList, PasswordPrompt, PasswordRequest,
    PDF_CONTENT_TYPE,
};
pub use search::{page_matches, page_text, SearchOutcome, SearchQuery};
pub use state::{LoadPhase, NavControls, ViewState};
pub use thumbnails::Thumbnail;

pub use pageview_scheduler::SchedulerStats;
pub use pdf_engine::{DocumentMetadata, PageSize, Rotation};
