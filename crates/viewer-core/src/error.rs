use pdf_engine::PdfEngineError;
use pageview_scheduler::WorkerError;

/// Errors reported to the user by [`crate::ViewerController`].
///
/// Input errors (`NotPdf`, `PageOutOfRange`, `EmptySearch`, ...) never change
/// viewer state.
#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("Please upload a PDF file.")]
    NotPdf { content_type: Option<String> },
    #[error("no document is loaded")]
    NotLoaded,
    #[error("page {page} is out of range (1-{page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("invalid zoom factor {0}")]
    InvalidZoom(f32),
    #[error("no bookmark at position {index} ({count} bookmarks)")]
    BookmarkOutOfRange { index: usize, count: usize },
    #[error("Please enter a search term.")]
    EmptySearch,
    #[error("invalid search pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
    #[error("password entry cancelled")]
    PasswordCancelled,
    #[error("failed to load PDF: {0}")]
    Load(#[source] PdfEngineError),
    #[error("rendering engine error: {0}")]
    Engine(#[from] PdfEngineError),
    #[error("rendering engine is unavailable (a previous call panicked)")]
    EnginePoisoned,
    #[error(transparent)]
    Worker(#[from] WorkerError),
    #[error("timed out waiting for render to finish")]
    RenderTimeout,
    #[error("failed to write file: {0}")]
    Io(#[from] std::io::Error),
}

impl ViewerError {
    /// Whether the error came from bad user input rather than the engine.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::NotPdf { .. }
                | Self::PageOutOfRange { .. }
                | Self::InvalidZoom(_)
                | Self::BookmarkOutOfRange { .. }
                | Self::EmptySearch
                | Self::InvalidPattern(_)
        )
    }
}
