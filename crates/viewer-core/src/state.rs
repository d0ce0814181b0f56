use crate::config::ViewerConfig;
use crate::error::ViewerError;
use pdf_engine::Rotation;
use std::fmt;

/// Lifecycle of the document slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPhase {
    #[default]
    Unloaded,
    Loading,
    PasswordRequired,
    LoadError,
    Loaded,
}

impl fmt::Display for LoadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::PasswordRequired => "password required",
            Self::LoadError => "load error",
            Self::Loaded => "loaded",
        })
    }
}

/// Enablement of the previous/next buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavControls {
    pub previous_enabled: bool,
    pub next_enabled: bool,
}

impl NavControls {
    pub fn for_page(current_page: u32, page_count: u32) -> Self {
        Self { previous_enabled: current_page > 1, next_enabled: current_page < page_count }
    }
}

/// Page, zoom and rotation of the loaded document.
///
/// `current_page` is 1-based and stays within `1..=page_count`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    current_page: u32,
    page_count: u32,
    zoom: f32,
    rotation: Rotation,
}

impl ViewState {
    /// State for a freshly opened document. `page_count` must be non-zero.
    pub fn new(page_count: u32, zoom: f32) -> Self {
        Self { current_page: 1, page_count: page_count.max(1), zoom, rotation: Rotation::Deg0 }
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn nav_controls(&self) -> NavControls {
        NavControls::for_page(self.current_page, self.page_count)
    }

    /// Moves to `page`, rejecting targets outside `1..=page_count`.
    pub fn go_to(&mut self, page: u32) -> Result<(), ViewerError> {
        if page == 0 || page > self.page_count {
            return Err(ViewerError::PageOutOfRange { page, page_count: self.page_count });
        }
        self.current_page = page;
        Ok(())
    }

    /// Sets the zoom, clamped into the configured bounds. Returns whether it
    /// changed.
    pub fn set_zoom(&mut self, factor: f32, config: &ViewerConfig) -> Result<bool, ViewerError> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(ViewerError::InvalidZoom(factor));
        }

        let zoom = config.clamp_zoom(factor);
        if (zoom - self.zoom).abs() < f32::EPSILON {
            return Ok(false);
        }

        self.zoom = zoom;
        Ok(true)
    }

    pub fn rotate(&mut self) -> Rotation {
        self.rotation = self.rotation.next();
        self.rotation
    }
}
