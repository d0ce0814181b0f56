//! Viewer configuration.
//!
//! Settings can be loaded from a JSON file, overridden from environment
//! variables, or built programmatically. Every loader passes the result
//! through [`ViewerConfig::validated`] so the zoom bounds stay consistent.

use crate::appearance::AccentColor;
use pdf_engine::ThumbnailSize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

/// Zoom, thumbnail and appearance defaults for a viewer session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Zoom applied when a document is loaded
    pub initial_zoom: f32,
    /// Lowest zoom factor the viewer will accept
    pub zoom_floor: f32,
    /// Highest zoom factor the viewer will accept.
    ///
    /// Documents have no upper zoom limit of their own. This bound caps the
    /// size of the rendered page surface; `zoom_in` stops at it without an
    /// error and `set_zoom` clamps to it. Raise it to allow deeper zoom.
    pub zoom_ceiling: f32,
    /// Increment used by zoom in/out
    pub zoom_step: f32,
    /// Thumbnail width in pixels
    pub thumbnail_width: u32,
    /// Thumbnail height in pixels
    pub thumbnail_height: u32,
    /// Start in night mode
    pub night_mode: bool,
    /// Button colour
    pub accent: AccentColor,
    /// `tracing` filter directive used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            initial_zoom: 1.5,
            zoom_floor: 1.0,
            zoom_ceiling: 4.0,
            zoom_step: 0.25,
            thumbnail_width: 120,
            thumbnail_height: 160,
            night_mode: false,
            accent: AccentColor::default(),
            log_level: "warn".to_owned(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] io::Error),
    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid value for {0}")]
    InvalidValue(String),
}

impl ViewerConfig {
    /// Sets the zoom used for freshly loaded documents.
    pub fn with_initial_zoom(mut self, zoom: f32) -> Self {
        self.initial_zoom = zoom;
        self
    }

    /// Sets the zoom bounds.
    pub fn with_zoom_bounds(mut self, floor: f32, ceiling: f32) -> Self {
        self.zoom_floor = floor;
        self.zoom_ceiling = ceiling;
        self
    }

    /// Sets the zoom in/out increment.
    pub fn with_zoom_step(mut self, step: f32) -> Self {
        self.zoom_step = step;
        self
    }

    /// Sets the thumbnail size.
    pub fn with_thumbnail_size(mut self, width: u32, height: u32) -> Self {
        self.thumbnail_width = width;
        self.thumbnail_height = height;
        self
    }

    pub fn thumbnail_size(&self) -> ThumbnailSize {
        ThumbnailSize { width_px: self.thumbnail_width, height_px: self.thumbnail_height }
    }

    /// Clamps `zoom` into the configured bounds.
    pub fn clamp_zoom(&self, zoom: f32) -> f32 {
        zoom.clamp(self.zoom_floor, self.zoom_ceiling)
    }

    /// Returns a copy with out-of-range values replaced by defaults.
    ///
    /// - non-positive or non-finite floor falls back to the default floor
    /// - a ceiling below the floor falls back to the default ceiling (or the floor)
    /// - non-positive step falls back to the default step
    /// - the initial zoom is clamped into the bounds
    /// - zero thumbnail dimensions fall back to the defaults
    /// - a blank log level falls back to `warn`
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();

        if !(self.zoom_floor.is_finite() && self.zoom_floor > 0.0) {
            self.zoom_floor = defaults.zoom_floor;
        }
        if !self.zoom_ceiling.is_finite() || self.zoom_ceiling < self.zoom_floor {
            self.zoom_ceiling = defaults.zoom_ceiling.max(self.zoom_floor);
        }
        if !(self.zoom_step.is_finite() && self.zoom_step > 0.0) {
            self.zoom_step = defaults.zoom_step;
        }
        if !self.initial_zoom.is_finite() {
            self.initial_zoom = defaults.initial_zoom;
        }
        self.initial_zoom = self.clamp_zoom(self.initial_zoom);
        if self.thumbnail_width == 0 {
            self.thumbnail_width = defaults.thumbnail_width;
        }
        if self.thumbnail_height == 0 {
            self.thumbnail_height = defaults.thumbnail_height;
        }
        if self.log_level.trim().is_empty() {
            self.log_level = defaults.log_level;
        }

        self
    }

    /// Loads configuration from a JSON file. Missing keys use defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        Ok(config.validated())
    }

    /// Saves configuration to a JSON file, creating parent directories.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    /// Applies environment overrides on top of `self`.
    ///
    /// - `PAGEVIEW_INITIAL_ZOOM`: zoom for freshly loaded documents
    /// - `PAGEVIEW_NIGHT_MODE`: `1`/`true` to start in night mode
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(value) = std::env::var("PAGEVIEW_INITIAL_ZOOM") {
            self.initial_zoom = value
                .parse::<f32>()
                .map_err(|_| ConfigError::InvalidValue("PAGEVIEW_INITIAL_ZOOM".to_owned()))?;
        }

        if let Ok(value) = std::env::var("PAGEVIEW_NIGHT_MODE") {
            self.night_mode = match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => return Err(ConfigError::InvalidValue("PAGEVIEW_NIGHT_MODE".to_owned())),
            };
        }

        Ok(self.validated())
    }
}
