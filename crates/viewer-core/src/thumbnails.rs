//! Thumbnail generation.
//!
//! Each page is rendered independently into its own image, in parallel, at a
//! fixed size that ignores the current zoom and rotation.

use pdf_engine::{DocumentHandle, PdfEngine, RgbaImage, ThumbnailSize};
use rayon::prelude::*;

/// Thumbnail of one page. `image` is `None` when that page failed to render.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    /// 1-based page number
    pub page: u32,
    pub image: Option<RgbaImage>,
}

impl Thumbnail {
    pub fn is_rendered(&self) -> bool {
        self.image.is_some()
    }
}

/// Renders one thumbnail per page. Always returns exactly `page_count`
/// entries, ordered by page.
pub fn generate<E>(
    engine: &E,
    handle: DocumentHandle,
    page_count: u32,
    size: ThumbnailSize,
) -> Vec<Thumbnail>
where
    E: PdfEngine + Sync,
{
    (1..=page_count)
        .into_par_iter()
        .map(|page| {
            let image = match engine.render_thumbnail(handle, page - 1, size) {
                Ok(image) => Some(image),
                Err(err) => {
                    tracing::warn!(page, "thumbnail render failed: {err}");
                    None
                }
            };
            Thumbnail { page, image }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf_engine::fixtures::SamplePdf;
    use pdf_engine::LopdfEngine;

    #[test]
    fn one_thumbnail_per_page_in_order() {
        let mut engine = LopdfEngine::new();
        let bytes = SamplePdf::numbered(5).build().expect("fixture should build");
        let handle = engine.open(&bytes, None).expect("open should succeed");

        let size = ThumbnailSize { width_px: 40, height_px: 60 };
        let thumbnails = generate(&engine, handle, 5, size);

        assert_eq!(thumbnails.len(), 5);
        let pages: Vec<u32> = thumbnails.iter().map(|thumb| thumb.page).collect();
        assert_eq!(pages, vec![1, 2, 3, 4, 5]);
        for thumbnail in &thumbnails {
            let image = thumbnail.image.as_ref().expect("thumbnail should render");
            assert_eq!((image.width(), image.height()), (40, 60));
        }
    }

    #[test]
    fn failed_pages_still_get_an_entry() {
        let mut engine = LopdfEngine::new();
        let bytes = SamplePdf::numbered(2).build().expect("fixture should build");
        let handle = engine.open(&bytes, None).expect("open should succeed");

        let thumbnails = generate(&engine, handle, 3, ThumbnailSize::default());

        assert_eq!(thumbnails.len(), 3);
        assert!(thumbnails[1].is_rendered());
        assert!(!thumbnails[2].is_rendered());
    }
}
