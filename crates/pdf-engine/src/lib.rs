use image::{imageops, ImageBuffer, Rgba};
use lopdf::encryption::DecryptionError;
use lopdf::{Dictionary, Document, Object};
use std::collections::HashMap;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

const ENCRYPT_MARKER: &[u8] = b"/Encrypt";
const PAGE_BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const PAGE_BORDER: Rgba<u8> = Rgba([220, 220, 220, 255]);
/// Used when a page has no readable media box.
const US_LETTER: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    /// Wraps an engine-assigned id. Only engines should mint handles.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSize {
    /// Size of the page once `rotation` has been applied.
    pub fn rotated(self, rotation: Rotation) -> Self {
        if rotation.is_sideways() {
            Self { width_pt: self.height_pt, height_pt: self.width_pt }
        } else {
            self
        }
    }
}

/// Clockwise page rotation in quarter turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(self) -> u16 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    pub fn from_degrees(degrees: u16) -> Option<Self> {
        match degrees % 360 {
            0 => Some(Self::Deg0),
            90 => Some(Self::Deg90),
            180 => Some(Self::Deg180),
            270 => Some(Self::Deg270),
            _ => None,
        }
    }

    /// Advance by one quarter turn, wrapping at 360.
    pub fn next(self) -> Self {
        match self {
            Self::Deg0 => Self::Deg90,
            Self::Deg90 => Self::Deg180,
            Self::Deg180 => Self::Deg270,
            Self::Deg270 => Self::Deg0,
        }
    }

    pub fn is_sideways(self) -> bool {
        matches!(self, Self::Deg90 | Self::Deg270)
    }
}

/// Viewport parameters for a full page render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub page_index: u32,
    pub scale: f32,
    pub rotation: Rotation,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self { page_index: 0, scale: 1.0, rotation: Rotation::Deg0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailSize {
    pub width_px: u32,
    pub height_px: u32,
}

impl Default for ThumbnailSize {
    fn default() -> Self {
        Self { width_px: 120, height_px: 160 }
    }
}

/// Entries of the document information dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creation_date: Option<String>,
    pub mod_date: Option<String>,
}

impl DocumentMetadata {
    /// Label/value pairs in display order, skipping absent entries.
    pub fn entries(&self) -> Vec<(&'static str, &str)> {
        [
            ("Title", &self.title),
            ("Author", &self.author),
            ("Subject", &self.subject),
            ("Keywords", &self.keywords),
            ("CreationDate", &self.creation_date),
            ("ModDate", &self.mod_date),
        ]
        .into_iter()
        .filter_map(|(label, value)| value.as_deref().map(|value| (label, value)))
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("document is password protected")]
    PasswordRequired,
    #[error("incorrect password")]
    IncorrectPassword,
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("backend error: {0}")]
    Backend(String),
}

impl PdfEngineError {
    /// Whether supplying a (different) password could make the open succeed.
    pub fn needs_password(&self) -> bool {
        matches!(self, Self::PasswordRequired | Self::IncorrectPassword)
    }
}

/// Capability set of the external rendering engine.
///
/// Page indices are zero-based at this boundary.
pub trait PdfEngine {
    fn open(&mut self, bytes: &[u8], password: Option<&str>)
        -> Result<DocumentHandle, PdfEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError>;
    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError>;
    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError>;
    fn render_thumbnail(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        target: ThumbnailSize,
    ) -> Result<RgbaImage, PdfEngineError>;
    fn text_content(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<Vec<String>, PdfEngineError>;
    fn metadata(&self, handle: DocumentHandle) -> Result<DocumentMetadata, PdfEngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;
}

#[derive(Debug, Clone)]
struct DocumentRecord {
    document: Document,
    page_sizes: Vec<PageSize>,
}

/// Reference backend: parses structure, text and metadata with `lopdf` and
/// rasterizes blank page surfaces of the right geometry.
#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn load(bytes: &[u8], password: Option<&str>) -> Result<Document, PdfEngineError> {
        let encrypted = bytes.windows(ENCRYPT_MARKER.len()).any(|window| window == ENCRYPT_MARKER);
        if !encrypted {
            return Ok(Document::load_mem(bytes)?);
        }

        let mut doc = Document::load_mem(bytes).map_err(|err| {
            tracing::debug!("encrypted document failed to load: {err}");
            locked(password)
        })?;

        if doc.is_encrypted() {
            // Files with only an owner password open with the empty user password.
            doc.decrypt(password.unwrap_or_default()).map_err(|err| match err {
                lopdf::Error::Decryption(DecryptionError::IncorrectPassword) => locked(password),
                other => PdfEngineError::Parse(other),
            })?;
        }

        Ok(doc)
    }

    fn parse_sizes(doc: &Document) -> Result<Vec<PageSize>, PdfEngineError> {
        let sizes = doc
            .get_pages()
            .into_values()
            .map(|page_id| Ok(media_box(doc.get_dictionary(page_id)?).unwrap_or(US_LETTER)))
            .collect::<Result<Vec<_>, PdfEngineError>>()?;

        if sizes.is_empty() {
            return Err(PdfEngineError::Backend("document has no pages".to_owned()));
        }
        Ok(sizes)
    }

    fn record(&self, handle: DocumentHandle) -> Result<&DocumentRecord, PdfEngineError> {
        self.docs.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }

    fn check_page(record: &DocumentRecord, page_index: u32) -> Result<(), PdfEngineError> {
        let page_count = record.page_sizes.len() as u32;
        if page_index >= page_count {
            return Err(PdfEngineError::PageOutOfRange { page: page_index, page_count });
        }
        Ok(())
    }

    fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
        match doc.trailer.get(b"Info").ok()? {
            Object::Reference(id) => doc.get_dictionary(*id).ok(),
            Object::Dictionary(dict) => Some(dict),
            _ => None,
        }
    }
}

impl PdfEngine for LopdfEngine {
    fn open(
        &mut self,
        bytes: &[u8],
        password: Option<&str>,
    ) -> Result<DocumentHandle, PdfEngineError> {
        let document = Self::load(bytes, password)?;
        let page_sizes = Self::parse_sizes(&document)?;

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        tracing::debug!(handle = handle.raw(), pages = page_sizes.len(), "opened document");
        self.docs.insert(handle, DocumentRecord { document, page_sizes });

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.record(handle)?.page_sizes.len() as u32)
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError> {
        let record = self.record(handle)?;
        record.page_sizes.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: record.page_sizes.len() as u32,
        })
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError> {
        let page_size = self.page_size(handle, request.page_index)?;
        let scale =
            if request.scale <= 0.0 || !request.scale.is_finite() { 1.0 } else { request.scale };

        let width = (page_size.width_pt * scale).round().max(1.0) as u32;
        let height = (page_size.height_pt * scale).round().max(1.0) as u32;

        let mut image = RgbaImage::from_pixel(width, height, PAGE_BACKGROUND);

        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, PAGE_BORDER);
                image.put_pixel(x, height - 1, PAGE_BORDER);
            }
            for y in 0..height {
                image.put_pixel(0, y, PAGE_BORDER);
                image.put_pixel(width - 1, y, PAGE_BORDER);
            }
        }

        Ok(match request.rotation {
            Rotation::Deg0 => image,
            Rotation::Deg90 => imageops::rotate90(&image),
            Rotation::Deg180 => imageops::rotate180(&image),
            Rotation::Deg270 => imageops::rotate270(&image),
        })
    }

    fn render_thumbnail(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        target: ThumbnailSize,
    ) -> Result<RgbaImage, PdfEngineError> {
        let request = RenderRequest { page_index, scale: 0.25, ..Default::default() };
        let page = self.render_page(handle, request)?;

        Ok(imageops::thumbnail(&page, target.width_px.max(1), target.height_px.max(1)))
    }

    fn text_content(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<Vec<String>, PdfEngineError> {
        let record = self.record(handle)?;
        Self::check_page(record, page_index)?;

        let text = record.document.extract_text(&[page_index + 1])?;

        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToOwned::to_owned)
            .collect())
    }

    fn metadata(&self, handle: DocumentHandle) -> Result<DocumentMetadata, PdfEngineError> {
        let record = self.record(handle)?;
        let Some(info) = Self::info_dictionary(&record.document) else {
            return Ok(DocumentMetadata::default());
        };

        let field = |key: &[u8]| {
            info.get(key).ok().and_then(|obj| obj.as_str().ok()).map(decode_text_string)
        };

        Ok(DocumentMetadata {
            title: field(b"Title"),
            author: field(b"Author"),
            subject: field(b"Subject"),
            keywords: field(b"Keywords"),
            creation_date: field(b"CreationDate"),
            mod_date: field(b"ModDate"),
        })
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

/// Error for a document the given password (or its absence) does not unlock.
fn locked(password: Option<&str>) -> PdfEngineError {
    match password {
        Some(_) => PdfEngineError::IncorrectPassword,
        None => PdfEngineError::PasswordRequired,
    }
}

/// Page size from a `/MediaBox [x0 y0 x1 y1]` entry.
fn media_box(page: &Dictionary) -> Option<PageSize> {
    let corners = page
        .get(b"MediaBox")
        .ok()?
        .as_array()
        .ok()?
        .iter()
        .map(|value| value.as_float().ok())
        .collect::<Option<Vec<f32>>>()?;

    let &[left, bottom, right, top] = corners.as_slice() else {
        return None;
    };
    Some(PageSize { width_pt: (right - left).abs(), height_pt: (top - bottom).abs() })
}

/// Decodes a PDF text string: UTF-16BE when it carries a byte order mark,
/// otherwise treated as single-byte text.
fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> =
            rest.chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]])).collect();
        return String::from_utf16_lossy(&units);
    }

    String::from_utf8(bytes.to_vec()).unwrap_or_else(|_| bytes.iter().map(|&b| b as char).collect())
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{encrypted_marker_pdf, SamplePdf};

    fn open_sample(engine: &mut LopdfEngine, sample: SamplePdf) -> DocumentHandle {
        let bytes = sample.build().expect("fixture should build");
        engine.open(&bytes, None).expect("open should succeed")
    }

    #[test]
    fn opens_pdf_and_reads_page_count() {
        let mut engine = LopdfEngine::new();
        let handle =
            open_sample(&mut engine, SamplePdf::new().page("one").page("two").page("three"));

        assert_eq!(engine.page_count(handle).expect("count should succeed"), 3);
    }

    #[test]
    fn page_size_follows_media_box() {
        let mut engine = LopdfEngine::new();
        let handle = open_sample(&mut engine, SamplePdf::new().page("sized"));

        let size = engine.page_size(handle, 0).expect("size should resolve");
        assert_eq!(size, PageSize { width_pt: 200.0, height_pt: 300.0 });
        assert_eq!(size.rotated(Rotation::Deg90), PageSize { width_pt: 300.0, height_pt: 200.0 });
    }

    #[test]
    fn render_applies_scale_and_rotation() {
        let mut engine = LopdfEngine::new();
        let handle = open_sample(&mut engine, SamplePdf::new().page("render me"));

        let upright = engine
            .render_page(
                handle,
                RenderRequest { page_index: 0, scale: 1.5, rotation: Rotation::Deg0 },
            )
            .expect("render should succeed");
        assert_eq!((upright.width(), upright.height()), (300, 450));

        let sideways = engine
            .render_page(
                handle,
                RenderRequest { page_index: 0, scale: 1.5, rotation: Rotation::Deg270 },
            )
            .expect("render should succeed");
        assert_eq!((sideways.width(), sideways.height()), (450, 300));
    }

    #[test]
    fn render_thumbnail_produces_non_empty_image() {
        let mut engine = LopdfEngine::new();
        let handle = open_sample(&mut engine, SamplePdf::new().page("thumb"));

        let image = engine
            .render_thumbnail(handle, 0, ThumbnailSize { width_px: 80, height_px: 80 })
            .expect("thumbnail should render");

        assert!(image.width() > 0 && image.width() <= 80);
        assert!(image.height() > 0 && image.height() <= 80);
    }

    #[test]
    fn text_content_reads_page_text() {
        let mut engine = LopdfEngine::new();
        let handle =
            open_sample(&mut engine, SamplePdf::new().page("first page").page("the quick foo fox"));

        let fragments = engine.text_content(handle, 1).expect("text should extract");
        assert!(fragments.join(" ").contains("quick foo"));

        let err = engine.text_content(handle, 2).expect_err("page 3 does not exist");
        assert!(matches!(err, PdfEngineError::PageOutOfRange { page: 2, page_count: 2 }));
    }

    #[test]
    fn metadata_reads_info_dictionary() {
        let mut engine = LopdfEngine::new();
        let handle = open_sample(
            &mut engine,
            SamplePdf::new().page("meta").title("Quarterly Report").author("Ada"),
        );

        let metadata = engine.metadata(handle).expect("metadata should load");
        assert_eq!(metadata.title.as_deref(), Some("Quarterly Report"));
        assert_eq!(metadata.author.as_deref(), Some("Ada"));
        assert_eq!(metadata.subject, None);
        assert_eq!(metadata.entries(), vec![("Title", "Quarterly Report"), ("Author", "Ada")]);
    }

    #[test]
    fn metadata_is_empty_without_info_dictionary() {
        let mut engine = LopdfEngine::new();
        let handle = open_sample(&mut engine, SamplePdf::new().page("bare"));

        assert!(engine.metadata(handle).expect("metadata should load").is_empty());
    }

    #[test]
    fn encrypted_document_requires_password() {
        let mut engine = LopdfEngine::new();

        let err =
            engine.open(encrypted_marker_pdf(), None).expect_err("password should be required");
        assert!(matches!(err, PdfEngineError::PasswordRequired));
        assert!(err.needs_password());

        assert!(engine.open(encrypted_marker_pdf(), Some("guess")).is_err());
    }

    #[test]
    fn owner_only_document_opens_without_password() {
        let mut engine = LopdfEngine::new();
        let bytes = SamplePdf::new()
            .page("locked but readable")
            .title("Locked Title")
            .protect("", "owner")
            .build()
            .expect("fixture should build");

        let handle = engine.open(&bytes, None).expect("empty user password should unlock");
        let metadata = engine.metadata(handle).expect("metadata should load");
        assert_eq!(metadata.title.as_deref(), Some("Locked Title"));
        let text = engine.text_content(handle, 0).expect("text should extract");
        assert!(text.join(" ").contains("locked but readable"));

        assert!(engine.open(&bytes, Some("")).is_ok());
    }

    #[test]
    fn user_password_unlocks_protected_document() {
        let mut engine = LopdfEngine::new();
        let bytes = SamplePdf::new()
            .page("for your eyes only")
            .title("Secret")
            .protect("secret", "owner")
            .build()
            .expect("fixture should build");

        let err = engine.open(&bytes, None).expect_err("password should be required");
        assert!(matches!(err, PdfEngineError::PasswordRequired));
        let err = engine.open(&bytes, Some("guess")).expect_err("wrong password");
        assert!(matches!(err, PdfEngineError::IncorrectPassword));

        let handle = engine.open(&bytes, Some("secret")).expect("password should unlock");
        assert_eq!(engine.page_count(handle).expect("page count"), 1);
        let metadata = engine.metadata(handle).expect("metadata should load");
        assert_eq!(metadata.title.as_deref(), Some("Secret"));
    }

    #[test]
    fn garbage_bytes_fail_to_parse() {
        let mut engine = LopdfEngine::new();
        let err = engine.open(b"not a pdf at all", None).expect_err("should fail to parse");

        assert!(!err.needs_password());
    }

    #[test]
    fn invalid_handle_returns_error() {
        let engine = LopdfEngine::new();
        let err =
            engine.page_count(DocumentHandle(999)).expect_err("should fail for unknown handle");

        assert!(matches!(err, PdfEngineError::InvalidHandle(999)));
    }

    #[test]
    fn close_releases_handle() {
        let mut engine = LopdfEngine::new();
        let handle = open_sample(&mut engine, SamplePdf::new().page("close"));

        engine.close(handle).expect("close should succeed");
        assert!(matches!(engine.close(handle), Err(PdfEngineError::InvalidHandle(_))));
    }

    #[test]
    fn rotation_cycles_through_quarter_turns() {
        let mut rotation = Rotation::Deg0;
        let mut seen = Vec::new();
        for _ in 0..4 {
            rotation = rotation.next();
            seen.push(rotation.degrees());
        }

        assert_eq!(seen, vec![90, 180, 270, 0]);
        assert_eq!(Rotation::from_degrees(450), Some(Rotation::Deg90));
        assert_eq!(Rotation::from_degrees(45), None);
    }

    #[test]
    fn decodes_utf16_text_strings() {
        assert_eq!(decode_text_string(&[0xFE, 0xFF, 0x00, b'H', 0x00, b'i']), "Hi");
        assert_eq!(decode_text_string(b"plain"), "plain");
    }
}
