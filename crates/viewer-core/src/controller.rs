//! Viewer state controller.
//!
//! Owns the loaded document, view state, bookmarks, thumbnails and
//! appearance, and turns every user action into a state transition plus (when
//! the visible page changes) a render request. Full-page renders go through a
//! [`RenderScheduler`] so at most one render touches the drawing surface at a
//! time; they execute on a [`RenderWorker`] thread and their completions are
//! applied when the owner calls [`ViewerController::pump`] or
//! [`ViewerController::wait_idle`].

use crate::appearance::{AccentColor, Appearance};
use crate::bookmarks::Bookmarks;
use crate::config::ViewerConfig;
use crate::error::ViewerError;
use crate::input::{FileInput, PasswordPrompt, PasswordRequest};
use crate::search::{page_matches, page_text, SearchOutcome, SearchQuery};
use crate::state::{LoadPhase, NavControls, ViewState};
use crate::thumbnails::{self, Thumbnail};
use pageview_scheduler::{
    Completion, RenderOutcome, RenderScheduler, RenderTicket, RenderWorker, SchedulerStats,
    WorkerError,
};
use pdf_engine::{
    DocumentHandle, DocumentMetadata, PageSize, PdfEngine, PdfEngineError, RenderRequest,
    RgbaImage, Rotation,
};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Engine shared between the controller and the render worker.
pub type SharedEngine<E> = Arc<Mutex<E>>;

/// Snapshot of what to render, taken when the render is requested.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRender {
    pub document: DocumentHandle,
    /// 1-based page number
    pub page: u32,
    pub zoom: f32,
    pub rotation: Rotation,
}

impl PageRender {
    fn request(&self) -> RenderRequest {
        RenderRequest { page_index: self.page - 1, scale: self.zoom, rotation: self.rotation }
    }
}

/// The most recently completed full-page render.
#[derive(Debug, Clone)]
pub struct RenderedFrame {
    pub page: u32,
    pub zoom: f32,
    pub rotation: Rotation,
    pub image: RgbaImage,
}

/// What a successful load produced.
#[derive(Debug, Clone)]
pub struct LoadSummary {
    pub file_name: String,
    pub page_count: u32,
    pub metadata: DocumentMetadata,
    pub thumbnails_rendered: usize,
}

#[derive(Debug)]
struct RenderDone {
    job: PageRender,
    result: Result<RgbaImage, PdfEngineError>,
}

#[derive(Debug)]
struct LoadedDocument {
    handle: DocumentHandle,
    name: String,
    bytes: Vec<u8>,
    metadata: DocumentMetadata,
    view: ViewState,
}

fn lock<E>(engine: &Mutex<E>) -> Result<MutexGuard<'_, E>, ViewerError> {
    engine.lock().map_err(|_| ViewerError::EnginePoisoned)
}

pub struct ViewerController<E>
where
    E: PdfEngine + Send + Sync + 'static,
{
    engine: SharedEngine<E>,
    config: ViewerConfig,
    phase: LoadPhase,
    document: Option<LoadedDocument>,
    bookmarks: Bookmarks,
    thumbnails: Vec<Thumbnail>,
    appearance: Appearance,
    scheduler: RenderScheduler<PageRender>,
    worker: RenderWorker<PageRender, RenderDone>,
    frame: Option<RenderedFrame>,
    last_error: Option<String>,
}

impl<E> ViewerController<E>
where
    E: PdfEngine + Send + Sync + 'static,
{
    pub fn new(engine: E, config: ViewerConfig) -> Result<Self, ViewerError> {
        Self::with_shared_engine(Arc::new(Mutex::new(engine)), config)
    }

    /// Builds a controller around an engine the caller keeps a handle to.
    pub fn with_shared_engine(
        engine: SharedEngine<E>,
        config: ViewerConfig,
    ) -> Result<Self, ViewerError> {
        let config = config.validated();
        let render_engine = Arc::clone(&engine);
        let worker = RenderWorker::spawn(move |job: PageRender| {
            let result = match render_engine.lock() {
                Ok(engine) => engine.render_page(job.document, job.request()),
                Err(_) => Err(PdfEngineError::Backend("engine lock poisoned".to_owned())),
            };
            RenderDone { job, result }
        })?;

        let appearance =
            Appearance { night_mode: config.night_mode, accent: config.accent, fullscreen: false };

        Ok(Self {
            engine,
            config,
            phase: LoadPhase::Unloaded,
            document: None,
            bookmarks: Bookmarks::new(),
            thumbnails: Vec::new(),
            appearance,
            scheduler: RenderScheduler::new(),
            worker,
            frame: None,
            last_error: None,
        })
    }

    pub fn engine(&self) -> &SharedEngine<E> {
        &self.engine
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    /// Message of the most recent load or render failure. Cleared when a
    /// new document loads or a later render of the current one succeeds.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    // Loading

    /// Opens a user-selected file. Anything not declared as a PDF is rejected
    /// before the engine sees it.
    pub fn open_file(
        &mut self,
        input: FileInput,
        prompt: &mut dyn PasswordPrompt,
    ) -> Result<LoadSummary, ViewerError> {
        if !input.is_pdf() {
            return Err(ViewerError::NotPdf { content_type: input.content_type });
        }

        self.load_document(&input.name, input.bytes, prompt)
    }

    /// Opens `bytes` and makes it the current document.
    ///
    /// Password-protected documents are retried with passwords from `prompt`
    /// until one works or the prompt gives up. On failure the previously
    /// loaded document, if any, stays current.
    pub fn load_document(
        &mut self,
        name: &str,
        bytes: Vec<u8>,
        prompt: &mut dyn PasswordPrompt,
    ) -> Result<LoadSummary, ViewerError> {
        self.set_phase(LoadPhase::Loading);

        let (handle, page_count) = match self.open_document(name, &bytes, prompt) {
            Ok(opened) => opened,
            Err(err) => return Err(self.fail_load(name, err)),
        };

        let engine = Arc::clone(&self.engine);
        let (metadata, thumbnails) = {
            let engine = match lock(&engine) {
                Ok(engine) => engine,
                Err(err) => return Err(self.fail_load(name, err)),
            };

            let metadata = engine.metadata(handle).unwrap_or_else(|err| {
                tracing::warn!(file = name, "failed to read document metadata: {err}");
                DocumentMetadata::default()
            });
            let thumbnails =
                thumbnails::generate(&*engine, handle, page_count, self.config.thumbnail_size());

            (metadata, thumbnails)
        };

        if let Some(previous) = self.document.take() {
            self.close_handle(previous.handle);
        }
        self.scheduler.clear_pending();
        self.frame = None;
        self.bookmarks.clear();

        let thumbnails_rendered = thumbnails.iter().filter(|thumb| thumb.is_rendered()).count();
        self.thumbnails = thumbnails;
        self.document = Some(LoadedDocument {
            handle,
            name: name.to_owned(),
            bytes,
            metadata: metadata.clone(),
            view: ViewState::new(page_count, self.config.initial_zoom),
        });
        self.last_error = None;
        self.set_phase(LoadPhase::Loaded);

        tracing::info!(file = name, pages = page_count, "document loaded");
        self.request_render();

        Ok(LoadSummary { file_name: name.to_owned(), page_count, metadata, thumbnails_rendered })
    }

    fn open_document(
        &mut self,
        name: &str,
        bytes: &[u8],
        prompt: &mut dyn PasswordPrompt,
    ) -> Result<(DocumentHandle, u32), ViewerError> {
        let engine = Arc::clone(&self.engine);
        let mut password: Option<String> = None;
        let mut attempt = 0;

        let handle = loop {
            let opened = lock(&engine)?.open(bytes, password.as_deref());
            match opened {
                Ok(handle) => break handle,
                Err(err) if err.needs_password() => {
                    self.set_phase(LoadPhase::PasswordRequired);
                    attempt += 1;
                    let request = PasswordRequest {
                        file_name: name,
                        attempt,
                        previous_rejected: matches!(err, PdfEngineError::IncorrectPassword),
                    };
                    let answer = prompt.request_password(request);
                    password = Some(answer.ok_or(ViewerError::PasswordCancelled)?);
                    self.set_phase(LoadPhase::Loading);
                }
                Err(err) => return Err(ViewerError::Load(err)),
            }
        };

        let page_count = lock(&engine)?.page_count(handle);
        match page_count {
            Ok(count) if count > 0 => Ok((handle, count)),
            Ok(_) => {
                self.close_handle(handle);
                Err(ViewerError::Load(PdfEngineError::Backend("document has no pages".to_owned())))
            }
            Err(err) => {
                self.close_handle(handle);
                Err(ViewerError::Load(err))
            }
        }
    }

    fn fail_load(&mut self, name: &str, err: ViewerError) -> ViewerError {
        self.set_phase(LoadPhase::LoadError);
        tracing::warn!(file = name, "failed to load document: {err}");
        self.last_error = Some(err.to_string());

        let settled = if self.document.is_some() { LoadPhase::Loaded } else { LoadPhase::Unloaded };
        self.set_phase(settled);
        err
    }

    fn close_handle(&self, handle: DocumentHandle) {
        let closed = lock(&self.engine)
            .and_then(|mut engine| engine.close(handle).map_err(ViewerError::from));
        if let Err(err) = closed {
            tracing::warn!(handle = handle.raw(), "failed to close document: {err}");
        }
    }

    fn set_phase(&mut self, phase: LoadPhase) {
        if self.phase != phase {
            tracing::debug!(from = %self.phase, to = %phase, "load phase changed");
            self.phase = phase;
        }
    }

    // Navigation

    fn loaded(&self) -> Result<&LoadedDocument, ViewerError> {
        self.document.as_ref().ok_or(ViewerError::NotLoaded)
    }

    fn loaded_mut(&mut self) -> Result<&mut LoadedDocument, ViewerError> {
        self.document.as_mut().ok_or(ViewerError::NotLoaded)
    }

    /// Jumps to 1-based `page`. Out-of-range pages are rejected without
    /// changing anything.
    pub fn go_to_page(&mut self, page: u32) -> Result<(), ViewerError> {
        self.loaded_mut()?.view.go_to(page)?;
        tracing::info!(page, "navigated to page");
        self.request_render();
        Ok(())
    }

    /// Advances one page. Returns `false` on the last page.
    pub fn next_page(&mut self) -> Result<bool, ViewerError> {
        let view = self.loaded()?.view;
        if view.current_page() >= view.page_count() {
            return Ok(false);
        }
        self.go_to_page(view.current_page() + 1)?;
        Ok(true)
    }

    /// Goes back one page. Returns `false` on the first page.
    pub fn previous_page(&mut self) -> Result<bool, ViewerError> {
        let view = self.loaded()?.view;
        if view.current_page() <= 1 {
            return Ok(false);
        }
        self.go_to_page(view.current_page() - 1)?;
        Ok(true)
    }

    pub fn view(&self) -> Option<&ViewState> {
        self.document.as_ref().map(|document| &document.view)
    }

    pub fn current_page(&self) -> Option<u32> {
        self.view().map(ViewState::current_page)
    }

    pub fn page_count(&self) -> Option<u32> {
        self.view().map(ViewState::page_count)
    }

    /// Unrotated size of 1-based `page` in points.
    pub fn page_size(&self, page: u32) -> Result<PageSize, ViewerError> {
        let document = self.loaded()?;
        let page_count = document.view.page_count();
        if page == 0 || page > page_count {
            return Err(ViewerError::PageOutOfRange { page, page_count });
        }
        Ok(lock(&self.engine)?.page_size(document.handle, page - 1)?)
    }

    /// Previous/next enablement; both disabled when nothing is loaded.
    pub fn nav_controls(&self) -> NavControls {
        self.view().map(ViewState::nav_controls).unwrap_or(NavControls {
            previous_enabled: false,
            next_enabled: false,
        })
    }

    /// Page indicator text, e.g. `2 / 10`.
    pub fn page_indicator(&self) -> String {
        match self.view() {
            Some(view) => format!("{} / {}", view.current_page(), view.page_count()),
            None => "- / -".to_owned(),
        }
    }

    // Zoom and rotation

    /// Sets the zoom factor, clamped to the configured bounds. Re-renders and
    /// returns `true` only when the zoom actually changed.
    pub fn set_zoom(&mut self, factor: f32) -> Result<bool, ViewerError> {
        let document = self.document.as_mut().ok_or(ViewerError::NotLoaded)?;
        let changed = document.view.set_zoom(factor, &self.config)?;

        if changed {
            tracing::info!(zoom = document.view.zoom(), "zoom changed");
            self.request_render();
        }
        Ok(changed)
    }

    pub fn zoom_in(&mut self) -> Result<bool, ViewerError> {
        let zoom = self.loaded()?.view.zoom();
        self.set_zoom(self.config.clamp_zoom(zoom + self.config.zoom_step))
    }

    pub fn zoom_out(&mut self) -> Result<bool, ViewerError> {
        let zoom = self.loaded()?.view.zoom();
        self.set_zoom(self.config.clamp_zoom(zoom - self.config.zoom_step))
    }

    /// Rotates a quarter turn clockwise and re-renders.
    pub fn rotate(&mut self) -> Result<Rotation, ViewerError> {
        let rotation = self.loaded_mut()?.view.rotate();
        tracing::info!(degrees = rotation.degrees(), "rotation changed");
        self.request_render();
        Ok(rotation)
    }

    // Bookmarks

    /// Bookmarks the current page and returns it.
    pub fn add_bookmark(&mut self) -> Result<u32, ViewerError> {
        let page = self.loaded()?.view.current_page();
        self.bookmarks.add(page);
        tracing::info!(page, count = self.bookmarks.len(), "bookmark added");
        Ok(page)
    }

    pub fn bookmarks(&self) -> &[u32] {
        self.bookmarks.pages()
    }

    /// Navigates to the bookmark at `index` (0-based position in the list).
    pub fn jump_to_bookmark(&mut self, index: usize) -> Result<u32, ViewerError> {
        self.loaded()?;
        let page = self.bookmarks.get(index).ok_or(ViewerError::BookmarkOutOfRange {
            index,
            count: self.bookmarks.len(),
        })?;
        self.go_to_page(page)?;
        Ok(page)
    }

    // Search

    /// Case-insensitive substring search of the current page.
    pub fn search(&self, query: &str) -> Result<SearchOutcome, ViewerError> {
        self.search_page(SearchQuery::Text(query.to_owned()))
    }

    /// Case-insensitive regular expression search of the current page.
    pub fn search_pattern(&self, pattern: &str) -> Result<SearchOutcome, ViewerError> {
        self.search_page(SearchQuery::Pattern(pattern.to_owned()))
    }

    fn search_page(&self, query: SearchQuery) -> Result<SearchOutcome, ViewerError> {
        let document = self.loaded()?;
        if query.as_str().trim().is_empty() {
            return Err(ViewerError::EmptySearch);
        }

        let page = document.view.current_page();
        let fragments = lock(&self.engine)?.text_content(document.handle, page - 1).map_err(|err| {
            tracing::warn!(page, "failed to read page text: {err}");
            ViewerError::Engine(err)
        })?;

        let found = page_matches(&page_text(&fragments), &query)?;
        tracing::info!(page, found, query = query.as_str(), "searched current page");

        Ok(SearchOutcome { page, query: query.as_str().to_owned(), found })
    }

    // Document info

    pub fn document_name(&self) -> Option<&str> {
        self.document.as_ref().map(|document| document.name.as_str())
    }

    pub fn metadata(&self) -> Option<&DocumentMetadata> {
        self.document.as_ref().map(|document| &document.metadata)
    }

    /// One entry per page of the current document.
    pub fn thumbnails(&self) -> &[Thumbnail] {
        &self.thumbnails
    }

    /// The file exactly as it was loaded.
    pub fn original_bytes(&self) -> Option<&[u8]> {
        self.document.as_ref().map(|document| document.bytes.as_slice())
    }

    /// Writes the originally loaded file to `path`.
    pub fn download_to(&self, path: &Path) -> Result<(), ViewerError> {
        let bytes = self.original_bytes().ok_or(ViewerError::NotLoaded)?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, bytes)?;
        tracing::info!(path = %path.display(), bytes = bytes.len(), "saved original document");
        Ok(())
    }

    // Appearance

    pub fn appearance(&self) -> Appearance {
        self.appearance
    }

    pub fn toggle_night_mode(&mut self) -> bool {
        self.appearance.night_mode = !self.appearance.night_mode;
        tracing::debug!(enabled = self.appearance.night_mode, "night mode toggled");
        self.appearance.night_mode
    }

    pub fn set_accent(&mut self, accent: AccentColor) {
        self.appearance.accent = accent;
    }

    pub fn toggle_fullscreen(&mut self) -> bool {
        self.appearance.fullscreen = !self.appearance.fullscreen;
        self.appearance.fullscreen
    }

    // Rendering

    fn request_render(&mut self) {
        let Some(document) = &self.document else {
            return;
        };

        let job = PageRender {
            document: document.handle,
            page: document.view.current_page(),
            zoom: document.view.zoom(),
            rotation: document.view.rotation(),
        };

        if let Some(ticket) = self.scheduler.request(job) {
            self.dispatch(ticket);
        }
    }

    fn dispatch(&mut self, ticket: RenderTicket<PageRender>) {
        let mut next = Some(ticket);
        while let Some(ticket) = next.take() {
            let id = ticket.id;
            let page = ticket.job.page;
            tracing::debug!(ticket = id, page, "dispatching render");

            if let Err(err) = self.worker.dispatch(ticket) {
                tracing::error!(page, "failed to dispatch render: {err}");
                self.last_error = Some(err.to_string());
                next = self.scheduler.complete(id, RenderOutcome::Failed);
            }
        }
    }

    fn handle_completion(&mut self, completion: Completion<RenderDone>) {
        let RenderDone { job, result } = completion.result;
        let current = self.document.as_ref().is_some_and(|doc| doc.handle == job.document);

        let outcome = match result {
            Ok(image) => {
                if current {
                    tracing::debug!(page = job.page, "frame ready");
                    self.frame = Some(RenderedFrame {
                        page: job.page,
                        zoom: job.zoom,
                        rotation: job.rotation,
                        image,
                    });
                    self.last_error = None;
                } else {
                    tracing::debug!(page = job.page, "discarding frame of a replaced document");
                }
                RenderOutcome::Succeeded
            }
            Err(err) => {
                if current {
                    tracing::warn!(page = job.page, "render failed: {err}");
                    self.last_error = Some(err.to_string());
                } else {
                    tracing::debug!(page = job.page, "ignoring failure of a replaced document");
                }
                RenderOutcome::Failed
            }
        };

        if let Some(next) = self.scheduler.complete(completion.ticket, outcome) {
            self.dispatch(next);
        }
    }

    /// Applies every render completion that is ready. Returns how many were
    /// applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Some(completion) = self.worker.try_completion() {
            self.handle_completion(completion);
            applied += 1;
        }
        applied
    }

    /// Blocks until the in-flight render and any pending one have finished.
    pub fn wait_idle(&mut self, timeout: Duration) -> Result<(), ViewerError> {
        let deadline = Instant::now() + timeout;

        while self.scheduler.is_busy() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ViewerError::RenderTimeout);
            }
            match self.worker.wait_completion(remaining) {
                Ok(Some(completion)) => self.handle_completion(completion),
                Ok(None) => return Err(ViewerError::RenderTimeout),
                Err(err) => {
                    self.abandon_in_flight(&err);
                    return Err(err.into());
                }
            }
        }

        Ok(())
    }

    /// Releases the drawing surface held by a render whose worker is gone.
    fn abandon_in_flight(&mut self, err: &WorkerError) {
        let Some(id) = self.scheduler.in_flight() else {
            return;
        };

        tracing::error!(ticket = id, "render worker stopped: {err}");
        self.last_error = Some(err.to_string());
        if let Some(next) = self.scheduler.complete(id, RenderOutcome::Failed) {
            self.dispatch(next);
        }
    }

    pub fn is_rendering(&self) -> bool {
        self.scheduler.is_busy()
    }

    /// Page waiting for the drawing surface, if any.
    pub fn pending_page(&self) -> Option<u32> {
        self.scheduler.pending().map(|job| job.page)
    }

    pub fn render_stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    /// The last completed render, untouched by appearance settings.
    pub fn frame(&self) -> Option<&RenderedFrame> {
        self.frame.as_ref()
    }

    /// Whether the last completed render shows the current page, zoom and
    /// rotation.
    pub fn frame_is_current(&self) -> bool {
        match (self.frame.as_ref(), self.view()) {
            (Some(frame), Some(view)) => {
                frame.page == view.current_page()
                    && frame.zoom == view.zoom()
                    && frame.rotation == view.rotation()
            }
            _ => false,
        }
    }

    /// The last completed render as it should be displayed.
    pub fn presented_frame(&self) -> Option<RgbaImage> {
        self.frame.as_ref().map(|frame| self.appearance.present(&frame.image))
    }
}
