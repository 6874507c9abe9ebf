//! The editing session.
//!
//! [`Editor`] owns one document at a time together with its view state,
//! annotations, history and tool state. All mutation happens through
//! `&mut self` on the caller's thread; page rasters are produced by a
//! background worker and committed only when they belong to the newest
//! render request.

use crate::error::{EditorError, ExportError, RenderError};
use crate::export::{compose_page, export_file_name, DocumentExport, ExportedPage};
use crate::history::History;
use crate::keyboard::{interpret, KeyAction, KeyInput};
use crate::mapper::{to_document_space, SurfaceGeometry};
use crate::persistence::{self, PageAnnotations};
use crate::store::AnnotationStore;
use crate::thumbnails::{generate_thumbnails, Thumbnail};
use crate::tool_engine::{ToolEngine, ToolEvent};
use doc_model::{Annotation, Color, Point, Tool, ViewState};
use image::RgbaImage;
use pagemark_render::{paint_page, FontFace, PixmapSurface, Surface};
use pagemark_scheduler::{
    CancellationToken, Completion, RenderOutcome, RenderSlot, RenderTicket, RenderWorker,
};
use parking_lot::Mutex;
use pdf_engine::{
    page_viewport, DocumentHandle, OpenSource, PageSize, PdfEngine, PdfEngineError, RenderRequest,
    Viewport,
};
use std::path::{Path, PathBuf};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use storage::EditorPreferences;

/// Engine shared between the session and its render worker.
pub type SharedEngine = Arc<Mutex<dyn PdfEngine>>;

pub fn shared_engine<E: PdfEngine + 'static>(engine: E) -> SharedEngine {
    Arc::new(Mutex::new(engine))
}

/// Identifies a page raster: 1-based page and render scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterKey {
    pub page: u32,
    pub scale: f32,
}

struct RenderJob {
    handle: DocumentHandle,
    ticket: RenderTicket<RasterKey>,
}

type RenderResult = Result<RgbaImage, PdfEngineError>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EditorSettings {
    pub device_pixel_ratio: f32,
    pub export_scale: f32,
    pub thumbnail_scale: f32,
}

impl From<&EditorPreferences> for EditorSettings {
    fn from(preferences: &EditorPreferences) -> Self {
        Self {
            device_pixel_ratio: preferences.device_pixel_ratio,
            export_scale: preferences.export_scale,
            thumbnail_scale: preferences.thumbnail_scale,
        }
    }
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self::from(&EditorPreferences::default())
    }
}

struct LoadedDocument {
    handle: DocumentHandle,
    name: String,
    source_path: Option<PathBuf>,
    page_sizes: Vec<PageSize>,
    token: CancellationToken,
}

pub struct Editor {
    engine: SharedEngine,
    worker: RenderWorker<RenderJob, RenderResult>,
    document: Option<LoadedDocument>,
    view: ViewState,
    store: AnnotationStore,
    history: History,
    tools: ToolEngine,
    raster: RenderSlot<RasterKey, RgbaImage>,
    last_render_error: Option<String>,
    thumbnails: Vec<Thumbnail>,
    settings: EditorSettings,
    font: Option<FontFace>,
    on_close: Option<Box<dyn FnMut() + Send>>,
}

impl Editor {
    pub fn new(engine: SharedEngine, preferences: &EditorPreferences) -> Result<Self, EditorError> {
        let worker_engine = Arc::clone(&engine);
        let render = move |job: &RenderJob, _token: &CancellationToken| {
            let key = *job.ticket.key();
            let request =
                RenderRequest { page_index: key.page.saturating_sub(1), scale: key.scale };
            worker_engine.lock().render_page(job.handle, request)
        };
        let worker = RenderWorker::spawn("pagemark-render", render)?;

        Ok(Self {
            engine,
            worker,
            document: None,
            view: ViewState::default(),
            store: AnnotationStore::new(),
            history: History::new(),
            tools: ToolEngine::new(preferences.default_tool, preferences.tool_style()),
            raster: RenderSlot::new(),
            last_render_error: None,
            thumbnails: Vec::new(),
            settings: EditorSettings::from(preferences),
            font: FontFace::resolve(preferences.font_path.as_deref()),
            on_close: None,
        })
    }

    /// Session on the built-in engine with default preferences.
    pub fn with_default_engine() -> Result<Self, EditorError> {
        Self::new(shared_engine(pdf_engine::default_engine()), &EditorPreferences::default())
    }

    pub fn set_on_close<F>(&mut self, callback: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.on_close = Some(Box::new(callback));
    }

    pub fn set_font(&mut self, font: Option<FontFace>) {
        self.font = font;
    }

    pub fn settings(&self) -> EditorSettings {
        self.settings
    }

    pub fn set_device_pixel_ratio(&mut self, ratio: f32) -> Result<bool, EditorError> {
        if !(ratio.is_finite() && ratio > 0.0) || ratio == self.settings.device_pixel_ratio {
            return Ok(false);
        }
        self.settings.device_pixel_ratio = ratio;
        self.rerender_if_loaded()?;
        Ok(true)
    }

    // Document lifecycle

    /// Loads a document from memory. `name` is used for export file names.
    pub fn load_bytes(&mut self, bytes: Vec<u8>, name: &str) -> Result<u32, EditorError> {
        self.load(OpenSource::Bytes(bytes), name.to_owned(), None)
    }

    pub fn load_path(&mut self, path: &Path) -> Result<u32, EditorError> {
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_owned());
        self.load(OpenSource::Path(path.to_path_buf()), name, Some(path.to_path_buf()))
    }

    fn load(
        &mut self,
        source: OpenSource,
        name: String,
        source_path: Option<PathBuf>,
    ) -> Result<u32, EditorError> {
        let (handle, page_sizes) = {
            let mut engine = self.engine.lock();
            let handle = engine.open(source).map_err(load_error)?;
            match read_page_sizes(&*engine, handle) {
                Ok(sizes) => (handle, sizes),
                Err(error) => {
                    if let Err(close_error) = engine.close(handle) {
                        log::warn!("failed to close rejected document: {close_error}");
                    }
                    return Err(load_error(error));
                }
            }
        };

        // The new document opened; only now is the old one dropped.
        self.tools.reset();
        self.unload();

        let page_count = page_sizes.len() as u32;
        log::info!("loaded {name} ({page_count} pages)");
        self.document = Some(LoadedDocument {
            handle,
            name,
            source_path,
            page_sizes,
            token: CancellationToken::new(),
        });
        self.view = ViewState::new(page_count);
        self.request_render()?;
        Ok(page_count)
    }

    /// Dismisses the editor: finishes pending input, releases the document
    /// and notifies the host.
    pub fn close(&mut self) {
        self.settle_input();
        self.unload();
        self.view = ViewState::default();
        if let Some(callback) = self.on_close.as_mut() {
            callback();
        }
    }

    fn unload(&mut self) {
        self.raster.reset();
        self.last_render_error = None;
        self.thumbnails.clear();
        self.store = AnnotationStore::new();
        self.history.clear();

        if let Some(document) = self.document.take() {
            document.token.cancel();
            if let Err(error) = self.engine.lock().close(document.handle) {
                log::warn!("failed to close {}: {error}", document.name);
            }
            log::info!("closed {}", document.name);
        }
    }

    pub fn has_document(&self) -> bool {
        self.document.is_some()
    }

    pub fn document_name(&self) -> Option<&str> {
        self.document.as_ref().map(|document| document.name.as_str())
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.document.as_ref().and_then(|document| document.source_path.as_deref())
    }

    /// Cancelled when the current document is replaced or closed.
    pub fn document_token(&self) -> Option<CancellationToken> {
        self.document.as_ref().map(|document| document.token.clone())
    }

    pub fn page_count(&self) -> u32 {
        self.document.as_ref().map_or(0, |document| document.page_sizes.len() as u32)
    }

    pub fn page_size(&self, page: u32) -> Option<PageSize> {
        let document = self.document.as_ref()?;
        document.page_sizes.get(page.checked_sub(1)? as usize).copied()
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn current_page(&self) -> u32 {
        self.view.current_page()
    }

    /// Document units to raster pixels on screen.
    pub fn render_scale(&self) -> f32 {
        self.view.zoom_scale() * self.settings.device_pixel_ratio
    }

    /// Pixel size of the current page at the current render scale.
    pub fn viewport(&self) -> Option<Viewport> {
        self.page_size(self.current_page()).map(|size| page_viewport(size, self.render_scale()))
    }

    // Tools and input

    pub fn tool(&self) -> Tool {
        self.tools.tool()
    }

    pub fn tool_engine(&self) -> &ToolEngine {
        &self.tools
    }

    pub fn set_tool(&mut self, tool: Tool) -> ToolEvent {
        self.tools.set_tool(tool, &mut self.store, &mut self.history)
    }

    pub fn set_color(&mut self, color: Color) {
        self.tools.set_color(color);
    }

    pub fn set_stroke_width(&mut self, width: f32) {
        self.tools.set_stroke_width(width);
    }

    pub fn set_font_size(&mut self, size: f32) {
        self.tools.set_font_size(size);
    }

    /// Maps a client-space pointer sample into document space.
    pub fn map_pointer(&self, client: Point, geometry: &SurfaceGeometry) -> Point {
        to_document_space(client, geometry, self.render_scale())
    }

    pub fn pointer_down(&mut self, client: Point, geometry: &SurfaceGeometry) -> ToolEvent {
        let at = self.map_pointer(client, geometry);
        self.pointer_down_at(at)
    }

    pub fn pointer_move(&mut self, client: Point, geometry: &SurfaceGeometry) -> ToolEvent {
        let at = self.map_pointer(client, geometry);
        self.pointer_move_at(at)
    }

    pub fn pointer_up(&mut self) -> ToolEvent {
        self.tools.pointer_up(&mut self.store)
    }

    pub fn pointer_leave(&mut self) -> ToolEvent {
        self.tools.pointer_leave(&mut self.store)
    }

    /// Pointer-down at a document-space position on the current page.
    pub fn pointer_down_at(&mut self, at: Point) -> ToolEvent {
        if self.document.is_none() {
            return ToolEvent::Ignored;
        }
        let page = self.current_page();
        self.tools.pointer_down(page, at, &mut self.store, &mut self.history)
    }

    pub fn pointer_move_at(&mut self, at: Point) -> ToolEvent {
        self.tools.pointer_move(at)
    }

    pub fn text_input(&mut self, text: &str) -> ToolEvent {
        self.tools.text_input(text)
    }

    pub fn confirm_text(&mut self) -> ToolEvent {
        self.tools.confirm_text(&mut self.store, &mut self.history)
    }

    pub fn cancel_text(&mut self) -> ToolEvent {
        self.tools.cancel_text()
    }

    /// Applies a key press. `text_focus` reports whether a host text input
    /// has focus; pending text placement counts as focus too.
    pub fn handle_key(&mut self, input: KeyInput, text_focus: bool) -> KeyAction {
        let action = interpret(input, text_focus || self.tools.is_placing_text());
        match action {
            KeyAction::SelectTool(tool) => {
                self.set_tool(tool);
            }
            KeyAction::Undo => {
                self.undo();
            }
            KeyAction::Redo => {
                self.redo();
            }
            KeyAction::ConfirmText => {
                self.confirm_text();
            }
            KeyAction::CancelText => {
                self.cancel_text();
            }
            KeyAction::InsertChar(c) => {
                let mut buffer = [0; 4];
                self.tools.text_input(c.encode_utf8(&mut buffer));
            }
            KeyAction::DeleteChar => {
                self.tools.backspace();
            }
            KeyAction::None => {}
        }
        action
    }

    /// Commits the stroke in progress and confirms pending text.
    pub fn settle_input(&mut self) -> ToolEvent {
        self.tools.settle(&mut self.store, &mut self.history)
    }

    // Annotations and history

    pub fn annotations(&self, page: u32) -> &[Annotation] {
        self.store.get(page)
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Returns false when there was nothing to undo.
    pub fn undo(&mut self) -> bool {
        self.settle_input();
        self.history.undo(&mut self.store).is_some()
    }

    pub fn redo(&mut self) -> bool {
        self.settle_input();
        self.history.redo(&mut self.store).is_some()
    }

    /// Empties the current page as one undoable step. An empty page is left
    /// alone and records nothing.
    pub fn clear_page(&mut self) -> bool {
        self.settle_input();
        let page = self.current_page();
        if self.document.is_none() || self.store.get(page).is_empty() {
            return false;
        }
        self.history.push_undo(page, &self.store);
        self.store.clear(page);
        true
    }

    /// Replaces page lists wholesale, one undoable step per page.
    pub fn import_annotations(&mut self, pages: PageAnnotations) -> Result<usize, EditorError> {
        let page_count = self.require_document()?.page_sizes.len() as u32;
        if let Some(&page) = pages.keys().find(|page| **page == 0 || **page > page_count) {
            return Err(EditorError::PageOutOfRange { page, page_count });
        }

        self.settle_input();
        let mut imported = 0;
        for (page, list) in pages {
            imported += list.len();
            self.history.push_undo(page, &self.store);
            self.store.replace(page, list);
        }
        Ok(imported)
    }

    /// Loads the sidecar next to the source file, if there is one.
    pub fn load_sidecar(&mut self) -> Result<usize, EditorError> {
        let Some(path) = self.source_path().map(Path::to_path_buf) else {
            return Ok(0);
        };
        match persistence::load_annotations(&path)? {
            Some(pages) => self.import_annotations(pages),
            None => Ok(0),
        }
    }

    pub fn save_sidecar(&mut self) -> Result<PathBuf, EditorError> {
        self.settle_input();
        let path = self.source_path().map(Path::to_path_buf).ok_or(EditorError::NoDocument)?;
        Ok(persistence::save_annotations(&path, &self.store)?)
    }

    // Navigation and zoom

    pub fn go_to_page(&mut self, page: u32) -> Result<bool, EditorError> {
        let page_count = self.require_document()?.page_sizes.len() as u32;
        if !self.view.contains_page(page) {
            return Err(EditorError::PageOutOfRange { page, page_count });
        }
        self.settle_input();
        self.apply_view_change(|view| view.set_page(page))
    }

    pub fn next_page(&mut self) -> Result<bool, EditorError> {
        self.require_document()?;
        self.settle_input();
        self.apply_view_change(ViewState::next_page)
    }

    pub fn previous_page(&mut self) -> Result<bool, EditorError> {
        self.require_document()?;
        self.settle_input();
        self.apply_view_change(ViewState::previous_page)
    }

    pub fn set_zoom(&mut self, zoom: f32) -> Result<bool, EditorError> {
        self.require_document()?;
        self.settle_input();
        self.apply_view_change(|view| view.set_zoom(zoom))
    }

    pub fn zoom_in(&mut self) -> Result<bool, EditorError> {
        self.require_document()?;
        self.settle_input();
        self.apply_view_change(ViewState::zoom_in)
    }

    pub fn zoom_out(&mut self) -> Result<bool, EditorError> {
        self.require_document()?;
        self.settle_input();
        self.apply_view_change(ViewState::zoom_out)
    }

    fn apply_view_change<F>(&mut self, change: F) -> Result<bool, EditorError>
    where
        F: FnOnce(&mut ViewState) -> bool,
    {
        if !change(&mut self.view) {
            return Ok(false);
        }
        self.request_render()?;
        Ok(true)
    }

    fn rerender_if_loaded(&mut self) -> Result<(), EditorError> {
        if self.document.is_some() {
            self.request_render()?;
        }
        Ok(())
    }

    // Page raster

    /// Starts rendering the current page at the current scale, superseding
    /// any render still in flight.
    pub fn request_render(&mut self) -> Result<(), EditorError> {
        let handle = self.require_document()?.handle;
        let key = RasterKey { page: self.current_page(), scale: self.render_scale() };
        let ticket = self.raster.begin(key);
        log::debug!(
            "render page {} at {:.2} (generation {})",
            key.page,
            key.scale,
            ticket.generation()
        );

        let token = ticket.token().clone();
        self.worker.submit(RenderJob { handle, ticket }, token)?;
        Ok(())
    }

    /// Applies finished renders without blocking. Returns how many arrived.
    pub fn poll_renders(&mut self) -> usize {
        let mut settled = 0;
        while let Some(completion) = self.worker.try_recv() {
            self.apply_completion(completion);
            settled += 1;
        }
        settled
    }

    /// Blocks until the newest render request settles or `timeout` passes.
    /// Returns whether it settled.
    pub fn wait_for_renders(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.poll_renders();
        while self.raster.is_pending() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.worker.recv_timeout(remaining) {
                Ok(completion) => self.apply_completion(completion),
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => {
                    log::error!("render worker is gone");
                    return false;
                }
            }
        }
        true
    }

    fn apply_completion(&mut self, completion: Completion<RenderJob, RenderResult>) {
        match completion {
            Completion::Finished { job, result: Ok(image) } => {
                let key = *job.ticket.key();
                match self.raster.complete(job.ticket, image) {
                    RenderOutcome::Committed => {
                        self.last_render_error = None;
                        log::debug!("committed render of page {}", key.page);
                    }
                    _ => log::debug!("dropped stale render of page {}", key.page),
                }
            }
            Completion::Finished { job, result: Err(error) } => {
                if self.raster.fail(&job.ticket) == RenderOutcome::Failed {
                    log::warn!("render of page {} failed: {error}", job.ticket.key().page);
                    self.last_render_error = Some(error.to_string());
                }
            }
            Completion::Cancelled { job } => {
                log::debug!("render of page {} superseded", job.ticket.key().page);
            }
        }
    }

    /// Last committed page raster. It may lag behind the view until the
    /// newest render settles.
    pub fn raster(&self) -> Option<(RasterKey, &RgbaImage)> {
        self.raster.committed().map(|(key, image)| (*key, image))
    }

    pub fn last_render_error(&self) -> Option<&str> {
        self.last_render_error.as_deref()
    }

    // Annotation layer

    /// Repaints the current page's annotations, with the stroke being drawn
    /// on top. Reads the store as it is now.
    pub fn paint_annotation_layer<S>(&self, surface: &mut S)
    where
        S: Surface + ?Sized,
    {
        let page = self.current_page();
        let draft = self
            .tools
            .draft()
            .and_then(|(draft_page, draft)| (draft_page == page).then_some(draft));
        paint_page(surface, self.store.get(page), draft);
    }

    /// A fresh annotation surface for the current page at screen scale.
    pub fn annotation_surface(&self) -> Result<PixmapSurface, EditorError> {
        let viewport = self.viewport().ok_or(EditorError::NoDocument)?;
        let mut surface =
            PixmapSurface::new(viewport.width_px, viewport.height_px, self.render_scale())
                .map_err(RenderError::from)?
                .with_font(self.font.clone());
        self.paint_annotation_layer(&mut surface);
        Ok(surface)
    }

    // Export and thumbnails

    /// Flattens `page` at the current render scale.
    pub fn export_page(&self, page: u32) -> Result<ExportedPage, ExportError> {
        self.export_page_at(page, self.render_scale())
    }

    pub fn export_page_at(&self, page: u32, scale: f32) -> Result<ExportedPage, ExportError> {
        let document = self.document.as_ref().ok_or(ExportError::NoDocument)?;
        let page_count = document.page_sizes.len() as u32;
        if page == 0 || page > page_count {
            return Err(ExportError::PageOutOfRange { page, page_count });
        }

        let engine = self.engine.lock();
        let image = compose_page(
            &*engine,
            document.handle,
            page,
            scale,
            self.store.get(page),
            self.font.as_ref(),
        )
        .map_err(|source| ExportError::Page { page, source })?;

        log::info!("exported page {page} of {}", document.name);
        Ok(ExportedPage { page, file_name: export_file_name(&document.name, page), image })
    }

    /// Flattens every page at the export scale. Leaves the view untouched.
    pub fn export_document(
        &self,
        token: &CancellationToken,
    ) -> Result<Vec<ExportedPage>, ExportError> {
        let document = self.document.as_ref().ok_or(ExportError::NoDocument)?;
        let engine = self.engine.lock();
        let export = DocumentExport {
            engine: &*engine,
            handle: document.handle,
            page_count: document.page_sizes.len() as u32,
            stem: &document.name,
            scale: self.settings.export_scale,
            font: self.font.as_ref(),
        };
        let pages = export.run(|page| self.store.get(page), token)?;
        log::info!("exported {} pages of {}", pages.len(), document.name);
        Ok(pages)
    }

    /// Regenerates every page preview. Returns how many were produced.
    pub fn generate_thumbnails(&mut self) -> Result<u32, EditorError> {
        let document = self.require_document()?;
        let (handle, page_count) = (document.handle, document.page_sizes.len() as u32);
        let token = document.token.clone();

        let mut thumbnails = Vec::with_capacity(page_count as usize);
        let scale = self.settings.thumbnail_scale;
        let produced = {
            let engine = self.engine.lock();
            generate_thumbnails(&*engine, handle, page_count, scale, &token, |_, thumbnail| {
                thumbnails.push(thumbnail)
            })
        };

        if !token.is_cancelled() {
            self.thumbnails = thumbnails;
        }
        Ok(produced)
    }

    pub fn thumbnails(&self) -> &[Thumbnail] {
        &self.thumbnails
    }

    fn require_document(&self) -> Result<&LoadedDocument, EditorError> {
        self.document.as_ref().ok_or(EditorError::NoDocument)
    }
}

impl Drop for Editor {
    fn drop(&mut self) {
        self.raster.cancel_pending();
        if let Some(document) = &self.document {
            document.token.cancel();
        }
    }
}

fn read_page_sizes(
    engine: &dyn PdfEngine,
    handle: DocumentHandle,
) -> Result<Vec<PageSize>, PdfEngineError> {
    let page_count = engine.page_count(handle)?;
    if page_count == 0 {
        return Err(PdfEngineError::NoPages);
    }
    (0..page_count).map(|index| engine.page_size(handle, index)).collect()
}

fn load_error(error: PdfEngineError) -> EditorError {
    log::warn!("document rejected: {error}");
    EditorError::Load { reason: error.to_string() }
}
