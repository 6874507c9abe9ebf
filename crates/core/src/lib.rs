//! PDF Annotation Editor Core
//!
//! Editing session, annotation store, undo history and export for the
//! annotation editor. Rasterization of pages is delegated to a
//! [`pdf_engine::PdfEngine`]; annotations are painted by `pagemark-render`.

pub mod editor;
pub mod error;
pub mod export;
pub mod history;
pub mod keyboard;
pub mod mapper;
pub mod persistence;
pub mod store;
pub mod thumbnails;
pub mod tool_engine;

#[cfg(test)]
mod testing;

pub use editor::{shared_engine, Editor, EditorSettings, RasterKey, SharedEngine};
pub use error::{EditorError, ExportError, PersistenceError, RenderError};
pub use export::{annotation_layer, compose_page, export_file_name, DocumentExport, ExportedPage};
pub use history::{History, HistoryEntry, HISTORY_LIMIT};
pub use keyboard::{interpret, Key, KeyAction, KeyInput};
pub use mapper::{to_document_space, to_surface_pixels, SurfaceGeometry};
pub use persistence::{
    load_annotations, read_sidecar, save_annotations, sidecar_path, PageAnnotations,
};
pub use store::AnnotationStore;
pub use thumbnails::{generate_thumbnails, Thumbnail};
pub use tool_engine::{ToolEngine, ToolEvent, ToolState};

pub use doc_model::{Annotation, Color, Point, Shape, StrokeKind, Tool, ToolStyle, ViewState};
pub use pagemark_scheduler::CancellationToken;
