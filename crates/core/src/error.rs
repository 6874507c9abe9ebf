use pagemark_render::SurfaceError;
use pagemark_scheduler::WorkerError;
use pdf_engine::PdfEngineError;

/// Failure producing one flattened page.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Engine(#[from] PdfEngineError),
    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("no document is loaded")]
    NoDocument,
    #[error("page {page} is out of range (1..={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("page {page} failed to render")]
    Page {
        page: u32,
        #[source]
        source: RenderError,
    },
    #[error("export cancelled")]
    Cancelled,
    #[error("failed to encode PNG: {0}")]
    Encode(#[from] image::ImageError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("unsupported sidecar version {0}")]
    UnsupportedVersion(u32),
}

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("failed to open PDF: {reason}")]
    Load { reason: String },
    #[error("no document is loaded")]
    NoDocument,
    #[error("page {page} is out of range (1..={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("render failed: {0}")]
    Render(#[from] RenderError),
    #[error(transparent)]
    Worker(#[from] WorkerError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("annotation sidecar: {0}")]
    Persistence(#[from] PersistenceError),
}

impl From<PdfEngineError> for EditorError {
    fn from(error: PdfEngineError) -> Self {
        EditorError::Render(RenderError::Engine(error))
    }
}
