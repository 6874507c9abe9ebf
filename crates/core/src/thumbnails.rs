//! Best-effort page previews for the sidebar.

use image::RgbaImage;
use pagemark_scheduler::CancellationToken;
use pdf_engine::{DocumentHandle, PdfEngine, PdfEngineError, RenderRequest};

#[derive(Debug)]
pub enum Thumbnail {
    Ready(RgbaImage),
    /// The page could not be rendered; the slot stays a placeholder.
    Failed(PdfEngineError),
}

impl Thumbnail {
    pub fn image(&self) -> Option<&RgbaImage> {
        match self {
            Thumbnail::Ready(image) => Some(image),
            Thumbnail::Failed(_) => None,
        }
    }
}

/// Renders page previews one by one at `scale`, handing each to `sink`.
///
/// A failing page yields [`Thumbnail::Failed`] and generation moves on.
/// Once `token` is cancelled nothing more reaches `sink`. Returns the number
/// of pages delivered.
pub fn generate_thumbnails<F>(
    engine: &dyn PdfEngine,
    handle: DocumentHandle,
    page_count: u32,
    scale: f32,
    token: &CancellationToken,
    mut sink: F,
) -> u32
where
    F: FnMut(u32, Thumbnail),
{
    let mut delivered = 0;
    for page in 1..=page_count {
        if token.is_cancelled() {
            log::debug!("thumbnail generation stopped at page {page}");
            break;
        }

        let request = RenderRequest { page_index: page - 1, scale };
        let thumbnail = match engine.render_page(handle, request) {
            Ok(image) => Thumbnail::Ready(image),
            Err(error) => {
                log::warn!("thumbnail for page {page} failed: {error}");
                Thumbnail::Failed(error)
            }
        };

        if token.is_cancelled() {
            break;
        }
        sink(page, thumbnail);
        delivered += 1;
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeEngine;
    use pdf_engine::OpenSource;

    #[test]
    fn one_failing_page_does_not_stop_the_rest() {
        let mut engine =
            FakeEngine::with_pages(&[(100.0, 100.0), (100.0, 100.0), (100.0, 200.0)]);
        engine.fail_page(2);
        let handle = engine.open(OpenSource::Bytes(Vec::new())).expect("open");

        let mut thumbs = Vec::new();
        let token = CancellationToken::new();
        let delivered = generate_thumbnails(&engine, handle, 3, 0.25, &token, |page, thumb| {
            thumbs.push((page, thumb))
        });

        assert_eq!(delivered, 3);
        match &thumbs[1] {
            (2, Thumbnail::Failed(PdfEngineError::Backend(message))) => {
                assert_eq!(message, "page 2 is corrupt");
            }
            other => panic!("expected the engine error for page 2, got {other:?}"),
        }
        assert_eq!(thumbs[0].1.image().map(|i| i.dimensions()), Some((25, 25)));
        assert_eq!(thumbs[2].1.image().map(|i| i.dimensions()), Some((25, 50)));
    }

    #[test]
    fn cancelled_generation_writes_nothing_further() {
        let mut engine = FakeEngine::with_pages(&[(100.0, 100.0); 4]);
        let handle = engine.open(OpenSource::Bytes(Vec::new())).expect("open");
        let token = CancellationToken::new();

        let mut pages = Vec::new();
        generate_thumbnails(&engine, handle, 4, 0.25, &token, |page, _| {
            pages.push(page);
            if page == 2 {
                token.cancel();
            }
        });

        assert_eq!(pages, vec![1, 2]);
    }
}
