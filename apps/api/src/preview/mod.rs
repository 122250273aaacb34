// Live preview: font metrics, one-page font fitting, page fill hints.

pub mod font_metrics;
pub mod page_fill;
pub mod renderer;

pub use renderer::{render, PreviewConfig, PreviewLayout};

use crate::errors::AppError;
use crate::models::resume::ResumeDocument;

/// Renders on the blocking pool so measurement never stalls the executor.
pub async fn render_blocking(
    document: ResumeDocument,
    config: PreviewConfig,
) -> Result<PreviewLayout, AppError> {
    tokio::task::spawn_blocking(move || render(&document, &config))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("spawn_blocking failed in preview render: {e}")))
}
