use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use m3u::Playlist;
use streamcheck_engine::{
    RequestHeaders, ResultAggregator, RunSummary, StreamValidator, ValidatorConfig,
};
use tracing::{info, warn};

use crate::error::AppError;

/// Validates the playlist at `input` and writes the accepted entries to
/// `output`. The output file is written even when nothing passes.
pub async fn run(
    input: &Path,
    output: &Path,
    config: ValidatorConfig,
) -> Result<RunSummary, AppError> {
    let started = Instant::now();

    let bytes = tokio::fs::read(input)
        .await
        .map_err(|source| AppError::InputUnavailable {
            path: input.to_path_buf(),
            source,
        })?;
    let Playlist { header, entries } = Playlist::from_bytes(&bytes);
    info!(path = %input.display(), entries = entries.len(), "Playlist loaded");
    if entries.is_empty() {
        warn!(path = %input.display(), "Playlist has no stream entries");
    }

    let fallback_headers = RequestHeaders::from_playlist_header(&header.directives[..]);
    let validator =
        Arc::new(StreamValidator::from_config(&config)?.with_fallback_headers(fallback_headers));

    let run = ResultAggregator::new(config.annotation.clone())
        .consume(validator.validate_all(entries))
        .await;

    let rendered = m3u::render(&header, &run.entries);
    tokio::fs::write(output, rendered)
        .await
        .map_err(|source| AppError::OutputWrite {
            path: output.to_path_buf(),
            source,
        })?;

    info!(
        path = %output.display(),
        written = run.entries.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Playlist written"
    );
    run.summary.log_summary();

    Ok(run.summary)
}
