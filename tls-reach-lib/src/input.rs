//! Domain-list ingestion.
//!
//! Domain lists hold one or several domains per line, separated by
//! whitespace or commas. Every token becomes one task; duplicates are kept.
//! Sending blocks while the task queue is full, so a large list is never
//! read ahead of the workers.

use crate::error::ReachError;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::Sender;
use tracing::{debug, info, warn};

/// Split `text` into domain tokens on Unicode whitespace and commas.
pub fn split_domains(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
}

/// Stream the domains of `reader` into `tasks`.
///
/// Returns how many domains were queued. Stops early without error when the
/// task queue is closed. A read error ends this source. Bytes that are not
/// UTF-8 are replaced, so the rest of the source is still read.
pub async fn feed_reader<R>(
    reader: R,
    tasks: &Sender<String>,
    source: &str,
) -> Result<usize, ReachError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.split(b'\n');
    let mut queued = 0;

    while let Some(line) = lines
        .next_segment()
        .await
        .map_err(|e| ReachError::file_error(source, e.to_string()))?
    {
        let line = String::from_utf8_lossy(&line);
        if matches!(line, Cow::Owned(_)) {
            warn!("invalid UTF-8 replaced in {}", source);
        }
        for domain in split_domains(&line) {
            if tasks.send(domain.to_string()).await.is_err() {
                debug!("task queue closed while reading {}", source);
                return Ok(queued);
            }
            queued += 1;
        }
    }

    Ok(queued)
}

/// Feed every file in order, then close the task queue.
///
/// A file that cannot be opened is skipped; a read error moves on to the
/// next file. Returns the total number of queued domains.
pub async fn feed_files(paths: &[PathBuf], tasks: Sender<String>) -> usize {
    let mut total = 0;

    for path in paths {
        if tasks.is_closed() {
            break;
        }
        match feed_file(path, &tasks).await {
            Ok(queued) => total += queued,
            Err(e) => warn!("{}", e),
        }
    }

    info!("queued {} domains from {} files", total, paths.len());
    total
}

async fn feed_file(path: &Path, tasks: &Sender<String>) -> Result<usize, ReachError> {
    let source = path.display().to_string();
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| ReachError::file_error(&source, format!("can't open input file: {}", e)))?;

    info!("reading domains from {}", source);
    feed_reader(BufReader::new(file), tasks, &source).await
}

/// Feed domains from standard input, then close the task queue.
pub async fn feed_stdin(tasks: Sender<String>) -> usize {
    info!("reading domains from stdin");
    match feed_reader(BufReader::new(tokio::io::stdin()), &tasks, "<stdin>").await {
        Ok(queued) => queued,
        Err(e) => {
            warn!("{}", e);
            0
        }
    }
}
