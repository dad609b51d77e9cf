//! Batch chunking and concurrent dispatch
//!
//! The store caps how many items a single batch call may carry. Inputs are
//! split into chunks under that ceiling and every chunk is sent concurrently;
//! the aggregate call succeeds only if every chunk does.

use futures::stream::{self, StreamExt};
use std::future::Future;

use crate::db::store::StoreError;

/// Maximum keys per batched get
pub const BATCH_GET_LIMIT: usize = 100;

/// Maximum items per batched write or delete
pub const BATCH_WRITE_LIMIT: usize = 25;

/// Chunk requests allowed in flight at once
const MAX_CONCURRENT_CHUNKS: usize = 16;

/// Result of one chunk of a batch
#[derive(Debug)]
pub struct ChunkOutcome<R> {
    /// Position of the chunk in the input
    pub index: usize,
    /// Number of items the chunk carried
    pub len: usize,
    pub result: Result<R, StoreError>,
}

/// Per-chunk report of a batch, without collapsing failures
#[derive(Debug)]
pub struct BatchReport {
    pub outcomes: Vec<ChunkOutcome<()>>,
}

impl BatchReport {
    /// Items carried by chunks that succeeded
    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_ok())
            .map(|o| o.len)
            .sum()
    }

    /// Items carried by chunks that failed
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_err())
            .map(|o| o.len)
            .sum()
    }

    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }
}

/// Split `items` into ordered chunks of at most `size` items
pub fn chunk<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    items.chunks(size.max(1)).map(<[T]>::to_vec).collect()
}

/// Run `operation` for every chunk concurrently and report each outcome.
///
/// Outcomes come back in chunk order. Every chunk runs to completion.
pub async fn dispatch_with_outcomes<I, R, F, Fut>(
    chunks: Vec<Vec<I>>,
    operation: F,
) -> Vec<ChunkOutcome<R>>
where
    F: Fn(Vec<I>) -> Fut,
    Fut: Future<Output = Result<R, StoreError>>,
{
    stream::iter(chunks.into_iter().enumerate())
        .map(|(index, chunk)| {
            let len = chunk.len();
            let call = operation(chunk);
            async move {
                ChunkOutcome {
                    index,
                    len,
                    result: call.await,
                }
            }
        })
        .buffered(MAX_CONCURRENT_CHUNKS)
        .collect()
        .await
}

/// Run `operation` for every chunk concurrently, all-or-nothing.
///
/// Waits for every chunk, then fails with the first chunk error if any
/// chunk failed. On success returns the per-chunk results in chunk order.
pub async fn dispatch<I, R, F, Fut>(chunks: Vec<Vec<I>>, operation: F) -> Result<Vec<R>, StoreError>
where
    F: Fn(Vec<I>) -> Fut,
    Fut: Future<Output = Result<R, StoreError>>,
{
    let total = chunks.len();
    let outcomes = dispatch_with_outcomes(chunks, operation).await;

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    if failed > 0 {
        tracing::warn!(failed_chunks = failed, total_chunks = total, "Batch operation failed");
    }

    outcomes.into_iter().map(|o| o.result).collect()
}
