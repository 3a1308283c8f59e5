//! Shared "fetch until exhausted" loop for the pager and the drainer

use crate::broker::BrokerError;
use async_trait::async_trait;

/// Something that hands out successive batches from a sub-queue
#[async_trait]
pub trait BatchSource: Send {
    type Item: Send;

    /// Fetch the next batch
    async fn next_batch(&mut self) -> Result<Vec<Self::Item>, BrokerError>;

    /// Whether a batch of `len` items proves nothing further remains.
    /// An empty batch always ends the loop.
    fn is_exhausted_by(&self, len: usize) -> bool {
        len == 0
    }
}

/// A loop that stopped on a broker error, with everything fetched before it
#[derive(Debug)]
pub struct BatchFailure<T> {
    pub collected: Vec<T>,
    pub error: BrokerError,
}

/// Fetch batches from `source` until it reports exhaustion.
///
/// On failure the items already collected are handed back alongside the
/// error; for destructive sources they exist nowhere else.
pub async fn collect_batches<S>(source: &mut S) -> Result<Vec<S::Item>, BatchFailure<S::Item>>
where
    S: BatchSource,
{
    let mut collected = Vec::new();

    loop {
        let batch = match source.next_batch().await {
            Ok(batch) => batch,
            Err(error) => return Err(BatchFailure { collected, error }),
        };

        let len = batch.len();
        collected.extend(batch);

        if len == 0 || source.is_exhausted_by(len) {
            return Ok(collected);
        }
    }
}
