use crate::dto::Document;
use crate::error::Result;
use std::sync::mpsc;
use std::thread;

/// Feeds `docs` to `consume` in batches of up to `batch_size` documents.
///
/// Reading happens on a separate thread that keeps at most `queue_depth` batches in flight.
/// Batches arrive in source order and reading ends at the first `None` from `docs`. Returns
/// once the reader is drained and joined, or with the first error from `consume`, which also
/// stops the reader.
pub fn for_each_batch<I, F>(
    docs: I,
    batch_size: usize,
    queue_depth: usize,
    mut consume: F,
) -> Result<()>
where
    I: Iterator<Item = Document> + Send,
    F: FnMut(Vec<Document>) -> Result<()>,
{
    let batch_size = batch_size.max(1);
    thread::scope(|scope| {
        let (sender, receiver) = mpsc::sync_channel::<Vec<Document>>(queue_depth.max(1));
        scope.spawn(move || {
            let mut docs = docs.fuse();
            loop {
                let batch: Vec<Document> = docs.by_ref().take(batch_size).collect();
                // a closed receiver means the consumer gave up
                if batch.is_empty() || sender.send(batch).is_err() {
                    break;
                }
            }
        });
        for batch in receiver {
            consume(batch)?;
        }
        Ok(())
    })
}
