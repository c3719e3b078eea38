use crate::entry::Entry;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("order with id - {0} not found")]
    NotFound(String),
    /// The backend could not serve the request.
    #[allow(dead_code)]
    #[error("location store unavailable: {0}")]
    Unavailable(String),
}

/// Storage seam used by the request layer. Any backend able to append, read
/// and delete per-order position history can sit behind the api.
pub trait LocationStore: Send + Sync {
    /// Appends `entry` to the history of `order_id`, stamping its creation time.
    fn append(&self, order_id: &str, entry: Entry) -> Result<(), StoreError>;

    /// Returns a snapshot of the history of `order_id`, oldest first.
    ///
    /// With `depth` set, only the most recent `depth` entries are returned.
    /// Depth is clamped to `[0, len]`, so negative values yield an empty
    /// history and oversized values yield the full history.
    fn read(&self, order_id: &str, depth: Option<i64>) -> Result<Vec<Entry>, StoreError>;

    /// Removes `order_id` and its whole history.
    fn delete(&self, order_id: &str) -> Result<(), StoreError>;
}
