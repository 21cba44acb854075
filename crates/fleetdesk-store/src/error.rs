/// Errors that can occur talking to either store.
///
/// None of these say anything about whether a session is valid; they only
/// mean the answer couldn't be obtained (or persisted) right now.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The remote store could not be reached or refused the call.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Reading or writing the local persistence file failed.
    #[error("local store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The local persistence file exists but isn't a JSON object of strings.
    #[error("local store contents are corrupt: {0}")]
    Corrupt(#[source] serde_json::Error),
}
