//! Error types for the model layer.

/// Errors raised while turning stored text back into model values.
///
/// Both variants show up when the client-side cache holds something the
/// current build can't interpret (an old role name, a hand-edited id).
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The text is not a valid user id.
    #[error("invalid user id: {0}")]
    InvalidUserId(String),

    /// The text does not name a known role.
    #[error("unknown role: {0}")]
    UnknownRole(String),
}
