use thiserror::Error;

/// Fatal conditions. Everything recoverable (a malformed game, a team with a
/// short history) is reported as a warning on the relevant summary struct
/// instead, so one bad row never aborts a batch.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The feature layout the caller built does not match the layout the
    /// artifact was trained with. Aborting is the only safe move: reordering
    /// or padding would silently feed the model garbage.
    #[error(
        "feature schema mismatch at position {position}: artifact expects {artifact}, caller built {built}"
    )]
    FeatureSchemaMismatch {
        position: usize,
        artifact: String,
        built: String,
    },

    #[error(
        "insufficient data for requested fold count: {rows} rows cannot support {folds} folds (need at least {needed})"
    )]
    InsufficientFoldData {
        rows: usize,
        folds: usize,
        needed: usize,
    },

    #[error("model artifact missing at {path}")]
    ModelArtifactMissing { path: String },

    #[error("model artifact at {path} unreadable: {message}")]
    ArtifactUnreadable { path: String, message: String },
}
