use thiserror::Error;

/// Prefix used for every message shown to the user.
pub const ERROR_PREFIX: &str = "FolderLinks";

#[derive(Debug, Error)]
pub enum FolderLinksError {
    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    #[error("Folder already exists: {0}")]
    FolderExists(String),

    #[error("Path is outside the vault: {0}")]
    OutsideVault(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to update links in {file}: {reason}")]
    RewriteFailed { file: String, reason: String },

    #[error("More than one instance of {0} available!")]
    MultipleInstances(String),

    #[error("could not update editor state")]
    EditorStateUnavailable,

    #[error("Settings error: {0}")]
    Settings(String),
}

impl FolderLinksError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        FolderLinksError::Io {
            path: path.into(),
            source,
        }
    }

    /// Message as shown in a user notice.
    pub fn user_message(&self) -> String {
        format!("{}: Error: {}", ERROR_PREFIX, self)
    }
}

pub type Result<T> = std::result::Result<T, FolderLinksError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_is_prefixed() {
        let err = FolderLinksError::FolderNotFound("Projects".into());
        assert_eq!(err.user_message(), "FolderLinks: Error: Folder not found: Projects");
    }

    #[test]
    fn rewrite_failure_names_file() {
        let err = FolderLinksError::RewriteFailed {
            file: "Notes/a.md".into(),
            reason: "permission denied".into(),
        };
        assert!(err.to_string().contains("Notes/a.md"));
    }
}
