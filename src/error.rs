use std::path::PathBuf;

/// Why a single file was left alone. Never fatal for the batch.
#[derive(Debug, thiserror::Error)]
pub enum SkipReason {
    #[error("{} not found", .0.display())]
    NotFound(PathBuf),
    #[error("no <body> element in {}", .0.display())]
    MissingBody(PathBuf),
    #[error("could not find </head> in {}", .0.display())]
    MissingHead(PathBuf),
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SkipReason {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SkipReason::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("failed to run git: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("git show {revision} failed: {stderr}")]
    Command { revision: String, stderr: String },
    #[error("revision {0} is not valid UTF-8")]
    Encoding(String),
    #[error("{0} has no parent directory or file name")]
    BadPath(PathBuf),
}

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("image API returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("undecodable response: {0}")]
    Decode(String),
    #[error("failed to save {}: {source}", .path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
