use std::path::Path;
use std::process::Command;

use tracing::debug;

use super::Marker;
use crate::config::TemplateSettings;
use crate::dom::Document;
use crate::error::HistoryError;

/// Where the markup used for extraction came from.
#[derive(Debug, Clone)]
pub enum PageSource {
    /// The page has not been migrated yet; its own markup is authoritative.
    Current(String),
    /// The page was already migrated; metadata recovered from an older revision.
    Historical { revision: String, markup: String },
    /// Already migrated and no older revision was reachable. Metadata may be the template's.
    Fallback { markup: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Current,
    Historical,
    Fallback,
}

impl PageSource {
    pub fn markup(&self) -> &str {
        match self {
            PageSource::Current(markup)
            | PageSource::Historical { markup, .. }
            | PageSource::Fallback { markup, .. } => markup,
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            PageSource::Current(_) => SourceKind::Current,
            PageSource::Historical { .. } => SourceKind::Historical,
            PageSource::Fallback { .. } => SourceKind::Fallback,
        }
    }
}

impl SourceKind {
    pub fn label(self) -> &'static str {
        match self {
            SourceKind::Current => "current",
            SourceKind::Historical => "history",
            SourceKind::Fallback => "fallback",
        }
    }
}

/// Read access to earlier revisions of a file.
pub trait RevisionStore {
    fn show(&self, path: &Path, revision: &str) -> Result<String, HistoryError>;
}

/// Shells out to `git show <rev>:./<file>` from the file's directory.
pub struct GitCli;

impl RevisionStore for GitCli {
    fn show(&self, path: &Path, revision: &str) -> Result<String, HistoryError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| HistoryError::BadPath(path.to_path_buf()))?;
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let object = format!("{}:./{}", revision, name);

        let output = Command::new("git")
            .args(["show", &object])
            .current_dir(dir)
            .output()?;

        if !output.status.success() {
            return Err(HistoryError::Command {
                revision: object,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        String::from_utf8(output.stdout).map_err(|_| HistoryError::Encoding(object))
    }
}

/// True when the page already carries the template's content marker or chrome ids.
pub fn looks_applied(markup: &str, applied_ids: &[String]) -> bool {
    if markup.contains(Marker::PageContent.token()) {
        return true;
    }
    if applied_ids.is_empty() {
        return false;
    }
    let doc = Document::parse(markup);
    applied_ids.iter().any(|id| doc.has_element_id(id))
}

pub fn select_source(
    path: &Path,
    markup: String,
    settings: &TemplateSettings,
    history: &dyn RevisionStore,
) -> PageSource {
    if !looks_applied(&markup, &settings.applied_element_ids) {
        return PageSource::Current(markup);
    }

    let revision = &settings.history_revision;
    match history.show(path, revision) {
        Ok(old) => {
            debug!("Recovered {} from {}", path.display(), revision);
            PageSource::Historical {
                revision: revision.clone(),
                markup: old,
            }
        }
        Err(e) => PageSource::Fallback {
            markup,
            reason: e.to_string(),
        },
    }
}
