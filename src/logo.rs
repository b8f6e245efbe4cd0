use std::fs;

use tracing::{info, warn};

use crate::config::{FileEdit, Replacement, Settings};
use crate::error::SkipReason;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LogoStats {
    pub files: usize,
    pub updated: usize,
    pub missing: usize,
    pub replacements: usize,
}

/// Apply every configured literal edit; files that are absent are reported and skipped.
pub fn apply_edits(settings: &Settings, dry_run: bool) -> LogoStats {
    let mut stats = LogoStats {
        files: settings.logo.edits.len(),
        ..LogoStats::default()
    };

    for edit in &settings.logo.edits {
        match apply_edit(settings, edit, dry_run) {
            Ok(0) => info!("No logo rules matched in {}", edit.path.display()),
            Ok(n) => {
                stats.updated += 1;
                stats.replacements += n;
                info!(dry_run, "Updated {} logo size ({} replacements)", edit.path.display(), n);
            }
            Err(reason) => {
                if matches!(reason, SkipReason::NotFound(_)) {
                    stats.missing += 1;
                }
                warn!("Skipping {}", reason);
            }
        }
    }

    stats
}

fn apply_edit(settings: &Settings, edit: &FileEdit, dry_run: bool) -> Result<usize, SkipReason> {
    let path = settings.resolve(&edit.path);
    if !path.is_file() {
        return Err(SkipReason::NotFound(path));
    }
    let content = fs::read_to_string(&path).map_err(|e| SkipReason::io(&path, e))?;
    let (updated, count) = replace_literals(&content, &edit.replacements);
    if count > 0 && !dry_run {
        fs::write(&path, updated).map_err(|e| SkipReason::io(&path, e))?;
    }
    Ok(count)
}

/// Apply replacements in order, each to every occurrence. Empty patterns are ignored.
pub fn replace_literals(content: &str, replacements: &[Replacement]) -> (String, usize) {
    let mut text = content.to_string();
    let mut count = 0;
    for r in replacements.iter().filter(|r| !r.from.is_empty() && r.from != r.to) {
        let hits = text.matches(r.from.as_str()).count();
        if hits > 0 {
            text = text.replace(r.from.as_str(), &r.to);
            count += hits;
        }
    }
    (text, count)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn rep(from: &str, to: &str) -> Replacement {
        Replacement {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    #[test]
    fn replaces_every_occurrence() {
        let css = ".logo img { height: 50px; }\n.badge img { height: 50px; }\n";
        let (out, n) = replace_literals(css, &[rep("height: 50px;", "height: 100px;")]);
        assert_eq!(n, 2);
        assert_eq!(out, ".logo img { height: 100px; }\n.badge img { height: 100px; }\n");
    }

    #[test]
    fn ignores_empty_and_identity_rules() {
        let (out, n) = replace_literals("abc", &[rep("", "x"), rep("b", "b")]);
        assert_eq!(n, 0);
        assert_eq!(out, "abc");
    }

    #[test]
    fn default_edits_against_site() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("css")).unwrap();
        fs::write(
            root.join("index.html"),
            "<style>:root { --header-height-desktop: 80px; } .logo-container { height: 70px; }</style>",
        )
        .unwrap();
        fs::write(root.join("css/funnel.css"), ".logo img { height: 50px; }").unwrap();
        fs::write(root.join("css/quick-fixes.css"), ".footer-logo { width: auto; }").unwrap();

        let settings = Settings {
            site_root: root.to_path_buf(),
            ..Settings::default()
        };
        let stats = apply_edits(&settings, false);
        assert_eq!(
            stats,
            LogoStats { files: 4, updated: 2, missing: 1, replacements: 3 }
        );
        assert_eq!(
            fs::read_to_string(root.join("index.html")).unwrap(),
            "<style>:root { --header-height-desktop: 160px; } .logo-container { height: 140px; }</style>"
        );
        assert_eq!(
            fs::read_to_string(root.join("css/funnel.css")).unwrap(),
            ".logo img { height: 100px; }"
        );
        assert!(!root.join("rpm-next").exists());
    }

    #[test]
    fn dry_run_counts_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Header.tsx");
        fs::write(&path, "fontSize: '2rem'").unwrap();
        let settings = Settings {
            site_root: dir.path().to_path_buf(),
            logo: crate::config::LogoSettings {
                edits: vec![FileEdit {
                    path: PathBuf::from("Header.tsx"),
                    replacements: vec![rep("fontSize: '2rem'", "fontSize: '4rem'")],
                }],
            },
            ..Settings::default()
        };
        let stats = apply_edits(&settings, true);
        assert_eq!(stats.replacements, 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), "fontSize: '2rem'");
    }
}
