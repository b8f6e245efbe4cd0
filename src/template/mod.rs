pub mod content;
pub mod extract;
pub mod source;

use std::fs;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::{Captures, Regex};
use tracing::{info, warn};

use crate::config::Settings;
use crate::error::SkipReason;
use extract::{extract_page, ExtractContext, PageRecord};
use source::{select_source, PageSource, RevisionStore, SourceKind};

static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    let alternatives: Vec<String> = Marker::ALL
        .iter()
        .map(|m| regex::escape(m.token()))
        .collect();
    Regex::new(&alternatives.join("|")).unwrap()
});

/// Injection points in the shared template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    PageTitle,
    OgTitle,
    CanonicalUrl,
    MetaDescription,
    OgDescription,
    MetaKeywords,
    ExtraStyles,
    ExtraScripts,
    PageContent,
}

impl Marker {
    pub const ALL: [Marker; 9] = [
        Marker::PageTitle,
        Marker::OgTitle,
        Marker::CanonicalUrl,
        Marker::MetaDescription,
        Marker::OgDescription,
        Marker::MetaKeywords,
        Marker::ExtraStyles,
        Marker::ExtraScripts,
        Marker::PageContent,
    ];

    pub fn token(self) -> &'static str {
        match self {
            Marker::PageTitle => "<!-- PAGE_TITLE -->",
            Marker::OgTitle => "<!-- OG_TITLE -->",
            Marker::CanonicalUrl => "<!-- CANONICAL_URL -->",
            Marker::MetaDescription => "<!-- META_DESCRIPTION -->",
            Marker::OgDescription => "<!-- OG_DESCRIPTION -->",
            Marker::MetaKeywords => "<!-- META_KEYWORDS -->",
            Marker::ExtraStyles => "<!-- EXTRA_STYLES -->",
            Marker::ExtraScripts => "<!-- EXTRA_SCRIPTS -->",
            Marker::PageContent => "<!-- PAGE_CONTENT -->",
        }
    }

    fn from_token(token: &str) -> Option<Marker> {
        Marker::ALL.into_iter().find(|m| m.token() == token)
    }

    fn value(self, record: &PageRecord) -> String {
        match self {
            Marker::PageTitle | Marker::OgTitle => record.title.clone(),
            Marker::CanonicalUrl => record.canonical_url.clone(),
            Marker::MetaDescription | Marker::OgDescription => record.description.clone(),
            Marker::MetaKeywords => record.keywords.clone(),
            Marker::ExtraStyles => record.styles.join("\n"),
            Marker::ExtraScripts => record.structured_data.join("\n"),
            Marker::PageContent => record.content.clone(),
        }
    }
}

/// Single pass over the template; inserted values are never re-scanned for markers.
pub fn substitute(template: &str, record: &PageRecord) -> String {
    MARKER_RE
        .replace_all(template, |caps: &Captures| {
            let token = &caps[0];
            Marker::from_token(token)
                .map(|m| m.value(record))
                .unwrap_or_else(|| token.to_string())
        })
        .into_owned()
}

/// Counts returned after a batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApplyStats {
    pub total: usize,
    pub applied: usize,
    pub skipped: usize,
    pub fallbacks: usize,
}

/// Apply the template to every file in `files`. Per-file failures are logged and skipped.
pub fn apply_batch(
    settings: &Settings,
    files: &[String],
    history: &dyn RevisionStore,
    dry_run: bool,
) -> Result<ApplyStats> {
    let template_path = settings.resolve(&settings.template.path);
    let template = fs::read_to_string(&template_path)
        .with_context(|| format!("Failed to read template {:?}", template_path))?;
    let ctx = ExtractContext::new(settings)?;

    let mut stats = ApplyStats {
        total: files.len(),
        ..ApplyStats::default()
    };

    for filename in files {
        match apply_one(&ctx, &template, filename, history, dry_run) {
            Ok(kind) => {
                stats.applied += 1;
                if kind == SourceKind::Fallback {
                    stats.fallbacks += 1;
                }
                info!(source = kind.label(), dry_run, "Applied template to {}", filename);
            }
            Err(reason) => {
                stats.skipped += 1;
                warn!("Skipping {}: {}", filename, reason);
            }
        }
    }

    Ok(stats)
}

fn apply_one(
    ctx: &ExtractContext<'_>,
    template: &str,
    filename: &str,
    history: &dyn RevisionStore,
    dry_run: bool,
) -> Result<SourceKind, SkipReason> {
    let (record, kind) = load_record(ctx, filename, history)?;
    let output = substitute(template, &record);
    if !dry_run {
        let path = ctx.settings.resolve(filename);
        fs::write(&path, output).map_err(|e| SkipReason::io(&path, e))?;
    }
    Ok(kind)
}

/// Select the source revision for `filename` and extract its page record.
pub fn load_record(
    ctx: &ExtractContext<'_>,
    filename: &str,
    history: &dyn RevisionStore,
) -> Result<(PageRecord, SourceKind), SkipReason> {
    let path = ctx.settings.resolve(filename);
    if !path.is_file() {
        return Err(SkipReason::NotFound(path));
    }
    let markup = fs::read_to_string(&path).map_err(|e| SkipReason::io(&path, e))?;

    let source = select_source(&path, markup, &ctx.settings.template, history);
    if let PageSource::Fallback { reason, .. } = &source {
        warn!(
            "{} already uses the template and no earlier revision is available ({}); metadata may be lost",
            filename, reason
        );
    }

    let record = extract_page(source.markup(), filename, &path, ctx)?;
    Ok((record, source.kind()))
}

/// Extract without writing anything, for the `inspect` command.
pub fn inspect(settings: &Settings, filename: &str, history: &dyn RevisionStore) -> Result<PageRecord> {
    let ctx = ExtractContext::new(settings)?;
    let (record, kind) = load_record(&ctx, filename, history)?;
    info!(source = kind.label(), "Extracted {}", filename);
    Ok(record)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use content::ContentStrategy;
    use source::tests::FakeHistory;
    use std::path::Path;

    fn record() -> PageRecord {
        PageRecord {
            title: "Ice Machine Repair".into(),
            canonical_url: "https://rapidpromemphis.com/memphis-ice-machine-service.html".into(),
            description: "Cold & fast".into(),
            keywords: "ice, repair".into(),
            structured_data: vec![r#"<script type="application/ld+json">{"a":1}</script>"#.into()],
            styles: vec!["<style>.hero{}</style>".into()],
            content: "<p>$1 per cube</p>".into(),
            content_strategy: ContentStrategy::Container,
        }
    }

    fn site(dir: &Path) -> Settings {
        fs::copy("tests/fixtures/template.html", dir.join("template.html")).unwrap();
        Settings {
            site_root: dir.to_path_buf(),
            ..Settings::default()
        }
    }

    #[test]
    fn every_marker_replaced_in_place() {
        let template = "A<!-- PAGE_TITLE -->B<!-- CANONICAL_URL -->C<!-- META_DESCRIPTION -->D\
                        <!-- META_KEYWORDS -->E<!-- EXTRA_STYLES -->F<!-- EXTRA_SCRIPTS -->G<!-- PAGE_CONTENT -->H";
        let r = record();
        let out = substitute(template, &r);
        assert_eq!(
            out,
            format!(
                "A{}B{}C{}D{}E{}F{}G{}H",
                r.title, r.canonical_url, r.description, r.keywords, r.styles[0], r.structured_data[0], r.content
            )
        );
        for m in Marker::ALL {
            assert!(!out.contains(m.token()));
        }
        assert_eq!(out.matches("Ice Machine Repair").count(), 1);
    }

    #[test]
    fn values_are_not_rescanned() {
        let mut r = record();
        r.content = "<!-- PAGE_TITLE -->".into();
        let out = substitute("<!-- PAGE_CONTENT -->|<!-- PAGE_TITLE -->", &r);
        assert_eq!(out, "<!-- PAGE_TITLE -->|Ice Machine Repair");
    }

    #[test]
    fn unknown_markers_and_missing_markers() {
        let out = substitute("<!-- HERO_IMAGE --><!-- OG_TITLE -->", &record());
        assert_eq!(out, "<!-- HERO_IMAGE -->Ice Machine Repair");
        assert_eq!(substitute("static", &record()), "static");
    }

    #[test]
    fn batch_applies_and_skips() {
        let dir = tempfile::tempdir().unwrap();
        let settings = site(dir.path());
        fs::copy(
            "tests/fixtures/legacy-page.html",
            dir.path().join("memphis-commercial-oven-repair.html"),
        )
        .unwrap();
        fs::write(dir.path().join("headless.html"), "<html><head></head></html>").unwrap();

        let files = vec![
            "memphis-commercial-oven-repair.html".to_string(),
            "missing.html".to_string(),
            "headless.html".to_string(),
        ];
        let stats = apply_batch(&settings, &files, &FakeHistory::default(), false).unwrap();
        assert_eq!(
            stats,
            ApplyStats { total: 3, applied: 1, skipped: 2, fallbacks: 0 }
        );

        let out = fs::read_to_string(dir.path().join("memphis-commercial-oven-repair.html")).unwrap();
        assert!(out.contains("<title>Commercial Oven Repair Memphis | Rapid Pro</title>"));
        assert!(out.contains(r#"<link rel="canonical" href="https://rapidpromemphis.com/oven-repair">"#));
        assert!(out.contains("Oven Repair Experts"));
        assert!(out.contains("FAQPage"));
        assert!(out.contains(".oven-hero"));
        assert!(out.contains(r#"id="site-header""#));
        for m in Marker::ALL {
            assert!(!out.contains(m.token()), "{} left in output", m.token());
        }
        // untouched
        assert_eq!(
            fs::read_to_string(dir.path().join("headless.html")).unwrap(),
            "<html><head></head></html>"
        );
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let settings = site(dir.path());
        let legacy = fs::read_to_string("tests/fixtures/legacy-page.html").unwrap();
        fs::write(dir.path().join("oven.html"), &legacy).unwrap();

        let stats = apply_batch(&settings, &["oven.html".to_string()], &FakeHistory::default(), true).unwrap();
        assert_eq!(stats.applied, 1);
        assert_eq!(fs::read_to_string(dir.path().join("oven.html")).unwrap(), legacy);
    }

    #[test]
    fn reapplying_recovers_metadata_from_history() {
        let dir = tempfile::tempdir().unwrap();
        let settings = site(dir.path());
        let legacy = fs::read_to_string("tests/fixtures/legacy-page.html").unwrap();
        let name = "memphis-commercial-oven-repair.html";
        fs::write(dir.path().join(name), &legacy).unwrap();
        let files = vec![name.to_string()];

        apply_batch(&settings, &files, &FakeHistory::default(), false).unwrap();
        let first = fs::read_to_string(dir.path().join(name)).unwrap();

        let history = FakeHistory::with(name, "HEAD~1", &legacy);
        let stats = apply_batch(&settings, &files, &history, false).unwrap();
        assert_eq!(stats.fallbacks, 0);
        assert_eq!(fs::read_to_string(dir.path().join(name)).unwrap(), first);
    }

    #[test]
    fn reapplying_without_history_counts_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let settings = site(dir.path());
        let name = "oven.html";
        fs::copy("tests/fixtures/legacy-page.html", dir.path().join(name)).unwrap();
        let files = vec![name.to_string()];

        apply_batch(&settings, &files, &FakeHistory::default(), false).unwrap();
        let stats = apply_batch(&settings, &files, &FakeHistory::default(), false).unwrap();
        assert_eq!(stats.applied, 1);
        assert_eq!(stats.fallbacks, 1);
    }

    #[test]
    fn missing_template_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            site_root: dir.path().to_path_buf(),
            ..Settings::default()
        };
        assert!(apply_batch(&settings, &[], &FakeHistory::default(), false).is_err());
    }

    #[test]
    fn inspect_reports_record() {
        let dir = tempfile::tempdir().unwrap();
        let settings = site(dir.path());
        fs::write(
            dir.path().join("memphis-ice-machine-service.html"),
            "<html><head><title>Ice Machine Repair</title></head><body><main>Ice</main></body></html>",
        )
        .unwrap();
        let r = inspect(&settings, "memphis-ice-machine-service.html", &FakeHistory::default()).unwrap();
        assert_eq!(r.title, "Ice Machine Repair");
        assert_eq!(r.canonical_url, "https://rapidpromemphis.com/memphis-ice-machine-service.html");
        assert!(inspect(&settings, "nope.html", &FakeHistory::default()).is_err());
    }
}
