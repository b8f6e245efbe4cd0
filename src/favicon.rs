use std::fs;
use std::ops::Range;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::FaviconSettings;
use crate::error::SkipReason;

static HEAD_CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</head\s*>").unwrap());

/// `rel` tokens that mark a `<link>` as favicon markup.
const FAVICON_RELS: &[&str] = &[
    "icon",
    "shortcut",
    "apple-touch-icon",
    "apple-touch-icon-precomposed",
    "mask-icon",
    "manifest",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaviconEdit {
    AlreadyCurrent,
    MissingHead,
    Rewritten { markup: String, removed: usize },
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FaviconStats {
    pub scanned: usize,
    pub updated: usize,
    pub current: usize,
    pub skipped: usize,
}

/// Swap whatever favicon markup `markup` carries for `settings.block`.
pub fn rewrite_markup(markup: &str, settings: &FaviconSettings) -> FaviconEdit {
    if !settings.sentinels.is_empty()
        && settings.sentinels.iter().all(|s| markup.contains(s.as_str()))
    {
        return FaviconEdit::AlreadyCurrent;
    }
    if !HEAD_CLOSE_RE.is_match(markup) {
        return FaviconEdit::MissingHead;
    }

    let (removed, spans) = favicon_spans(markup);
    let stripped = remove_spans(markup, &spans);
    let Some(close) = HEAD_CLOSE_RE.find(&stripped) else {
        return FaviconEdit::MissingHead;
    };

    let mut out = String::with_capacity(stripped.len() + settings.block.len());
    out.push_str(&stripped[..close.start()]);
    out.push_str(&settings.block);
    out.push_str(&stripped[close.start()..]);

    FaviconEdit::Rewritten {
        markup: out,
        removed,
    }
}

/// Number of favicon links and `<!-- Favicon -->` comments found, with their byte ranges
/// widened to whole lines when a node is alone on its line. Ranges are sorted and merged.
fn favicon_spans(markup: &str) -> (usize, Vec<Range<usize>>) {
    let dom = match tl::parse(markup, tl::ParserOptions::default()) {
        Ok(dom) => dom,
        Err(e) => {
            debug!("tl could not parse document: {}", e);
            return (0, Vec::new());
        }
    };

    let bytes = markup.as_bytes();
    let mut spans: Vec<Range<usize>> = dom
        .nodes()
        .iter()
        .filter_map(|node| match node {
            tl::Node::Tag(tag) if is_favicon_link(tag) => source_span(markup, tag.raw().as_bytes()),
            tl::Node::Comment(raw) if is_favicon_comment(&raw.as_utf8_str()) => {
                source_span(markup, raw.as_bytes()).map(|span| widen_comment(bytes, span))
            }
            _ => None,
        })
        .map(|span| whole_line(bytes, span))
        .collect();
    let found = spans.len();

    spans.sort_by_key(|s| s.start);
    let mut merged: Vec<Range<usize>> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(last) if span.start <= last.end => last.end = last.end.max(span.end),
            _ => merged.push(span),
        }
    }
    (found, merged)
}

fn is_favicon_link(tag: &tl::HTMLTag<'_>) -> bool {
    if !tag.name().as_utf8_str().eq_ignore_ascii_case("link") {
        return false;
    }
    tag.attributes().iter().any(|(key, value)| {
        let key: &str = key.as_ref();
        key.eq_ignore_ascii_case("rel")
            && value.is_some_and(|rel| {
                rel.split_ascii_whitespace().any(|token| {
                    FAVICON_RELS
                        .iter()
                        .any(|r| token.eq_ignore_ascii_case(r))
                })
            })
    })
}

fn is_favicon_comment(raw: &str) -> bool {
    let text = raw.trim();
    let text = text.strip_prefix("<!--").unwrap_or(text);
    let text = text.strip_suffix("-->").unwrap_or(text).trim();
    text.eq_ignore_ascii_case("favicon") || text.eq_ignore_ascii_case("favicons")
}

/// Offset of a parser slice inside the source it was parsed from.
fn source_span(source: &str, raw: &[u8]) -> Option<Range<usize>> {
    let start = (raw.as_ptr() as usize).checked_sub(source.as_ptr() as usize)?;
    let end = start.checked_add(raw.len())?;
    (end <= source.len()).then_some(start..end)
}

/// Make sure a comment span covers its `<!--` and `-->` delimiters.
fn widen_comment(bytes: &[u8], span: Range<usize>) -> Range<usize> {
    let start = (span.start.saturating_sub(4)..=span.start)
        .find(|&i| bytes[i..].starts_with(b"<!--"))
        .unwrap_or(span.start);
    let end = (span.end.saturating_sub(3)..=span.end)
        .find(|&i| bytes[i..].starts_with(b"-->"))
        .map(|i| i + 3)
        .unwrap_or(span.end);
    start..end
}

fn whole_line(bytes: &[u8], span: Range<usize>) -> Range<usize> {
    let mut start = span.start;
    while start > 0 && matches!(bytes[start - 1], b' ' | b'\t') {
        start -= 1;
    }
    if start > 0 && bytes[start - 1] != b'\n' {
        return span;
    }

    let mut end = span.end;
    while end < bytes.len() && matches!(bytes[end], b' ' | b'\t' | b'\r') {
        end += 1;
    }
    if end < bytes.len() {
        if bytes[end] != b'\n' {
            return span;
        }
        end += 1;
    }
    start..end
}

fn remove_spans(markup: &str, spans: &[Range<usize>]) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut cursor = 0;
    for span in spans {
        out.push_str(&markup[cursor..span.start]);
        cursor = span.end;
    }
    out.push_str(&markup[cursor..]);
    out
}

/// Rewrite one file. `Ok(true)` when written (or would be, under `dry_run`).
pub fn rewrite_file(path: &Path, settings: &FaviconSettings, dry_run: bool) -> Result<bool, SkipReason> {
    let markup = fs::read_to_string(path).map_err(|e| SkipReason::io(path, e))?;
    match rewrite_markup(&markup, settings) {
        FaviconEdit::AlreadyCurrent => Ok(false),
        FaviconEdit::MissingHead => Err(SkipReason::MissingHead(path.to_path_buf())),
        FaviconEdit::Rewritten { markup, removed } => {
            debug!("{}: removed {} favicon nodes", path.display(), removed);
            if !dry_run {
                fs::write(path, markup).map_err(|e| SkipReason::io(path, e))?;
            }
            Ok(true)
        }
    }
}

/// Walk `root` and rewrite every `.html` file outside the excluded directories.
pub fn rewrite_tree(root: &Path, settings: &FaviconSettings, dry_run: bool) -> FaviconStats {
    let mut stats = FaviconStats::default();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !(e.file_type().is_dir() && is_excluded(root, e.path(), &settings.exclude_dirs)));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Walk error under {}: {}", root.display(), e);
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("html") {
            continue;
        }

        stats.scanned += 1;
        match rewrite_file(path, settings, dry_run) {
            Ok(true) => {
                stats.updated += 1;
                info!(dry_run, "Updated {}", path.display());
            }
            Ok(false) => {
                stats.current += 1;
                debug!("Skipping {}, already has new favicons", path.display());
            }
            Err(reason) => {
                stats.skipped += 1;
                warn!("Skipping {}", reason);
            }
        }
    }

    stats
}

fn is_excluded(root: &Path, path: &Path, excludes: &[String]) -> bool {
    let rel = path.strip_prefix(root).unwrap_or(path).to_string_lossy();
    !rel.is_empty() && excludes.iter().any(|x| rel.contains(x.as_str()))
}

// ── Tests ──
