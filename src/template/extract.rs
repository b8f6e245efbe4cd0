use std::path::Path;

use anyhow::Result;
use scraper::Selector;
use serde::Serialize;

use super::content::{self, ContentStrategy};
use crate::config::Settings;
use crate::dom::{self, Document};
use crate::error::SkipReason;

/// Everything a migrated page keeps from its old markup. Built per file, used once.
#[derive(Debug, Clone, Serialize)]
pub struct PageRecord {
    pub title: String,
    pub canonical_url: String,
    pub description: String,
    pub keywords: String,
    pub structured_data: Vec<String>,
    pub styles: Vec<String>,
    pub content: String,
    pub content_strategy: ContentStrategy,
}

/// Per-batch inputs to extraction, compiled once.
pub struct ExtractContext<'a> {
    pub settings: &'a Settings,
    container: Selector,
}

impl<'a> ExtractContext<'a> {
    pub fn new(settings: &'a Settings) -> Result<Self> {
        Ok(ExtractContext {
            settings,
            container: settings.template.content_selector()?,
        })
    }
}

pub fn extract_page(
    markup: &str,
    filename: &str,
    path: &Path,
    ctx: &ExtractContext<'_>,
) -> Result<PageRecord, SkipReason> {
    if !Document::has_body_tag(markup) {
        return Err(SkipReason::MissingBody(path.to_path_buf()));
    }
    let doc = Document::parse(markup);
    let body = doc
        .body()
        .ok_or_else(|| SkipReason::MissingBody(path.to_path_buf()))?;

    let template = &ctx.settings.template;

    let title = doc
        .find_by_tag("title")
        .map(|el| dom::text_of(el).trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| template.default_title.clone());

    let canonical_url = doc
        .find_by_attr("link", "rel", "canonical")
        .and_then(|el| el.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| canonical_for(&ctx.settings.site_domain, filename));

    let structured_data = doc
        .find_all_by_tag("script")
        .into_iter()
        .filter(|el| dom::attr_matches(*el, "type", "application/ld+json"))
        .map(|el| el.html())
        .collect();

    let styles = doc
        .find_all_by_tag("style")
        .into_iter()
        .filter(|el| {
            let css = dom::text_of(*el);
            !template
                .boilerplate_signatures
                .iter()
                .any(|sig| css.contains(sig.as_str()))
        })
        .map(|el| el.html())
        .collect();

    let (content, content_strategy) = content::main_content(&doc, body, &ctx.container);

    Ok(PageRecord {
        title,
        canonical_url,
        description: meta_content(&doc, "description"),
        keywords: meta_content(&doc, "keywords"),
        structured_data,
        styles,
        content,
        content_strategy,
    })
}

/// `https://<domain>/<filename>`, filename taken exactly as given.
pub fn canonical_for(domain: &str, filename: &str) -> String {
    format!("https://{}/{}", domain, filename)
}

fn meta_content(doc: &Document, name: &str) -> String {
    doc.find_by_attr("meta", "name", name)
        .and_then(|el| el.value().attr("content"))
        .unwrap_or_default()
        .to_string()
}

// ── Tests ──
