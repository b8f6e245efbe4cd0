use scraper::{ElementRef, Selector};
use serde::Serialize;

use crate::dom::{self, Document, DomNode};

/// Layout chrome removed from extracted content at any depth.
const CHROME: &[&str] = &["header", "footer"];
/// Direct body children never treated as content.
const NON_CONTENT: &[&str] = &["header", "nav", "footer", "script", "style"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStrategy {
    /// Inner markup of the configured content container.
    Container,
    /// Siblings strictly between the page header (or nav) and its footer.
    BetweenChrome,
    /// Every body child that is not chrome, script or style.
    BodyChildren,
}

pub fn main_content(
    doc: &Document,
    body: ElementRef<'_>,
    container: &Selector,
) -> (String, ContentStrategy) {
    if let Some(el) = doc.select_first(container) {
        return (
            dom::render_children(el, CHROME).trim().to_string(),
            ContentStrategy::Container,
        );
    }
    if let Some(html) = between_chrome(body) {
        return (html.trim().to_string(), ContentStrategy::BetweenChrome);
    }
    (
        body_children(body).trim().to_string(),
        ContentStrategy::BodyChildren,
    )
}

fn between_chrome(body: ElementRef<'_>) -> Option<String> {
    ["header", "nav"].iter().find_map(|tag| {
        let start = first_descendant(body, tag)?;
        let parent = start.parent().and_then(ElementRef::wrap)?;
        let siblings: Vec<DomNode> = dom::children(parent).collect();
        let from = siblings
            .iter()
            .position(|n| matches!(n, DomNode::Element(el) if *el == start))?
            + 1;
        let to = from
            + siblings[from..]
                .iter()
                .position(|n| matches!(n, DomNode::Element(el) if el.value().name() == "footer"))?;
        Some(dom::render_children_where(parent, CHROME, |i, _| (from..to).contains(&i)))
    })
}

fn body_children(body: ElementRef<'_>) -> String {
    dom::render_children_where(body, CHROME, |_, node| {
        !matches!(node, DomNode::Element(el) if NON_CONTENT.contains(&el.value().name()))
    })
}

fn first_descendant<'a>(root: ElementRef<'a>, tag: &str) -> Option<ElementRef<'a>> {
    root.descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == tag)
}

// ── Tests ──
