use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

static BODY_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<body[\s>/]").unwrap());

/// Attributes holding a whitespace-separated token list.
const TOKEN_ATTRS: &[&str] = &["rel", "class"];

pub struct Document {
    html: Html,
}

#[derive(Debug, Clone, Copy)]
pub enum DomNode<'a> {
    Element(ElementRef<'a>),
    Text(&'a str),
    Comment(&'a str),
    Other,
}

impl Document {
    pub fn parse(markup: &str) -> Self {
        Document {
            html: Html::parse_document(markup),
        }
    }

    /// html5ever always synthesises a `<body>`, so ask the source text instead.
    pub fn has_body_tag(markup: &str) -> bool {
        BODY_TAG_RE.is_match(markup)
    }

    pub fn elements(&self) -> impl Iterator<Item = ElementRef<'_>> {
        self.html.root_element().descendants().filter_map(ElementRef::wrap)
    }

    pub fn body(&self) -> Option<ElementRef<'_>> {
        self.find_by_tag("body")
    }

    pub fn find_by_tag(&self, tag: &str) -> Option<ElementRef<'_>> {
        self.elements().find(|el| el.value().name() == tag)
    }

    pub fn find_all_by_tag(&self, tag: &str) -> Vec<ElementRef<'_>> {
        self.elements().filter(|el| el.value().name() == tag).collect()
    }

    pub fn find_by_attr(&self, tag: &str, attr: &str, value: &str) -> Option<ElementRef<'_>> {
        self.elements()
            .find(|el| el.value().name() == tag && attr_matches(*el, attr, value))
    }

    pub fn has_element_id(&self, id: &str) -> bool {
        self.elements().any(|el| el.value().id() == Some(id))
    }

    pub fn select_first(&self, selector: &Selector) -> Option<ElementRef<'_>> {
        self.html.select(selector).next()
    }
}

pub fn attr_matches(el: ElementRef<'_>, attr: &str, value: &str) -> bool {
    let Some(actual) = el.value().attr(attr) else {
        return false;
    };
    if TOKEN_ATTRS.contains(&attr) {
        actual
            .split_ascii_whitespace()
            .any(|token| token.eq_ignore_ascii_case(value))
    } else {
        actual.trim().eq_ignore_ascii_case(value)
    }
}

pub fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect()
}

pub fn children<'a>(el: ElementRef<'a>) -> impl Iterator<Item = DomNode<'a>> {
    el.children().map(|node| match ElementRef::wrap(node) {
        Some(child) => DomNode::Element(child),
        None => match node.value() {
            Node::Text(text) => DomNode::Text(&text.text),
            Node::Comment(comment) => DomNode::Comment(&comment.comment),
            _ => DomNode::Other,
        },
    })
}

/// Serialise the children of `parent` whose position satisfies `keep`, with every element
/// named in `strip` removed at any depth.
///
/// Unwanted nodes are detached from a copy of the tree and html5ever serialises what is left.
pub fn render_children_where(
    parent: ElementRef<'_>,
    strip: &[&str],
    mut keep: impl FnMut(usize, DomNode<'_>) -> bool,
) -> String {
    let dropped: Vec<_> = parent
        .children()
        .zip(children(parent))
        .enumerate()
        .filter(|(i, (_, node))| !keep(*i, *node))
        .map(|(_, (child, _))| child.id())
        .chain(
            parent
                .descendants()
                .skip(1)
                .filter_map(ElementRef::wrap)
                .filter(|el| strip.contains(&el.value().name()))
                .map(|el| el.id()),
        )
        .collect();
    if dropped.is_empty() {
        return parent.inner_html();
    }

    let mut tree = parent.tree().clone();
    for id in dropped {
        if let Some(mut node) = tree.get_mut(id) {
            node.detach();
        }
    }
    tree.get(parent.id())
        .and_then(ElementRef::wrap)
        .map(|el| el.inner_html())
        .unwrap_or_default()
}

/// Serialise the children of `el`, dropping every element named in `strip`.
pub fn render_children(el: ElementRef<'_>, strip: &[&str]) -> String {
    render_children_where(el, strip, |_, _| true)
}

// ── Tests ──
