//! Folding handler fragments into a single `<html><head/><body/></html>` document.

use tracing::debug;

use crate::markup::{has_canonical_link, Element, Fragment, HeadFragment, Node};

/// Request location used to compute the canonical URL of a page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathContext {
    /// Mount point of the application, e.g. `/b`
    pub script_name: String,
    /// Path below the mount point, e.g. `/a`
    pub path_info: String,
}

impl PathContext {
    pub fn new(script_name: impl Into<String>, path_info: impl Into<String>) -> Self {
        Self {
            script_name: script_name.into(),
            path_info: path_info.into(),
        }
    }

    /// `script_name + '/' + path_info`, without doubled or trailing slashes.
    ///
    /// The separator is only added when `path_info` is not empty, so an
    /// application mounted at the root with an empty path yields `""`.
    #[must_use]
    pub fn canonical_url(&self) -> String {
        let script = self.script_name.trim_end_matches('/');
        let path = self.path_info.trim_matches('/');
        if path.is_empty() {
            script.to_string()
        } else {
            format!("{script}/{path}")
        }
    }
}

/// Document assembler.
///
/// Stateless apart from its configuration; one instance is shared by all requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct Merger {
    canonical_url: bool,
}

impl Merger {
    pub fn new(canonical_url: bool) -> Self {
        Self { canonical_url }
    }

    #[must_use]
    pub fn canonical_url_enabled(&self) -> bool {
        self.canonical_url
    }

    /// Merge a handler fragment and the request head content into one document.
    ///
    /// The result is an `html` element holding exactly one `head` and one `body`
    /// at top level. Nodes the handler placed around its own `head`/`body`
    /// keep their relative order.
    #[must_use]
    pub fn merge(&self, ctx: &PathContext, fragment: Fragment, mut head: HeadFragment) -> Element {
        let mut html = document_root(fragment);
        let head_index = ensure_head(&mut html);
        let (head_index, body_index) = ensure_body(&mut html, head_index);

        if self.canonical_url {
            let existing = html.children[head_index]
                .as_element()
                .is_some_and(|h| has_canonical_link(&h.children));
            if !existing && !has_canonical_link(&head.top) {
                let href = ctx.canonical_url();
                debug!(href = %href, "Injecting canonical link");
                head.top.push(
                    Element::new("link")
                        .attr("rel", "canonical")
                        .attr("href", href)
                        .into(),
                );
            }
        }

        let HeadFragment {
            attributes,
            top,
            bottom,
        } = head;

        if let Some(h) = html.children[head_index].as_element_mut() {
            h.merge_attributes(attributes);
            if !top.is_empty() {
                let own = std::mem::take(&mut h.children);
                h.children = top;
                h.children.extend(own);
            }
        }

        if let Some(body) = html.children[body_index].as_element_mut() {
            body.children.extend(bottom);
        }

        html
    }
}

/// Pick the first top-level `html` element, or wrap the whole fragment in one.
fn document_root(fragment: Fragment) -> Element {
    let total = fragment.len();
    let mut html = None;
    let mut others = Vec::new();
    for node in fragment {
        match node {
            Node::Element(e) if e.tag == "html" && html.is_none() => html = Some(e),
            other => others.push(other),
        }
    }

    match html {
        Some(root) => {
            if !others.is_empty() {
                debug!(
                    dropped = others.len(),
                    total = total,
                    "Top-level nodes outside <html> left out of the document"
                );
            }
            root
        }
        None => Element::new("html").children(others),
    }
}

/// Index of the document `head`, inserting an empty one first when missing
fn ensure_head(html: &mut Element) -> usize {
    match html.position_of("head") {
        Some(i) => i,
        None => {
            html.children.insert(0, Element::new("head").into());
            0
        }
    }
}

/// Indexes of the `head` and of the `body` following it.
///
/// A `body` placed before the head is kept and the head moves right in front
/// of it. Without any `body`, everything after the head is moved into a new one.
fn ensure_body(html: &mut Element, head_index: usize) -> (usize, usize) {
    let after_head = head_index + 1;
    if let Some(offset) = html.children[after_head..]
        .iter()
        .position(|n| n.is_element("body"))
    {
        return (head_index, after_head + offset);
    }

    if let Some(body_index) = html.children[..head_index]
        .iter()
        .position(|n| n.is_element("body"))
    {
        debug!("Moving <head> in front of the leading <body>");
        let head = html.children.remove(head_index);
        html.children.insert(body_index, head);
        return (body_index, body_index + 1);
    }

    let moved: Vec<Node> = html.children.drain(after_head..).collect();
    debug!(moved = moved.len(), "Wrapping trailing nodes in a new <body>");
    html.children.push(Element::new("body").children(moved).into());
    (head_index, after_head)
}
