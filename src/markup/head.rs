use std::collections::HashSet;

use super::node::{Element, Node};

/// Head content rendered from a [`HeadAccumulator`] for one request.
///
/// `attributes` and `top` end up in the document `<head>`, `bottom` is appended
/// to the end of `<body>` (deferred scripts and the like).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadFragment {
    pub attributes: Vec<(String, String)>,
    pub top: Vec<Node>,
    pub bottom: Vec<Node>,
}

impl HeadFragment {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.top.is_empty() && self.bottom.is_empty()
    }
}

/// Per-request collector for `<head>` metadata and end-of-body scripts.
///
/// Owned by the renderer and handed to the presentation merger once the
/// handler has run. External stylesheets and scripts are emitted once per URL,
/// inline ones once per name.
#[derive(Debug, Clone, Default)]
pub struct HeadAccumulator {
    static_url: String,
    attributes: Vec<(String, String)>,
    top: Vec<Node>,
    bottom: Vec<Node>,
    seen: HashSet<String>,
}

impl HeadAccumulator {
    /// Create an accumulator resolving relative asset URLs under `static_url`
    pub fn new(static_url: impl Into<String>) -> Self {
        Self {
            static_url: static_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// Add a node to the head.
    ///
    /// A `head` element is not nested: its attributes are merged into the head
    /// attributes and its children appended to the head content.
    pub fn push(&mut self, node: impl Into<Node>) -> &mut Self {
        match node.into() {
            Node::Element(e) if e.tag == "head" => {
                for (k, v) in e.attributes {
                    match self.attributes.iter_mut().find(|(name, _)| *name == k) {
                        Some((_, value)) => *value = v,
                        None => self.attributes.push((k, v)),
                    }
                }
                self.top.extend(e.children);
            }
            other => self.top.push(other),
        }
        self
    }

    /// Add a node to the end of the document body
    pub fn push_bottom(&mut self, node: impl Into<Node>) -> &mut Self {
        self.bottom.push(node.into());
        self
    }

    pub fn title(&mut self, title: impl Into<String>) -> &mut Self {
        self.push(Element::new("title").child(title.into()))
    }

    pub fn meta(&mut self, name: impl Into<String>, content: impl Into<String>) -> &mut Self {
        self.push(
            Element::new("meta")
                .attr("name", name)
                .attr("content", content),
        )
    }

    pub fn link(&mut self, rel: impl Into<String>, href: impl Into<String>) -> &mut Self {
        self.push(Element::new("link").attr("rel", rel).attr("href", href))
    }

    /// Reference an external stylesheet, once per URL
    pub fn css_url(&mut self, url: &str) -> &mut Self {
        let url = self.absolute_url(url);
        if self.seen.insert(format!("css-url:{url}")) {
            self.push(
                Element::new("link")
                    .attr("rel", "stylesheet")
                    .attr("type", "text/css")
                    .attr("href", url),
            );
        }
        self
    }

    /// Reference an external script, once per URL
    pub fn javascript_url(&mut self, url: &str) -> &mut Self {
        let url = self.absolute_url(url);
        if self.seen.insert(format!("js-url:{url}")) {
            self.push(Element::new("script").attr("type", "text/javascript").attr("src", url));
        }
        self
    }

    /// Inline stylesheet registered under `name`, once per name
    pub fn css(&mut self, name: &str, style: impl Into<String>) -> &mut Self {
        if self.seen.insert(format!("css:{name}")) {
            self.push(
                Element::new("style")
                    .attr("type", "text/css")
                    .attr("data-name", name)
                    .child(style.into()),
            );
        }
        self
    }

    /// Inline script registered under `name`, once per name
    pub fn javascript(&mut self, name: &str, script: impl Into<String>) -> &mut Self {
        if self.seen.insert(format!("js:{name}")) {
            self.push(
                Element::new("script")
                    .attr("type", "text/javascript")
                    .attr("data-name", name)
                    .child(script.into()),
            );
        }
        self
    }

    fn absolute_url(&self, url: &str) -> String {
        if url.starts_with('/') || url.contains("://") || self.static_url.is_empty() {
            url.to_string()
        } else {
            format!("{}/{}", self.static_url, url)
        }
    }

    /// The `<head>` element built from the accumulated attributes and content
    #[must_use]
    pub fn render_top(&self) -> Element {
        Element {
            tag: "head".to_string(),
            attributes: self.attributes.clone(),
            children: self.top.clone(),
        }
    }

    /// The nodes destined for the end of `<body>`
    #[must_use]
    pub fn render_bottom(&self) -> Vec<Node> {
        self.bottom.clone()
    }

    /// Consume the accumulator into the fragment handed to the merger
    #[must_use]
    pub fn render(self) -> HeadFragment {
        HeadFragment {
            attributes: self.attributes,
            top: self.top,
            bottom: self.bottom,
        }
    }
}
