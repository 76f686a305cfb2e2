//! Per-request renderer: the root fragment a handler builds plus its head accumulator.

use serde::{Deserialize, Serialize};

use crate::markup::{Fragment, HeadAccumulator, Node};
use crate::presentation::SerializeMethod;

/// Markup dialect produced by a renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flavour {
    #[default]
    Html5,
    Xml,
}

impl Flavour {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "xml" => Flavour::Xml,
            _ => Flavour::Html5,
        }
    }
}

/// Builder a handler writes its output into.
///
/// One renderer is created per request by the application and dropped once the
/// response body has been serialized.
#[derive(Debug, Clone)]
pub struct Renderer {
    flavour: Flavour,
    content_type: String,
    doctype: Option<String>,
    charset: String,
    static_url: String,
    head: HeadAccumulator,
    root: Fragment,
}

impl Renderer {
    /// HTML5 renderer: `text/html`, `<!DOCTYPE html>`, UTF-8
    pub fn html5() -> Self {
        Self::new(Flavour::Html5, "")
    }

    /// XML renderer: `text/xml`, no doctype
    pub fn xml() -> Self {
        Self::new(Flavour::Xml, "")
    }

    pub fn new(flavour: Flavour, static_url: &str) -> Self {
        let (content_type, doctype) = match flavour {
            Flavour::Html5 => ("text/html", Some("<!DOCTYPE html>".to_string())),
            Flavour::Xml => ("text/xml", None),
        };
        let static_url = static_url.trim_end_matches('/').to_string();
        Self {
            flavour,
            content_type: content_type.to_string(),
            doctype,
            charset: "utf-8".to_string(),
            head: HeadAccumulator::new(static_url.clone()),
            static_url,
            root: Fragment::new(),
        }
    }

    #[must_use]
    pub fn flavour(&self) -> Flavour {
        self.flavour
    }

    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) -> &mut Self {
        self.content_type = content_type.into();
        self
    }

    #[must_use]
    pub fn doctype(&self) -> Option<&str> {
        self.doctype.as_deref()
    }

    pub fn set_doctype(&mut self, doctype: Option<String>) -> &mut Self {
        self.doctype = doctype;
        self
    }

    #[must_use]
    pub fn charset(&self) -> &str {
        &self.charset
    }

    pub fn set_charset(&mut self, charset: impl Into<String>) -> &mut Self {
        self.charset = charset.into();
        self
    }

    #[must_use]
    pub fn static_url(&self) -> &str {
        &self.static_url
    }

    #[must_use]
    pub fn head(&self) -> &HeadAccumulator {
        &self.head
    }

    pub fn head_mut(&mut self) -> &mut HeadAccumulator {
        &mut self.head
    }

    /// Append a node to the root fragment
    pub fn push(&mut self, node: impl Into<Node>) -> &mut Self {
        self.root.push(node.into());
        self
    }

    #[must_use]
    pub fn root(&self) -> &Fragment {
        &self.root
    }

    /// Serialization method matching the renderer flavour
    #[must_use]
    pub fn method(&self) -> SerializeMethod {
        match self.flavour {
            Flavour::Html5 => SerializeMethod::Html,
            Flavour::Xml => SerializeMethod::Xml,
        }
    }

    /// Split the renderer into its root fragment and head accumulator
    #[must_use]
    pub fn into_parts(self) -> (Fragment, HeadAccumulator) {
        (self.root, self.head)
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::html5()
    }
}
