use serde::{Deserialize, Serialize};

/// A sequence of top-level nodes with no enclosing element.
///
/// Handlers produce fragments; the presentation merger turns them into documents.
pub type Fragment = Vec<Node>;

/// One node of a markup tree.
///
/// Text that other tree models keep as `text`/`tail` properties of an element is
/// represented here as a [`Node::Text`] sibling at the same position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
    ProcessingInstruction {
        target: String,
        data: Option<String>,
    },
}

impl Node {
    /// Build a text node
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(text.into())
    }

    /// Build a comment node
    pub fn comment(text: impl Into<String>) -> Self {
        Node::Comment(text.into())
    }

    /// Build a processing instruction with no data, e.g. `<?hello ?>`
    pub fn processing_instruction(target: impl Into<String>) -> Self {
        Node::ProcessingInstruction {
            target: target.into(),
            data: None,
        }
    }

    /// Build a processing instruction carrying data, e.g. `<?xml-stylesheet href="a.xsl"?>`
    pub fn processing_instruction_with(target: impl Into<String>, data: impl Into<String>) -> Self {
        Node::ProcessingInstruction {
            target: target.into(),
            data: Some(data.into()),
        }
    }

    /// The element behind this node, if it is one
    #[inline]
    #[must_use]
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }

    #[inline]
    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }

    /// True when this node is an element with the given tag
    #[inline]
    #[must_use]
    pub fn is_element(&self, tag: &str) -> bool {
        matches!(self, Node::Element(e) if e.tag == tag)
    }

    /// True for every node except plain text.
    ///
    /// Used by the serializer to decide whether a sequence is a document
    /// (and therefore deserves a doctype) or just text.
    #[inline]
    #[must_use]
    pub fn is_tree(&self) -> bool {
        !matches!(self, Node::Text(_))
    }
}

impl From<Element> for Node {
    fn from(e: Element) -> Self {
        Node::Element(e)
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::Text(s.to_string())
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::Text(s)
    }
}

/// A tagged element with ordered attributes and children.
///
/// Attributes keep the order in which they were first set; setting an existing
/// name again replaces the value in place.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder form of [`Element::set_attr`]
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Builder form of [`Element::push`]
    #[must_use]
    pub fn child(mut self, node: impl Into<Node>) -> Self {
        self.children.push(node.into());
        self
    }

    /// Append every node of `nodes` as children
    #[must_use]
    pub fn children<I, N>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<Node>,
    {
        self.children.extend(nodes.into_iter().map(Into::into));
        self
    }

    pub fn push(&mut self, node: impl Into<Node>) {
        self.children.push(node.into());
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some((_, v)) => *v = value,
            None => self.attributes.push((name, value)),
        }
    }

    #[must_use]
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let pos = self.attributes.iter().position(|(k, _)| k == name)?;
        Some(self.attributes.remove(pos).1)
    }

    /// Set every attribute of `other` on this element, overriding duplicates
    pub fn merge_attributes<I>(&mut self, other: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (k, v) in other {
            self.set_attr(k, v);
        }
    }

    /// Position of the first direct child element with the given tag
    #[must_use]
    pub fn position_of(&self, tag: &str) -> Option<usize> {
        self.children.iter().position(|n| n.is_element(tag))
    }

    /// First direct child element with the given tag
    #[must_use]
    pub fn find(&self, tag: &str) -> Option<&Element> {
        self.children
            .iter()
            .filter_map(Node::as_element)
            .find(|e| e.tag == tag)
    }

    /// Direct child elements matching `tag` whose `attr` equals `value`
    pub fn find_with_attr<'a>(
        &'a self,
        tag: &'a str,
        attr: &'a str,
        value: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.children
            .iter()
            .filter_map(Node::as_element)
            .filter(move |e| e.tag == tag && e.get_attr(attr) == Some(value))
    }

    /// Concatenated text of the direct text children
    #[must_use]
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// True when `nodes` holds a `link` element with `rel="canonical"`
#[must_use]
pub fn has_canonical_link(nodes: &[Node]) -> bool {
    nodes
        .iter()
        .filter_map(Node::as_element)
        .any(|e| e.tag == "link" && e.get_attr("rel") == Some("canonical"))
}
