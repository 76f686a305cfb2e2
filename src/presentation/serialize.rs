//! Turning markup trees, text and sequences of both into response bytes.

use encoding_rs::{Encoding, UTF_8};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::markup::{Element, Fragment, Node};

/// Reserved attribute removed from the top element before it is written
const RESERVED_XMLNS: &str = "xmlns";

/// HTML elements that never have a closing tag
const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Markup dialect used to write elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializeMethod {
    #[default]
    Html,
    Xml,
}

/// Anything the presentation layer may be asked to turn into a response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// A markup node. Bare text nodes are handled like [`Output::Text`].
    Node(Node),
    /// Decoded text, encoded on the way out
    Text(String),
    /// Already encoded bytes, passed through untouched
    Bytes(Vec<u8>),
    /// Values serialized one after the other
    Sequence(Vec<Output>),
}

impl Output {
    /// True when the value holds at least one non-text markup node
    #[must_use]
    pub fn has_tree(&self) -> bool {
        match self {
            Output::Node(n) => n.is_tree(),
            Output::Text(_) | Output::Bytes(_) => false,
            Output::Sequence(items) => items.iter().any(Output::has_tree),
        }
    }
}

impl From<Element> for Output {
    fn from(e: Element) -> Self {
        Output::Node(Node::Element(e))
    }
}

impl From<Node> for Output {
    fn from(n: Node) -> Self {
        Output::Node(n)
    }
}

impl From<&str> for Output {
    fn from(s: &str) -> Self {
        Output::Text(s.to_string())
    }
}

impl From<String> for Output {
    fn from(s: String) -> Self {
        Output::Text(s)
    }
}

impl From<Vec<u8>> for Output {
    fn from(b: Vec<u8>) -> Self {
        Output::Bytes(b)
    }
}

impl From<Fragment> for Output {
    fn from(nodes: Fragment) -> Self {
        Output::Sequence(nodes.into_iter().map(Output::Node).collect())
    }
}

impl From<Vec<Output>> for Output {
    fn from(items: Vec<Output>) -> Self {
        Output::Sequence(items)
    }
}

/// Serialization settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializeOptions<'a> {
    /// Output charset label (`utf-8`, `iso-8859-1`, ...)
    pub encoding: &'a str,
    /// Written once, followed by a newline, in front of documents
    pub doctype: Option<&'a str>,
    pub pretty_print: bool,
    pub method: SerializeMethod,
}

impl Default for SerializeOptions<'_> {
    fn default() -> Self {
        Self {
            encoding: "utf-8",
            doctype: None,
            pretty_print: false,
            method: SerializeMethod::Html,
        }
    }
}

/// Serialize `output` to bytes.
///
/// The doctype is only written when the value contains markup; text alone is
/// not a document. Unknown charsets fall back to UTF-8, and characters the
/// target charset cannot represent become numeric character references, so
/// this never fails.
#[must_use]
pub fn serialize(output: &Output, options: &SerializeOptions<'_>) -> Vec<u8> {
    let encoding = resolve_encoding(options.encoding);
    let body = write_output(output, options, encoding);

    match options.doctype {
        Some(doctype) if output.has_tree() => {
            let mut bytes = encode(&format!("{doctype}\n"), encoding);
            bytes.extend(body);
            bytes
        }
        _ => body,
    }
}

/// Serialize a single element with the given options
#[must_use]
pub fn serialize_element(element: &Element, options: &SerializeOptions<'_>) -> Vec<u8> {
    serialize(&Output::Node(Node::Element(element.clone())), options)
}

fn resolve_encoding(label: &str) -> &'static Encoding {
    match Encoding::for_label(label.trim().as_bytes()) {
        Some(encoding) => encoding.output_encoding(),
        None => {
            warn!(encoding = %label, "Unknown output encoding, falling back to utf-8");
            UTF_8
        }
    }
}

fn encode(text: &str, encoding: &'static Encoding) -> Vec<u8> {
    if encoding == UTF_8 {
        return text.as_bytes().to_vec();
    }
    let (bytes, _, _) = encoding.encode(text);
    bytes.into_owned()
}

fn write_output(output: &Output, options: &SerializeOptions<'_>, encoding: &'static Encoding) -> Vec<u8> {
    match output {
        Output::Node(node) => {
            let mut markup = String::new();
            write_node(&mut markup, node, options, 0, true);
            encode(&markup, encoding)
        }
        Output::Text(text) => encode(text, encoding),
        Output::Bytes(bytes) => bytes.clone(),
        Output::Sequence(items) => items
            .iter()
            .flat_map(|item| write_output(item, options, encoding))
            .collect(),
    }
}

fn write_node(out: &mut String, node: &Node, options: &SerializeOptions<'_>, depth: usize, top: bool) {
    match node {
        Node::Element(e) => write_element(out, e, options, depth, top),
        Node::Text(t) => escape_text(out, t),
        Node::Comment(c) => {
            out.push_str("<!--");
            write_comment_text(out, c);
            out.push_str("-->");
        }
        Node::ProcessingInstruction { target, data } => {
            out.push_str("<?");
            out.push_str(target);
            out.push(' ');
            if let Some(data) = data {
                write_pi_data(out, data, options.method);
            }
            match options.method {
                SerializeMethod::Html => out.push('>'),
                SerializeMethod::Xml => out.push_str("?>"),
            }
        }
    }
}

fn write_element(out: &mut String, e: &Element, options: &SerializeOptions<'_>, depth: usize, top: bool) {
    out.push('<');
    out.push_str(&e.tag);
    for (name, value) in &e.attributes {
        if top && name == RESERVED_XMLNS {
            continue;
        }
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        escape_attr(out, value);
        out.push('"');
    }

    if e.children.is_empty() {
        match options.method {
            SerializeMethod::Html if VOID_ELEMENTS.contains(&e.tag.as_str()) => out.push('>'),
            SerializeMethod::Html => {
                out.push_str("></");
                out.push_str(&e.tag);
                out.push('>');
            }
            SerializeMethod::Xml => out.push_str("/>"),
        }
        return;
    }

    out.push('>');
    let raw_text = options.method == SerializeMethod::Html && matches!(e.tag.as_str(), "script" | "style");
    let indent = options.pretty_print && e.children.iter().all(|c| !matches!(c, Node::Text(_)));

    for child in &e.children {
        if indent {
            out.push('\n');
            push_indent(out, depth + 1);
        }
        match child {
            Node::Text(t) if raw_text => out.push_str(t),
            other => write_node(out, other, options, depth + 1, false),
        }
    }
    if indent {
        out.push('\n');
        push_indent(out, depth);
    }

    out.push_str("</");
    out.push_str(&e.tag);
    out.push('>');
}

fn push_indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

/// Comment text with a space between consecutive dashes and after a trailing
/// one, so it can never close the comment early
fn write_comment_text(out: &mut String, text: &str) {
    let mut dash = false;
    for c in text.chars() {
        if c == '-' && dash {
            out.push(' ');
        }
        out.push(c);
        dash = c == '-';
    }
    if dash {
        out.push(' ');
    }
}

/// PI data stripped of whatever would end the instruction for `method`
fn write_pi_data(out: &mut String, data: &str, method: SerializeMethod) {
    match method {
        SerializeMethod::Html => {
            for c in data.chars() {
                match c {
                    '>' => out.push_str("&gt;"),
                    _ => out.push(c),
                }
            }
        }
        SerializeMethod::Xml => out.push_str(&data.replace("?>", "? >")),
    }
}

fn escape_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}
