//! # Markup Module
//!
//! In-memory markup trees built with an explicit builder API, plus the per-request
//! head accumulator that collects `<head>` metadata while a handler renders.
//!
//! ```rust
//! use brrtweb::markup::{Element, Node};
//!
//! let page = Element::new("div")
//!     .attr("class", "greeting")
//!     .child(Element::new("p").child("hello"))
//!     .child(Node::comment("footer"));
//! assert_eq!(page.children.len(), 2);
//! ```

mod head;
mod node;

pub use head::{HeadAccumulator, HeadFragment};
pub use node::{has_canonical_link, Element, Fragment, Node};
