//! # Presentation Module
//!
//! Turns the output of a handler into response bytes.
//!
//! - [`merge`] folds the fragment a handler rendered and the head content it
//!   accumulated into a single `<html><head/><body/></html>` document.
//! - [`serialize`] writes trees, text and sequences of both in the requested
//!   charset, with an optional doctype and indentation.
//! - [`PresentationService`] wires both into the request path and sets the
//!   response headers that only apply to full pages.

pub mod merge;
pub mod serialize;
mod service;

pub use merge::{Merger, PathContext};
pub use serialize::{serialize, serialize_element, Output, SerializeMethod, SerializeOptions};
pub use service::PresentationService;
