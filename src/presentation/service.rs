use tracing::debug;

use crate::config::PresentationConfig;
use crate::error::Result;
use crate::markup::{Element, Fragment, HeadFragment};
use crate::renderer::Renderer;
use crate::server::{Request, Response};

use super::merge::{Merger, PathContext};
use super::serialize::{serialize, Output, SerializeMethod, SerializeOptions};

/// Turns what a handler rendered into the response body.
///
/// Full HTML pages are merged into a complete document first; XHR and
/// non-HTML responses are serialized as rendered.
#[derive(Debug, Clone)]
pub struct PresentationService {
    merger: Merger,
    frame_options: Option<String>,
    pretty_print: bool,
}

impl Default for PresentationService {
    fn default() -> Self {
        Self::new(&PresentationConfig::default())
    }
}

impl PresentationService {
    pub fn new(config: &PresentationConfig) -> Self {
        let frame_options = Some(config.frame_options.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        Self {
            merger: Merger::new(config.canonical_url),
            frame_options,
            pretty_print: config.pretty_print,
        }
    }

    #[must_use]
    pub fn merger(&self) -> &Merger {
        &self.merger
    }

    /// See [`Merger::merge`]
    #[must_use]
    pub fn merge(&self, ctx: &PathContext, fragment: Fragment, head: HeadFragment) -> Element {
        self.merger.merge(ctx, fragment, head)
    }

    /// See [`serialize`]
    #[must_use]
    pub fn serialize(
        &self,
        output: &Output,
        encoding: &str,
        doctype: Option<&str>,
        method: SerializeMethod,
    ) -> Vec<u8> {
        serialize(
            output,
            &SerializeOptions {
                encoding,
                doctype,
                pretty_print: self.pretty_print,
                method,
            },
        )
    }

    /// Run `chain` with the request renderer, then fill the response from it.
    ///
    /// Errors from the chain are returned untouched and leave the response body
    /// empty.
    pub fn handle_request<F>(
        &self,
        request: &Request,
        response: &mut Response,
        mut renderer: Renderer,
        chain: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut Renderer, &mut Response) -> Result<()>,
    {
        chain(&mut renderer, response)?;

        response.content_type = renderer.content_type().to_string();
        response.doctype = renderer.doctype().map(str::to_string);
        response.charset = renderer.charset().to_string();
        let method = renderer.method();
        let (root, head) = renderer.into_parts();

        let full_page = !request.is_xhr() && response.content_type.contains("html");
        let output = if full_page {
            let document = self.merge(&request.path_context(), root, head.render());
            if let Some(value) = &self.frame_options {
                response.set_default_header("X-Frame-Options", value.clone());
            }
            Output::from(document)
        } else {
            debug!(xhr = request.is_xhr(), content_type = %response.content_type, "Serializing partial response");
            Output::from(root)
        };

        let doctype = if request.is_xhr() {
            None
        } else {
            response.doctype.as_deref()
        };
        let body = self.serialize(&output, &response.charset, doctype, method);
        response.set_header("Content-Type", response.content_type_header());
        response.body = body;
        Ok(())
    }
}
