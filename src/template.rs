// File: src/template.rs
//
// A compiled template, ready to render against any number of binding sets.

use crate::environment::RenderOptions;
use crate::errors::{Result, TemplateError};
use crate::render::{render_nodes, Context, Flow, NodeList, Value};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug)]
pub struct Template {
    pub name: Option<String>,
    pub nodes: NodeList,
    pub options: RenderOptions,
}

impl Template {
    pub fn new(name: Option<String>, nodes: NodeList, options: RenderOptions) -> Self {
        Template { name, nodes, options }
    }

    /// Render with `bindings` as the root frame
    pub fn render(&self, bindings: HashMap<String, Value>) -> Result<String> {
        let mut ctx = Context::with_options(self.options.clone());
        for (name, value) in bindings {
            ctx.set(name, value);
        }
        self.render_context(&mut ctx)
    }

    /// Render against a caller-owned context.
    ///
    /// A `break` or `continue` that reaches the top level is an error; there
    /// is no loop left to receive it.
    pub fn render_context(&self, ctx: &mut Context) -> Result<String> {
        let mut out = String::new();
        let flow = render_nodes(&self.nodes, ctx, &mut out)?;
        let keyword = match flow {
            Flow::Normal => None,
            Flow::Break(_) => Some("break"),
            Flow::Continue(_) => Some("continue"),
        };
        if let Some(keyword) = keyword {
            return Err(TemplateError::resolution(format!("'{}': no loop is currently running", keyword)));
        }
        debug!(
            template = self.name.as_deref().unwrap_or("<string>"),
            bytes = out.len(),
            "rendered template"
        );
        Ok(out)
    }
}
