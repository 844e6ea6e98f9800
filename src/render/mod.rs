// File: src/render/mod.rs
//
// Executable nodes and the machinery they render against.
//
// A compiled template is a forest of nodes. Rendering walks it depth-first,
// appending text to a shared buffer while threading a single `Context`
// through every node. Each node reports a `Flow` so that `break` and
// `continue` can cut the remaining siblings short.

mod context;
mod control_flow;
mod for_node;
mod loop_termination;
mod sequence;
mod value;

pub use context::{Context, Frame, BREAK_SIGNAL_KEY, CONTINUE_SIGNAL_KEY, FORLOOP_KEY};
pub use control_flow::Flow;
pub use for_node::ForNode;
pub use loop_termination::{LoopTerminationNode, TerminationKind};
pub use sequence::{normalize, Item};
pub use value::{Fields, Record, Value};

use crate::ast::{FilterExpression, Resolvable};
use crate::errors::Result;
use std::fmt;

/// Polymorphic contract implemented by every node kind
pub trait Node: fmt::Debug + Send + Sync {
    /// Append this node's output to `out` and report how rendering continues
    fn render_into(&self, ctx: &mut Context, out: &mut String) -> Result<Flow>;

    fn render(&self, ctx: &mut Context) -> Result<String> {
        let mut out = String::new();
        self.render_into(ctx, &mut out)?;
        Ok(out)
    }
}

/// Sequence of nodes owned by a template or tag body
pub type NodeList = Vec<Box<dyn Node>>;

/// Render `nodes` in order, stopping at the first break/continue signal
pub fn render_nodes(nodes: &[Box<dyn Node>], ctx: &mut Context, out: &mut String) -> Result<Flow> {
    for node in nodes {
        let flow = node.render_into(ctx, out)?;
        if !flow.is_normal() {
            return Ok(flow);
        }
    }
    Ok(Flow::Normal)
}

/// Literal template text
#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    pub text: String,
}

impl TextNode {
    pub fn new(text: impl Into<String>) -> Self {
        TextNode { text: text.into() }
    }
}

impl Node for TextNode {
    fn render_into(&self, _ctx: &mut Context, out: &mut String) -> Result<Flow> {
        out.push_str(&self.text);
        Ok(Flow::Normal)
    }
}

/// `{{ variable }}` substitution
#[derive(Debug, Clone)]
pub struct VariableNode {
    pub variable: FilterExpression,
}

impl VariableNode {
    pub fn new(variable: FilterExpression) -> Self {
        VariableNode { variable }
    }

    /// Substitution of a plain variable path, without filters
    pub fn named(path: &str) -> Self {
        VariableNode { variable: FilterExpression::plain(crate::ast::Variable::new(path)) }
    }
}

impl Node for VariableNode {
    fn render_into(&self, ctx: &mut Context, out: &mut String) -> Result<Flow> {
        let value = self.variable.resolve(ctx)?;
        out.push_str(&value.to_string());
        Ok(Flow::Normal)
    }
}
