// File: src/render/loop_termination.rs
//
// The `break` and `continue` tags, optionally naming a loop label:
//
//   {% break %}  {% continue %}  {% break outer %}  {% continue outer %}

use super::context::{Context, BREAK_SIGNAL_KEY, CONTINUE_SIGNAL_KEY};
use super::control_flow::Flow;
use super::value::Value;
use super::Node;
use crate::errors::{Result, SourceLocation, TemplateError};
use crate::lexer::Token;
use crate::parser::TokenParser;
use std::fmt;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationKind {
    Break,
    Continue,
}

impl TerminationKind {
    pub fn keyword(self) -> &'static str {
        match self {
            TerminationKind::Break => "break",
            TerminationKind::Continue => "continue",
        }
    }

    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "break" => Some(TerminationKind::Break),
            "continue" => Some(TerminationKind::Continue),
            _ => None,
        }
    }
}

impl fmt::Display for TerminationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopTerminationNode {
    pub kind: TerminationKind,
    pub label: Option<String>,
    pub location: SourceLocation,
}

impl LoopTerminationNode {
    pub fn new(kind: TerminationKind, label: Option<String>) -> Self {
        LoopTerminationNode { kind, label, location: SourceLocation::unknown() }
    }

    /// Parse a `break` / `continue` tag; only legal inside an open `for` body
    pub fn parse(parser: &mut TokenParser<'_>, token: &Token) -> Result<Box<dyn Node>> {
        let components = token.components();
        let kind = components
            .first()
            .and_then(|keyword| TerminationKind::from_keyword(keyword))
            .ok_or_else(|| token.error(format!("'{}' is not a loop termination tag", token.contents)))?;

        if components.len() > 2 {
            return Err(token.error(format!(
                "'{}' does not accept more than one parameter `{}`.",
                kind, token.contents
            )));
        }
        if !parser.has_open_for_tag() {
            return Err(token.error(format!("'{}' can be used only inside loop body", kind)));
        }

        Ok(Box::new(LoopTerminationNode {
            kind,
            label: components.get(1).cloned(),
            location: token.location(),
        }))
    }

    fn unmatched(&self, ctx: &Context) -> TemplateError {
        let err = match &self.label {
            Some(label) => TemplateError::unknown_label(self.kind.keyword(), label)
                .suggest_from(label, &ctx.running_labels()),
            None => TemplateError::resolution(format!("'{}': no loop is currently running", self.kind)),
        };
        err.at(self.location.clone())
    }
}

impl Node for LoopTerminationNode {
    fn render_into(&self, ctx: &mut Context, _out: &mut String) -> Result<Flow> {
        let depth = ctx
            .find_loop_frame(self.label.as_deref())
            .ok_or_else(|| self.unmatched(ctx))?;
        trace!(kind = %self.kind, label = ?self.label, depth, "loop termination signal");

        match self.kind {
            TerminationKind::Break => {
                ctx.set_in_frame(depth, BREAK_SIGNAL_KEY, Value::Bool(true))?;
                Ok(Flow::Break(self.label.clone()))
            }
            TerminationKind::Continue => {
                let target = self.label.as_deref().map(Value::str).unwrap_or(Value::Bool(true));
                ctx.set_in_frame(depth, CONTINUE_SIGNAL_KEY, target)?;
                Ok(Flow::Continue(self.label.clone()))
            }
        }
    }
}
