// File: src/render/for_node.rs
//
// The `for` tag.
//
//   {% [label:] for x[,y] in source [where predicate] %} ... [{% empty %} ...] {% endfor %}
//
// Each iteration pushes one frame binding the loop variables and, written
// last so it shadows a loop variable of the same name, the `forloop` metadata
// record. `break` / `continue` tags mark the iteration frame of the loop they
// target; a loop that finds no mark in its own frame after a signal lets the
// signal travel further out.

use super::context::{Context, Frame, BREAK_SIGNAL_KEY, CONTINUE_SIGNAL_KEY, FORLOOP_KEY};
use super::control_flow::Flow;
use super::sequence::{normalize, Item};
use super::value::Value;
use super::{render_nodes, Node, NodeList};
use crate::ast::{Expression, Resolvable};
use crate::errors::Result;
use crate::lexer::Token;
use crate::parser::{tag_name, TokenParser};
use std::collections::HashMap;
use tracing::trace;

/// What an iteration asks of the loop driving it
enum Step {
    Next,
    Stop,
    Propagate(Flow),
}

#[derive(Debug)]
pub struct ForNode {
    pub resolvable: Box<dyn Resolvable>,
    pub loop_variables: Vec<String>,
    pub nodes: NodeList,
    pub empty_nodes: NodeList,
    pub where_clause: Option<Box<dyn Expression>>,
    pub label: Option<String>,
}

impl ForNode {
    pub fn new(
        resolvable: Box<dyn Resolvable>,
        loop_variables: Vec<String>,
        nodes: NodeList,
        empty_nodes: NodeList,
    ) -> Self {
        ForNode { resolvable, loop_variables, nodes, empty_nodes, where_clause: None, label: None }
    }

    pub fn with_where(mut self, where_clause: Box<dyn Expression>) -> Self {
        self.where_clause = Some(where_clause);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Parse a `for` block tag; the opening token has already been consumed
    pub fn parse(parser: &mut TokenParser<'_>, token: &Token) -> Result<Box<dyn Node>> {
        let mut components = token.components();

        let label = match components.first() {
            Some(first) if first.ends_with(':') => {
                let label = first.trim_end_matches(':').to_string();
                if label.is_empty() {
                    return Err(token.error(format!("Loop labels must not be empty `{}`.", token.contents)));
                }
                components.remove(0);
                Some(label)
            }
            _ => None,
        };

        let well_formed = components.len() >= 3
            && components[0] == "for"
            && components[2] == "in"
            && (components.len() == 4 || (components.len() >= 6 && components[4] == "where"));
        if !well_formed {
            return Err(token.error(format!(
                "'for' statements should use the following 'for x in y where condition' `{}`.",
                token.contents
            )));
        }

        let loop_variables: Vec<String> = components[1]
            .split(',')
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();

        let resolvable = parser.compile_filter(&components[3]).map_err(|e| e.at(token.location()))?;
        let where_clause = if components.len() >= 6 {
            Some(parser.compile_expression(&components[5..]).map_err(|e| e.at(token.location()))?)
        } else {
            None
        };

        let nodes = parser.parse_until(&["endfor", "empty"])?;
        let terminator = parser
            .next_token()
            .ok_or_else(|| token.error("`endfor` was not found."))?;

        let empty_nodes = if tag_name(&terminator).as_deref() == Some("empty") {
            let empty_nodes = parser.parse_until(&["endfor"])?;
            parser.next_token().ok_or_else(|| token.error("`endfor` was not found."))?;
            empty_nodes
        } else {
            Vec::new()
        };

        let mut node = ForNode::new(Box::new(resolvable), loop_variables, nodes, empty_nodes);
        if let Some(where_clause) = where_clause {
            node = node.with_where(Box::new(where_clause));
        }
        if let Some(label) = label {
            node = node.with_label(label);
        }
        Ok(Box::new(node))
    }

    /// Frame binding the loop variables to `item`
    fn bindings(&self, item: &Item) -> Frame {
        let mut frame = Frame::default();
        let mut names = self.loop_variables.iter();
        if let Some(first) = names.next() {
            frame.insert(first.clone(), item.first().clone());
            if let (Some(second), Some(value)) = (names.next(), item.second()) {
                frame.insert(second.clone(), value.clone());
            }
        }
        frame
    }

    /// Metadata record for iteration `index` of `count`.
    ///
    /// `ambient` is the enclosing loop's record as it was when this loop started.
    fn metadata(&self, index: usize, count: usize, ambient: Option<&Value>) -> Value {
        let mut record: HashMap<String, Value> = HashMap::new();
        record.insert("first".to_string(), Value::Bool(index == 0));
        record.insert("last".to_string(), Value::Bool(index + 1 == count));
        record.insert("counter".to_string(), Value::from(index + 1));
        record.insert("counter0".to_string(), Value::from(index));
        record.insert("length".to_string(), Value::from(count));

        if let Some(Value::Dict(outer)) = ambient {
            if let Some(outer_label) = outer.get("label").and_then(Value::as_str) {
                if let Some(outer_record) = outer.get(outer_label) {
                    record.insert(outer_label.to_string(), outer_record.clone());
                }
            }
        }

        if let Some(label) = &self.label {
            record.insert("label".to_string(), Value::str(label.as_str()));
            let snapshot = Value::dict(record.clone());
            record.insert(label.clone(), snapshot);
        }

        Value::dict(record)
    }

    fn filtered_items(&self, ctx: &mut Context, items: Vec<Item>) -> Result<Vec<Item>> {
        let Some(predicate) = &self.where_clause else {
            return Ok(items);
        };
        let mut kept = Vec::with_capacity(items.len());
        for item in items {
            if ctx.push_with(self.bindings(&item), |ctx| predicate.evaluate(ctx))? {
                kept.push(item);
            }
        }
        Ok(kept)
    }

    /// Render one iteration inside the frame that carries its bindings and metadata
    fn render_iteration(&self, ctx: &mut Context, out: &mut String) -> Result<Step> {
        let flow = render_nodes(&self.nodes, ctx, out)?;

        let frame = ctx.innermost();
        if frame.contains_key(BREAK_SIGNAL_KEY) {
            trace!(label = ?self.label, "loop absorbed break");
            return Ok(Step::Stop);
        }
        if frame.contains_key(CONTINUE_SIGNAL_KEY) {
            trace!(label = ?self.label, "loop absorbed continue");
            return Ok(Step::Next);
        }
        if flow.is_normal() {
            Ok(Step::Next)
        } else {
            trace!(label = ?self.label, target = ?flow.label(), "signal targets an enclosing loop");
            Ok(Step::Propagate(flow))
        }
    }
}

impl Node for ForNode {
    fn render_into(&self, ctx: &mut Context, out: &mut String) -> Result<Flow> {
        let resolved = self.resolvable.resolve(ctx)?;
        let items = self.filtered_items(ctx, normalize(&resolved))?;
        trace!(label = ?self.label, items = items.len(), "rendering for loop");

        if items.is_empty() {
            return ctx.push(|ctx| render_nodes(&self.empty_nodes, ctx, out));
        }

        let ambient = ctx.get(FORLOOP_KEY).cloned();
        let count = items.len();
        for (index, item) in items.iter().enumerate() {
            let mut frame = self.bindings(item);
            frame.insert(FORLOOP_KEY.to_string(), self.metadata(index, count, ambient.as_ref()));

            match ctx.push_with(frame, |ctx| self.render_iteration(ctx, out))? {
                Step::Next => continue,
                Step::Stop => break,
                Step::Propagate(flow) => return Ok(flow),
            }
        }

        Ok(Flow::Normal)
    }
}
