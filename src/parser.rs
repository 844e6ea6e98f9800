// File: src/parser.rs
//
// Token parser turning a template token stream into executable nodes.
//
// Text and variable tokens become leaf nodes directly; block tokens are
// dispatched to the tag parser registered under their name. Tag parsers
// call back into `parse_until` to collect nested bodies and consume the
// terminating token with `next_token`.

use crate::ast::{Expr, ExprParser, FilterExpression};
use crate::environment::Environment;
use crate::errors::{ErrorKind, Result, TemplateError};
use crate::lexer::{Token, TokenKind};
use crate::render::{Node, NodeList, TextNode, VariableNode};
use tracing::debug;

/// Signature of a block tag parser
pub type TagParser = for<'env> fn(&mut TokenParser<'env>, &Token) -> Result<Box<dyn Node>>;

/// Name of the tag a block token invokes, skipping the `label:` of a labeled `for`
pub fn tag_name(token: &Token) -> Option<String> {
    let mut components = token.components().into_iter();
    let first = components.next()?;
    if first.ends_with(':') {
        if let Some(second) = components.next().filter(|name| name == "for") {
            return Some(second);
        }
    }
    Some(first)
}

/// Parser maintains position in the token stream and the history of consumed tokens
pub struct TokenParser<'env> {
    tokens: Vec<Token>,
    pos: usize,
    parsed_tokens: Vec<Token>,
    environment: &'env Environment,
}

impl<'env> TokenParser<'env> {
    pub fn new(tokens: Vec<Token>, environment: &'env Environment) -> Self {
        TokenParser { tokens, pos: 0, parsed_tokens: Vec::new(), environment }
    }

    pub fn environment(&self) -> &'env Environment {
        self.environment
    }

    /// Parse the whole token stream
    pub fn parse(&mut self) -> Result<NodeList> {
        self.parse_until(&[])
    }

    /// Parse nodes until a block tag named in `terminators` is next.
    ///
    /// The terminator itself is left unconsumed. Reaching the end of the
    /// stream is not an error here; callers check `next_token`.
    pub fn parse_until(&mut self, terminators: &[&str]) -> Result<NodeList> {
        let mut nodes: NodeList = Vec::new();

        while let Some(token) = self.peek_token() {
            if token.is_block() {
                if let Some(name) = tag_name(token) {
                    if terminators.contains(&name.as_str()) {
                        return Ok(nodes);
                    }
                }
            }

            let Some(token) = self.next_token() else { break };
            match token.kind {
                TokenKind::Text => nodes.push(Box::new(TextNode::new(token.contents))),
                TokenKind::Variable => {
                    let variable = self.compile_filter(&token.contents).map_err(|e| {
                        e.at(token.location()).with_source(token.raw())
                    })?;
                    nodes.push(Box::new(VariableNode::new(variable)));
                }
                TokenKind::Comment => {}
                TokenKind::Block => nodes.push(self.parse_block(&token)?),
            }
        }

        Ok(nodes)
    }

    fn parse_block(&mut self, token: &Token) -> Result<Box<dyn Node>> {
        let name = tag_name(token).ok_or_else(|| token.error("Block tags must not be empty"))?;
        let environment = self.environment;
        match environment.tag(&name) {
            Some(parse_tag) => {
                debug!(tag = %name, line = token.line, "parsing block tag");
                parse_tag(self, token)
            }
            None => Err(TemplateError::new(ErrorKind::UnknownTag, format!("Unknown template tag '{}'", name))
                .at(token.location())
                .with_source(token.raw())
                .suggest_from(&name, &environment.tag_names())),
        }
    }

    fn peek_token(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    /// Consume the next token, recording it as parsed
    pub fn next_token(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned()?;
        self.pos += 1;
        self.parsed_tokens.push(token.clone());
        Some(token)
    }

    /// Compile `var|filter:arg` text into a resolvable
    pub fn compile_filter(&self, text: &str) -> Result<FilterExpression> {
        let environment = self.environment;
        FilterExpression::compile(text, |name| environment.filter(name), &environment.filter_names())
    }

    /// Compile predicate components such as `["item", ">", "1"]`
    pub fn compile_expression(&self, components: &[String]) -> Result<Expr> {
        ExprParser::new(components, |text: &str| self.compile_filter(text)).parse()
    }

    /// Whether a `for` block opened earlier is still waiting for its `endfor`
    pub fn has_open_for_tag(&self) -> bool {
        let mut open = 0i64;
        for token in self.parsed_tokens.iter().rev().filter(|token| token.is_block()) {
            match tag_name(token).as_deref() {
                Some("endfor") => open -= 1,
                Some("for") => open += 1,
                _ => {}
            }
        }
        open > 0
    }
}
