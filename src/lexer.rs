// File: src/lexer.rs
//
// Lexical analyzer for template source text.
// Splits raw text into tokens for the parser.
//
// Supports:
// - Variable tags: {{ name|filter:arg }}
// - Block tags:    {% for x in y %}
// - Comments:      {# ignored #}
// - Everything else is literal text

use crate::errors::{Result, SourceLocation, TemplateError};
use once_cell::sync::Lazy;
use regex::Regex;

/// Quoted strings stay whole, everything else splits on whitespace
static COMPONENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?:"[^"]*"|'[^']*'|[^\s"'])+"#).expect("component regex is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Text,
    Variable,
    Block,
    Comment,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Tag contents with delimiters and surrounding whitespace removed
    pub contents: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn text(contents: impl Into<String>) -> Self {
        Token { kind: TokenKind::Text, contents: contents.into(), line: 0, column: 0 }
    }

    pub fn variable(contents: impl Into<String>) -> Self {
        Token { kind: TokenKind::Variable, contents: contents.into(), line: 0, column: 0 }
    }

    pub fn block(contents: impl Into<String>) -> Self {
        Token { kind: TokenKind::Block, contents: contents.into(), line: 0, column: 0 }
    }

    /// Whitespace separated components, keeping quoted strings intact
    pub fn components(&self) -> Vec<String> {
        split_components(&self.contents)
    }

    pub fn is_block(&self) -> bool {
        self.kind == TokenKind::Block
    }

    pub fn location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column)
    }

    /// The token as it appeared in the template
    pub fn raw(&self) -> String {
        match self.kind {
            TokenKind::Text => self.contents.clone(),
            TokenKind::Variable => format!("{{{{ {} }}}}", self.contents),
            TokenKind::Block => format!("{{% {} %}}", self.contents),
            TokenKind::Comment => format!("{{# {} #}}", self.contents),
        }
    }

    /// Syntax error pointing at this token
    pub fn error(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::syntax(message).at(self.location()).with_source(self.raw())
    }
}

pub fn split_components(contents: &str) -> Vec<String> {
    COMPONENT_RE.find_iter(contents).map(|m| m.as_str().to_string()).collect()
}

fn closing_delimiter(opener: char) -> Option<(char, TokenKind)> {
    match opener {
        '{' => Some(('}', TokenKind::Variable)),
        '%' => Some(('%', TokenKind::Block)),
        '#' => Some(('#', TokenKind::Comment)),
        _ => None,
    }
}

/// Tokenizes template source into a vector of tokens.
///
/// With `trim_blocks`, a single newline directly following a block tag is
/// dropped from the next text token.
pub fn tokenize(source: &str, trim_blocks: bool) -> Result<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut text = String::new();
    let (mut text_line, mut text_col) = (1, 1);
    let (mut line, mut col) = (1, 1);
    let mut pos = 0;
    let mut after_block = false;

    while pos < chars.len() {
        let c = chars[pos];
        let tag = if c == '{' { chars.get(pos + 1).and_then(|&o| closing_delimiter(o)) } else { None };

        let Some((closer, kind)) = tag else {
            if after_block && trim_blocks && c == '\n' && text.is_empty() {
                after_block = false;
                pos += 1;
                line += 1;
                col = 1;
                text_line = line;
                text_col = col;
                continue;
            }
            after_block = false;
            if text.is_empty() {
                text_line = line;
                text_col = col;
            }
            text.push(c);
            pos += 1;
            if c == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
            continue;
        };

        if !text.is_empty() {
            tokens.push(Token {
                kind: TokenKind::Text,
                contents: std::mem::take(&mut text),
                line: text_line,
                column: text_col,
            });
        }

        let (tag_line, tag_col) = (line, col);
        let body_start = pos + 2;
        let end = (body_start..chars.len().saturating_sub(1))
            .find(|&i| chars[i] == closer && chars[i + 1] == '}')
            .ok_or_else(|| {
                let opener: String = chars[pos..pos + 2].iter().collect();
                TemplateError::syntax(format!("Unterminated tag `{}`", opener))
                    .at(SourceLocation::new(tag_line, tag_col))
                    .with_source(chars[pos..].iter().take(40).collect::<String>())
            })?;

        let body: String = chars[body_start..end].iter().collect();
        for &ch in &chars[pos..end + 2] {
            if ch == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }
        pos = end + 2;

        tokens.push(Token { kind, contents: body.trim().to_string(), line: tag_line, column: tag_col });
        after_block = kind == TokenKind::Block;
    }

    if !text.is_empty() {
        tokens.push(Token { kind: TokenKind::Text, contents: text, line: text_line, column: text_col });
    }

    Ok(tokens)
}
