// File: src/ast.rs
//
// Compiled expressions used inside template tags.
//
// A `Variable` is a dotted lookup path or a literal, a `FilterExpression`
// pipes a variable through named filters, and `Expr` is the boolean
// predicate tree used by `where` clauses.

use crate::builtins::FilterFn;
use crate::errors::{ErrorKind, Result, TemplateError};
use crate::lexer::split_components;
use crate::render::{Context, Value};
use std::cmp::Ordering;
use std::fmt;

/// Anything that produces a value from the current scope
pub trait Resolvable: fmt::Debug + Send + Sync {
    fn resolve(&self, ctx: &Context) -> Result<Value>;
}

/// A boolean predicate evaluated against the current scope
pub trait Expression: fmt::Debug + Send + Sync {
    fn evaluate(&self, ctx: &Context) -> Result<bool>;
}

/// A literal or a dotted lookup path such as `forloop.outer.counter`
#[derive(Debug, Clone, PartialEq)]
pub enum Variable {
    Literal(Value),
    Path(Vec<String>),
}

impl Variable {
    pub fn new(text: &str) -> Self {
        let text = text.trim();
        let quoted = text.len() >= 2
            && ((text.starts_with('"') && text.ends_with('"'))
                || (text.starts_with('\'') && text.ends_with('\'')));
        if quoted {
            return Variable::Literal(Value::str(&text[1..text.len() - 1]));
        }
        if let Ok(n) = text.parse::<i64>() {
            return Variable::Literal(Value::Int(n));
        }
        if let Ok(n) = text.parse::<f64>() {
            if text.chars().next().map_or(false, |c| c.is_ascii_digit() || c == '-') {
                return Variable::Literal(Value::Float(n));
            }
        }
        match text {
            "true" => Variable::Literal(Value::Bool(true)),
            "false" => Variable::Literal(Value::Bool(false)),
            _ => Variable::Path(text.split('.').map(str::to_string).collect()),
        }
    }
}

/// Resolve one path segment against a value
fn lookup_segment(value: &Value, segment: &str) -> Value {
    match value {
        Value::Dict(map) => map.get(segment).cloned().unwrap_or(Value::Null),
        Value::Record(record) => record.field(segment).cloned().unwrap_or(Value::Null),
        Value::Array(items) => match segment {
            "first" => items.first().cloned().unwrap_or(Value::Null),
            "last" => items.last().cloned().unwrap_or(Value::Null),
            "count" => Value::from(items.len()),
            index => index
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or(Value::Null),
        },
        Value::Range { start, end, inclusive } => {
            let count = value.len().unwrap_or(0);
            match segment {
                "count" => Value::from(count),
                _ if count == 0 => Value::Null,
                "first" => Value::Int(*start),
                "last" if *inclusive => Value::Int(*end),
                "last" => end.checked_sub(1).map(Value::Int).unwrap_or(Value::Null),
                _ => Value::Null,
            }
        }
        Value::Str(s) if segment == "count" => Value::from(s.chars().count()),
        _ => Value::Null,
    }
}

impl Resolvable for Variable {
    fn resolve(&self, ctx: &Context) -> Result<Value> {
        let segments = match self {
            Variable::Literal(value) => return Ok(value.clone()),
            Variable::Path(segments) => segments,
        };
        let Some((root, rest)) = segments.split_first() else {
            return Ok(Value::Null);
        };

        let mut current = match ctx.get(root) {
            Some(value) => value.clone(),
            None if ctx.options().strict_variables => {
                return Err(TemplateError::undefined_variable(root).suggest_from(root, &ctx.names()));
            }
            None => return Ok(Value::Null),
        };
        for segment in rest {
            current = lookup_segment(&current, segment);
        }
        Ok(current)
    }
}

/// A filter applied inside a filter expression
#[derive(Clone)]
pub struct FilterCall {
    pub name: String,
    pub filter: FilterFn,
    pub args: Vec<Variable>,
}

impl fmt::Debug for FilterCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterCall").field("name", &self.name).field("args", &self.args).finish()
    }
}

/// `variable|filter:arg1,arg2|filter2`
#[derive(Debug, Clone)]
pub struct FilterExpression {
    pub variable: Variable,
    pub filters: Vec<FilterCall>,
}

impl FilterExpression {
    /// Compile `text`, looking filters up through `find_filter`
    pub fn compile(text: &str, find_filter: impl Fn(&str) -> Option<FilterFn>, filter_names: &[String]) -> Result<Self> {
        let mut parts = split_outside_quotes(text.trim(), '|').into_iter();
        let head = parts.next().unwrap_or_default();
        if head.trim().is_empty() {
            return Err(TemplateError::syntax(format!("Variable tags must not be empty `{}`", text)));
        }

        let mut filters = Vec::new();
        for part in parts {
            let (name, args) = match part.split_once(':') {
                Some((name, args)) => (
                    name.trim().to_string(),
                    split_outside_quotes(args, ',').iter().map(|arg| Variable::new(arg)).collect(),
                ),
                None => (part.trim().to_string(), Vec::new()),
            };
            let filter = find_filter(&name).ok_or_else(|| {
                TemplateError::new(ErrorKind::UnknownFilter, format!("Unknown filter '{}'", name))
                    .with_source(text.to_string())
                    .suggest_from(&name, filter_names)
            })?;
            filters.push(FilterCall { name, filter, args });
        }

        Ok(FilterExpression { variable: Variable::new(&head), filters })
    }

    pub fn plain(variable: Variable) -> Self {
        FilterExpression { variable, filters: Vec::new() }
    }
}

impl Resolvable for FilterExpression {
    fn resolve(&self, ctx: &Context) -> Result<Value> {
        let mut value = self.variable.resolve(ctx)?;
        for call in &self.filters {
            let args = call.args.iter().map(|arg| arg.resolve(ctx)).collect::<Result<Vec<_>>>()?;
            value = (call.filter)(&value, &args)
                .map_err(|e| TemplateError::resolution(format!("Filter '{}' failed: {}", call.name, e.message)))?;
        }
        Ok(value)
    }
}

/// Split on `separator` except inside single or double quotes
fn split_outside_quotes(text: &str, separator: char) -> Vec<String> {
    let mut parts = vec![String::new()];
    let mut quote: Option<char> = None;
    for c in text.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == separator => {
                parts.push(String::new());
                continue;
            }
            _ => {}
        }
        if let Some(last) = parts.last_mut() {
            last.push(c);
        }
    }
    parts
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    In,
}

impl CompareOp {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "==" => Some(CompareOp::Eq),
            "!=" => Some(CompareOp::NotEq),
            "<" => Some(CompareOp::Lt),
            ">" => Some(CompareOp::Gt),
            "<=" => Some(CompareOp::LtEq),
            ">=" => Some(CompareOp::GtEq),
            "in" => Some(CompareOp::In),
            _ => None,
        }
    }

    fn apply(self, lhs: &Value, rhs: &Value) -> bool {
        match self {
            CompareOp::Eq => lhs == rhs,
            CompareOp::NotEq => lhs != rhs,
            CompareOp::In => rhs.contains(lhs),
            CompareOp::Lt => lhs.compare(rhs) == Some(Ordering::Less),
            CompareOp::Gt => lhs.compare(rhs) == Some(Ordering::Greater),
            CompareOp::LtEq => matches!(lhs.compare(rhs), Some(Ordering::Less | Ordering::Equal)),
            CompareOp::GtEq => matches!(lhs.compare(rhs), Some(Ordering::Greater | Ordering::Equal)),
        }
    }
}

/// Boolean predicate tree
#[derive(Debug, Clone)]
pub enum Expr {
    /// Truthiness of a single value
    Value(FilterExpression),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare { op: CompareOp, lhs: FilterExpression, rhs: FilterExpression },
}

impl Expression for Expr {
    fn evaluate(&self, ctx: &Context) -> Result<bool> {
        match self {
            Expr::Value(value) => Ok(value.resolve(ctx)?.is_truthy()),
            Expr::Not(inner) => Ok(!inner.evaluate(ctx)?),
            Expr::And(lhs, rhs) => Ok(lhs.evaluate(ctx)? && rhs.evaluate(ctx)?),
            Expr::Or(lhs, rhs) => Ok(lhs.evaluate(ctx)? || rhs.evaluate(ctx)?),
            Expr::Compare { op, lhs, rhs } => Ok(op.apply(&lhs.resolve(ctx)?, &rhs.resolve(ctx)?)),
        }
    }
}

/// Recursive descent over tag components: `or` < `and` < `not` < comparison
pub struct ExprParser<'a, F>
where
    F: Fn(&str) -> Result<FilterExpression>,
{
    components: &'a [String],
    pos: usize,
    compile: F,
}

impl<'a, F> ExprParser<'a, F>
where
    F: Fn(&str) -> Result<FilterExpression>,
{
    pub fn new(components: &'a [String], compile: F) -> Self {
        ExprParser { components, pos: 0, compile }
    }

    pub fn parse(mut self) -> Result<Expr> {
        if self.components.is_empty() {
            return Err(TemplateError::syntax("Expected an expression"));
        }
        let expr = self.parse_or()?;
        if let Some(extra) = self.peek() {
            return Err(TemplateError::syntax(format!(
                "Unexpected '{}' in expression `{}`",
                extra,
                self.components.join(" ")
            )));
        }
        Ok(expr)
    }

    fn peek(&self) -> Option<&str> {
        self.components.get(self.pos).map(String::as_str)
    }

    fn advance(&mut self) -> Option<&'a str> {
        let token = self.components.get(self.pos).map(String::as_str);
        self.pos += 1;
        token
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some("or") {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_not()?;
        while self.peek() == Some("and") {
            self.advance();
            let rhs = self.parse_not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if self.peek() == Some("not") {
            self.advance();
            return Ok(Expr::Not(Box::new(self.parse_not()?)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let lhs = self.parse_operand()?;
        match self.peek().and_then(CompareOp::from_token) {
            Some(op) => {
                self.advance();
                let rhs = self.parse_operand()?;
                Ok(Expr::Compare { op, lhs, rhs })
            }
            None => Ok(Expr::Value(lhs)),
        }
    }

    fn parse_operand(&mut self) -> Result<FilterExpression> {
        match self.advance() {
            Some(token) if !matches!(token, "and" | "or" | "not") && CompareOp::from_token(token).is_none() => {
                (self.compile)(token)
            }
            Some(token) => Err(TemplateError::syntax(format!(
                "Expected a value but found '{}' in expression `{}`",
                token,
                self.components.join(" ")
            ))),
            None => Err(TemplateError::syntax(format!(
                "Unexpected end of expression `{}`",
                self.components.join(" ")
            ))),
        }
    }
}

/// Compile a whitespace separated predicate using plain variables only
pub fn parse_plain_expression(text: &str) -> Result<Expr> {
    let components = split_components(text);
    ExprParser::new(&components, |token: &str| Ok(FilterExpression::plain(Variable::new(token)))).parse()
}
