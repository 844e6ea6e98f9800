// File: src/environment.rs
//
// Engine configuration: render options plus the tag and filter registries
// consulted while compiling templates.

use crate::builtins::{builtin_filters, FilterFn};
use crate::errors::{Result, TemplateError};
use crate::lexer::tokenize;
use crate::parser::{TagParser, TokenParser};
use crate::render::{ForNode, LoopTerminationNode, Value};
use crate::template::Template;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Options controlling how templates are compiled and rendered
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderOptions {
    /// Fail on unknown variables instead of rendering them as empty
    pub strict_variables: bool,
    /// Drop the first newline following a block tag
    pub trim_blocks: bool,
}

impl RenderOptions {
    /// Load options from TOML text, e.g. `strict_variables = true`
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| TemplateError::config(format!("Invalid render options: {}", e)))
    }
}

/// Template engine configuration
#[derive(Clone)]
pub struct Environment {
    pub options: RenderOptions,
    tags: HashMap<String, TagParser>,
    filters: HashMap<String, FilterFn>,
}

impl Environment {
    /// Environment with the loop tags and built-in filters registered
    pub fn new() -> Self {
        Self::with_options(RenderOptions::default())
    }

    pub fn with_options(options: RenderOptions) -> Self {
        let mut environment = Environment { options, tags: HashMap::new(), filters: builtin_filters() };
        environment.register_tag("for", ForNode::parse);
        environment.register_tag("break", LoopTerminationNode::parse);
        environment.register_tag("continue", LoopTerminationNode::parse);
        environment
    }

    pub fn register_tag(&mut self, name: impl Into<String>, parser: TagParser) {
        self.tags.insert(name.into(), parser);
    }

    pub fn register_filter<F>(&mut self, name: impl Into<String>, filter: F)
    where
        F: Fn(&Value, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.filters.insert(name.into(), Arc::new(filter));
    }

    pub fn tag(&self, name: &str) -> Option<TagParser> {
        self.tags.get(name).copied()
    }

    pub fn filter(&self, name: &str) -> Option<FilterFn> {
        self.filters.get(name).cloned()
    }

    pub fn tag_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tags.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn filter_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.filters.keys().cloned().collect();
        names.sort();
        names
    }

    /// Compile template source text
    pub fn template_from_str(&self, source: &str) -> Result<Template> {
        self.compile(None, source)
    }

    /// Compile template source text, naming it in error locations
    pub fn named_template(&self, name: &str, source: &str) -> Result<Template> {
        self.compile(Some(name), source)
    }

    fn compile(&self, name: Option<&str>, source: &str) -> Result<Template> {
        let tokens = tokenize(source, self.options.trim_blocks).map_err(|e| locate(e, name))?;
        debug!(template = name.unwrap_or("<string>"), tokens = tokens.len(), "compiling template");
        let nodes = TokenParser::new(tokens, self).parse().map_err(|e| locate(e, name))?;
        Ok(Template::new(name.map(str::to_string), nodes, self.options.clone()))
    }

    /// Compile and render in one step
    pub fn render_template(&self, source: &str, bindings: HashMap<String, Value>) -> Result<String> {
        self.template_from_str(source)?.render(bindings)
    }
}

fn locate(mut err: TemplateError, name: Option<&str>) -> TemplateError {
    if let Some(name) = name {
        err.location.template = Some(name.to_string());
    }
    err
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("options", &self.options)
            .field("tags", &self.tag_names())
            .field("filters", &self.filter_names())
            .finish()
    }
}
