// File: src/errors.rs
//
// Error handling and reporting for template compilation and rendering.
// Provides a structured error type with source location information
// and pretty-printed diagnostics.

use colored::Colorize;
use std::fmt;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, TemplateError>;

/// Source location of a token inside a template
#[derive(Debug, Clone, PartialEq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
    pub template: Option<String>,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column, template: None }
    }

    pub fn with_template(line: usize, column: usize, template: String) -> Self {
        Self { line, column, template: Some(template) }
    }

    pub fn unknown() -> Self {
        Self { line: 0, column: 0, template: None }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(ref template) = self.template {
            write!(f, "{}:{}:{}", template, self.line, self.column)
        } else {
            write!(f, "{}:{}", self.line, self.column)
        }
    }
}

/// Kinds of failures a template can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed tag, misplaced `break`/`continue`, missing terminator
    SyntaxError,
    /// Failure resolving a value or evaluating a predicate
    ResolutionError,
    /// `break`/`continue` naming a label no running loop declares
    UnknownLabel,
    UnknownTag,
    UnknownFilter,
    UndefinedVariable,
    ConfigError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::SyntaxError => write!(f, "Template Syntax Error"),
            ErrorKind::ResolutionError => write!(f, "Resolution Error"),
            ErrorKind::UnknownLabel => write!(f, "Unknown Loop Label"),
            ErrorKind::UnknownTag => write!(f, "Unknown Tag"),
            ErrorKind::UnknownFilter => write!(f, "Unknown Filter"),
            ErrorKind::UndefinedVariable => write!(f, "Undefined Variable"),
            ErrorKind::ConfigError => write!(f, "Configuration Error"),
        }
    }
}

/// A structured template error with location information
#[derive(Debug, Clone)]
pub struct TemplateError {
    pub kind: ErrorKind,
    pub message: String,
    pub location: SourceLocation,
    pub source_line: Option<String>,
    pub suggestion: Option<String>,
    pub help: Option<String>,
}

impl TemplateError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: SourceLocation::unknown(),
            source_line: None,
            suggestion: None,
            help: None,
        }
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = location;
        self
    }

    pub fn with_source(mut self, source_line: impl Into<String>) -> Self {
        self.source_line = Some(source_line.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Create a template syntax error
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SyntaxError, message)
    }

    /// Create a render-time resolution error
    pub fn resolution(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ResolutionError, message)
    }

    /// Create an unknown-label error for `break`/`continue`
    pub fn unknown_label(keyword: &str, label: &str) -> Self {
        Self::new(
            ErrorKind::UnknownLabel,
            format!("'{} {}': no loop labeled '{}' is currently running", keyword, label, label),
        )
    }

    /// Create an undefined variable error
    pub fn undefined_variable(name: &str) -> Self {
        Self::new(ErrorKind::UndefinedVariable, format!("Variable '{}' is not defined", name))
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigError, message)
    }

    /// Attach a "Did you mean" suggestion when a close candidate exists
    pub fn suggest_from(self, target: &str, candidates: &[String]) -> Self {
        match find_closest_match(target, candidates) {
            Some(candidate) => {
                let candidate = candidate.to_string();
                self.with_suggestion(candidate)
            }
            None => self,
        }
    }
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind_str = format!("{}", self.kind);
        writeln!(f, "{}: {}", kind_str.red().bold(), self.message.bold())?;

        if self.location.line > 0 {
            let location_str = format!("  --> {}", self.location);
            writeln!(f, "{}", location_str.bright_blue())?;
        }

        if let Some(ref source) = self.source_line {
            let line_num = self.location.line;
            let col_num = self.location.column;

            writeln!(f, "   {}", "|".bright_blue())?;
            writeln!(f, "{} {} {}", format!("{:3}", line_num).bright_blue(), "|".bright_blue(), source)?;
            writeln!(
                f,
                "   {} {}{}",
                "|".bright_blue(),
                " ".repeat(col_num.saturating_sub(1)),
                "^".red().bold()
            )?;
            writeln!(f, "   {}", "|".bright_blue())?;
        }

        if let Some(ref help) = self.help {
            writeln!(f, "   {} {}", "=".bright_yellow(), format!("help: {}", help).bright_yellow())?;
        }

        if let Some(ref suggestion) = self.suggestion {
            writeln!(
                f,
                "   {} {}",
                "=".bright_green(),
                format!("Did you mean '{}'?", suggestion).bright_green()
            )?;
        }

        Ok(())
    }
}

impl std::error::Error for TemplateError {}

/// Computes the Levenshtein distance between two strings
pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let s1_chars: Vec<char> = s1.chars().collect();
    let s2_chars: Vec<char> = s2.chars().collect();
    let (len1, len2) = (s1_chars.len(), s2_chars.len());

    if len1 == 0 {
        return len2;
    }
    if len2 == 0 {
        return len1;
    }

    // Single rolling row
    let mut row: Vec<usize> = (0..=len2).collect();
    for i in 1..=len1 {
        let mut diagonal = row[0];
        row[0] = i;
        for j in 1..=len2 {
            let cost = if s1_chars[i - 1] == s2_chars[j - 1] { 0 } else { 1 };
            let next = (row[j] + 1).min(row[j - 1] + 1).min(diagonal + cost);
            diagonal = row[j];
            row[j] = next;
        }
    }

    row[len2]
}

/// Find the closest match from a list of candidates using Levenshtein distance
/// Returns None if no good match is found (distance > 3)
pub fn find_closest_match<'a>(target: &str, candidates: &'a [String]) -> Option<&'a str> {
    let mut best_match = None;
    let mut best_distance = usize::MAX;

    for candidate in candidates {
        if candidate == target {
            continue;
        }
        let distance = levenshtein_distance(target, candidate);
        if distance <= 3 && distance < best_distance {
            best_distance = distance;
            best_match = Some(candidate.as_str());
        }
    }

    best_match
}
