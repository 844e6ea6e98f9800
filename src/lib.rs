// File: src/lib.rs
//
// Library interface for the Stencil loop tags.
// Exposes modules for integration testing and external use.

pub mod ast;
pub mod builtins;
pub mod environment;
pub mod errors;
pub mod lexer;
pub mod logging;
pub mod parser;
pub mod render;
pub mod template;

pub use environment::{Environment, RenderOptions};
pub use errors::{ErrorKind, Result, TemplateError};
pub use render::{Context, Fields, Flow, ForNode, LoopTerminationNode, Node, Record, TerminationKind, Value};
pub use template::Template;
