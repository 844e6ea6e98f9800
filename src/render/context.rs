// File: src/render/context.rs
//
// Scope stack used while rendering a template.
// Implements a stack of frames where inner frames shadow outer frames.

use super::value::Value;
use crate::environment::RenderOptions;
use crate::errors::{Result, TemplateError};
use ahash::AHashMap;

/// One level of the scope stack
pub type Frame = AHashMap<String, Value>;

/// Key under which each loop iteration stores its metadata record
pub const FORLOOP_KEY: &str = "forloop";
/// Signal entry written into a loop frame by `break`
pub const BREAK_SIGNAL_KEY: &str = "forloop_break";
/// Signal entry written into a loop frame by `continue`
pub const CONTINUE_SIGNAL_KEY: &str = "forloop_continue";

/// Variable storage for one render call
///
/// The Context maintains a stack of frames (Vec<Frame>). Lookups search from the
/// innermost frame (end of Vec) outward. Frames are addressed by their depth from
/// the bottom of the stack, which stays stable while frames above them come and go.
///
/// # Examples
///
/// ```ignore
/// let mut ctx = Context::new();
/// ctx.set("x", Value::Int(10));
///
/// ctx.push(|ctx| {
///     ctx.set("x", Value::Int(20));
///     assert_eq!(ctx.get("x"), Some(&Value::Int(20)));
/// });
/// assert_eq!(ctx.get("x"), Some(&Value::Int(10)));
/// ```
#[derive(Clone, Debug)]
pub struct Context {
    frames: Vec<Frame>,
    options: RenderOptions,
}

impl Context {
    /// Create a context with a single empty root frame
    pub fn new() -> Self {
        Self::with_options(RenderOptions::default())
    }

    pub fn with_options(options: RenderOptions) -> Self {
        Context { frames: vec![Frame::default()], options }
    }

    /// Create a context whose root frame holds `bindings`
    pub fn from_bindings<I, K>(bindings: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut ctx = Self::new();
        for (name, value) in bindings {
            ctx.set(name, value);
        }
        ctx
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: RenderOptions) {
        self.options = options;
    }

    /// Push an empty frame, run `body`, and pop the frame again
    pub fn push<R>(&mut self, body: impl FnOnce(&mut Context) -> R) -> R {
        self.push_with(Frame::default(), body)
    }

    /// Push a frame holding `bindings`, run `body`, and pop the frame again.
    ///
    /// The stack is truncated back to its previous height whatever `body`
    /// returns, so errors and early exits never leak frames.
    pub fn push_with<R>(&mut self, bindings: Frame, body: impl FnOnce(&mut Context) -> R) -> R {
        let height = self.frames.len();
        self.frames.push(bindings);
        let result = body(self);
        self.frames.truncate(height);
        result
    }

    /// Get a variable, searching from the innermost to the outermost frame
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    /// Define a variable in the innermost frame
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.into(), value);
        }
    }

    /// Write `key` into the frame at `depth`, counted from the bottom of the stack
    pub fn set_in_frame(&mut self, depth: usize, key: impl Into<String>, value: Value) -> Result<()> {
        let height = self.frames.len();
        match self.frames.get_mut(depth) {
            Some(frame) => {
                frame.insert(key.into(), value);
                Ok(())
            }
            None => Err(TemplateError::resolution(format!(
                "Frame {} does not exist (stack height is {})",
                depth, height
            ))),
        }
    }

    /// Number of frames currently on the stack
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn frame(&self, depth: usize) -> Option<&Frame> {
        self.frames.get(depth)
    }

    pub fn innermost(&self) -> &Frame {
        // The root frame is never popped
        &self.frames[self.frames.len() - 1]
    }

    /// Locate the frame of the running loop targeted by `label`.
    ///
    /// Scans from the top for frames carrying loop metadata; without a label
    /// the first one wins, with a label the first whose metadata declares it.
    /// Returns the frame's depth from the bottom of the stack.
    pub fn find_loop_frame(&self, label: Option<&str>) -> Option<usize> {
        let offset = self.frames.iter().rev().position(|frame| match frame.get(FORLOOP_KEY) {
            Some(metadata) => match label {
                None => true,
                Some(label) => loop_label(metadata) == Some(label),
            },
            None => false,
        })?;
        Some(self.frames.len() - offset - 1)
    }

    /// Labels of every running loop, innermost first
    pub fn running_labels(&self) -> Vec<String> {
        self.frames
            .iter()
            .rev()
            .filter_map(|frame| frame.get(FORLOOP_KEY))
            .filter_map(|metadata| loop_label(metadata).map(str::to_string))
            .collect()
    }

    /// Every variable name visible from the innermost frame
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.frames.iter().flat_map(|frame| frame.keys().cloned()).collect();
        names.sort();
        names.dedup();
        names
    }
}

fn loop_label(metadata: &Value) -> Option<&str> {
    match metadata {
        Value::Dict(map) => map.get("label").and_then(Value::as_str),
        _ => None,
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
