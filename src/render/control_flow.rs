// File: src/render/control_flow.rs
//
// Control flow signals for loop tags.
//
// Every node reports how rendering should proceed after it. A `break` or
// `continue` tag turns into a non-Normal flow which unwinds the enclosing
// node sequences until the loop it targets absorbs it.

/// Control flow signal returned by every rendered node
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Flow {
    /// Keep rendering the next sibling node
    #[default]
    Normal,
    /// Stop the targeted loop (innermost, or the one with this label)
    Break(Option<String>),
    /// Skip to the next iteration of the targeted loop
    Continue(Option<String>),
}

impl Flow {
    pub fn is_normal(&self) -> bool {
        matches!(self, Flow::Normal)
    }

    /// Label carried by a break/continue signal
    pub fn label(&self) -> Option<&str> {
        match self {
            Flow::Normal => None,
            Flow::Break(label) | Flow::Continue(label) => label.as_deref(),
        }
    }
}
