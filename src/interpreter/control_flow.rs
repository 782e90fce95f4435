use crate::value::Value;

/// Outcome of executing a statement that did not raise.
#[derive(Debug)]
pub enum ControlFlow {
    Next,
    Return(Value),
}
