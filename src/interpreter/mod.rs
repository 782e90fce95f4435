pub mod control_flow;
pub mod environment;
pub mod error;
pub mod evaluator;
pub mod operators;
pub mod parser;

pub use control_flow::ControlFlow;
pub use environment::{Environment, ScopeChain, ScopeGuard};
pub use error::{InterpreterError, ToyError};
pub use evaluator::{parse_and_run, Interpreter, MAX_CALL_DEPTH};
pub use parser::{parse, ParseError, SyntaxError, TokenParser};
