pub mod ast;
pub mod diagnostic;
pub mod interpreter;
pub mod io;
pub mod lexer;
mod stack;
pub mod token;
pub mod value;

pub use interpreter::{parse, parse_and_run, Interpreter, InterpreterError, ParseError, ToyError};
pub use io::{BufferedIo, IoChannel, IoEvent, ScriptedIo, StdIo};
pub use value::Value;
