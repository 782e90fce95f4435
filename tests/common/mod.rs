#![allow(dead_code)]

use toy::{parse_and_run, InterpreterError, IoEvent, ScriptedIo, ToyError};

/// Runs a program that is expected to succeed and returns its printed lines.
pub fn run(source: &str) -> Vec<String> {
    let mut io = ScriptedIo::default();
    if let Err(err) = parse_and_run(source, &mut io) {
        panic!("program failed: {}\n{}", err, source);
    }
    io.outputs()
}

/// Runs a program with the given input lines and returns the full transcript.
pub fn run_with_input(source: &str, inputs: &[&str]) -> Vec<IoEvent> {
    let mut io = ScriptedIo::new(inputs.iter().copied());
    if let Err(err) = parse_and_run(source, &mut io) {
        panic!("program failed: {}\n{}", err, source);
    }
    io.transcript().to_vec()
}

/// Runs a program that is expected to fail, returning the error together
/// with whatever was printed before the failure.
pub fn run_failing(source: &str) -> (ToyError, Vec<String>) {
    let mut io = ScriptedIo::default();
    match parse_and_run(source, &mut io) {
        Ok(()) => panic!("program succeeded but should have failed:\n{}", source),
        Err(err) => (err, io.outputs()),
    }
}

pub fn runtime_error(source: &str) -> InterpreterError {
    match run_failing(source).0 {
        ToyError::Runtime(err) => err,
        ToyError::Parse(err) => panic!("expected a runtime error, got parse error: {}", err),
    }
}

pub fn print(line: &str) -> IoEvent {
    IoEvent::Print(line.to_string())
}

pub fn input(prompt: Option<&str>) -> IoEvent {
    IoEvent::Input {
        prompt: prompt.map(str::to_string),
    }
}
