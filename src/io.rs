//! Pluggable I/O for `print` and `input`.
//!
//! The evaluator never touches the terminal directly. Output lines and input
//! requests go through an [`IoChannel`], so the same program can run against
//! a terminal, a scripted transcript or a parallel-task buffer.

use std::collections::VecDeque;
use std::io::{BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to write output: {0}")]
    Write(#[source] std::io::Error),
    #[error("failed to read input: {0}")]
    Read(#[source] std::io::Error),
}

/// One observable interaction between a program and its channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoEvent {
    Print(String),
    Input { prompt: Option<String> },
}

pub trait IoChannel {
    /// Emits one complete output line (without the trailing newline).
    fn print_line(&mut self, line: &str) -> Result<(), IoError>;

    /// Requests one line of input. `Ok(None)` means the source is exhausted.
    fn read_line(&mut self, prompt: Option<&str>) -> Result<Option<String>, IoError>;
}

/// Terminal channel: stdout for output, stdin for input.
#[derive(Debug, Default)]
pub struct StdIo;

impl StdIo {
    pub fn new() -> Self {
        Self
    }
}

impl IoChannel for StdIo {
    fn print_line(&mut self, line: &str) -> Result<(), IoError> {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "{}", line).map_err(IoError::Write)?;
        handle.flush().map_err(IoError::Write)
    }

    fn read_line(&mut self, prompt: Option<&str>) -> Result<Option<String>, IoError> {
        if let Some(prompt) = prompt {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            write!(handle, "{}", prompt).map_err(IoError::Write)?;
            handle.flush().map_err(IoError::Write)?;
        }

        let mut line = String::new();
        let read = std::io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(IoError::Read)?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(strip_newline(line)))
    }
}

fn strip_newline(mut line: String) -> String {
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    line
}

/// Channel with pre-supplied input lines that records every event.
#[derive(Debug, Default)]
pub struct ScriptedIo {
    inputs: VecDeque<String>,
    transcript: Vec<IoEvent>,
}

impl ScriptedIo {
    pub fn new<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            transcript: Vec::new(),
        }
    }

    pub fn transcript(&self) -> &[IoEvent] {
        &self.transcript
    }

    /// Printed lines in emission order.
    pub fn outputs(&self) -> Vec<String> {
        self.transcript
            .iter()
            .filter_map(|event| match event {
                IoEvent::Print(line) => Some(line.clone()),
                IoEvent::Input { .. } => None,
            })
            .collect()
    }

    pub fn remaining_inputs(&self) -> usize {
        self.inputs.len()
    }
}

impl IoChannel for ScriptedIo {
    fn print_line(&mut self, line: &str) -> Result<(), IoError> {
        self.transcript.push(IoEvent::Print(line.to_string()));
        Ok(())
    }

    fn read_line(&mut self, prompt: Option<&str>) -> Result<Option<String>, IoError> {
        self.transcript.push(IoEvent::Input {
            prompt: prompt.map(str::to_string),
        });
        Ok(self.inputs.pop_front())
    }
}

/// Holds a parallel task's output until the task finishes.
///
/// Input requests pass straight through to the wrapped channel.
pub struct BufferedIo<'a> {
    inner: &'a mut dyn IoChannel,
    lines: Vec<String>,
}

impl<'a> BufferedIo<'a> {
    pub fn new(inner: &'a mut dyn IoChannel) -> Self {
        Self {
            inner,
            lines: Vec::new(),
        }
    }

    pub fn pending(&self) -> &[String] {
        &self.lines
    }

    /// Writes the buffered lines to the wrapped channel as one group.
    pub fn flush(&mut self) -> Result<(), IoError> {
        for line in self.lines.drain(..) {
            self.inner.print_line(&line)?;
        }
        Ok(())
    }
}

impl IoChannel for BufferedIo<'_> {
    fn print_line(&mut self, line: &str) -> Result<(), IoError> {
        self.lines.push(line.to_string());
        Ok(())
    }

    fn read_line(&mut self, prompt: Option<&str>) -> Result<Option<String>, IoError> {
        self.inner.read_line(prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_io_records_transcript() {
        let mut io = ScriptedIo::new(["Alice"]);
        io.print_line("start").unwrap();
        assert_eq!(io.read_line(Some("Name: ")).unwrap(), Some("Alice".to_string()));
        assert_eq!(io.read_line(None).unwrap(), None);

        assert_eq!(
            io.transcript(),
            &[
                IoEvent::Print("start".to_string()),
                IoEvent::Input {
                    prompt: Some("Name: ".to_string())
                },
                IoEvent::Input { prompt: None },
            ]
        );
        assert_eq!(io.outputs(), vec!["start".to_string()]);
        assert_eq!(io.remaining_inputs(), 0);
    }

    #[test]
    fn test_buffered_io_holds_output_until_flush() {
        let mut scripted = ScriptedIo::new(["line"]);
        {
            let mut buffered = BufferedIo::new(&mut scripted);
            buffered.print_line("a").unwrap();
            buffered.print_line("b").unwrap();
            assert_eq!(buffered.pending(), &["a".to_string(), "b".to_string()]);
            assert_eq!(buffered.read_line(None).unwrap(), Some("line".to_string()));
            buffered.flush().unwrap();
            assert!(buffered.pending().is_empty());
        }
        assert_eq!(scripted.outputs(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_strip_newline() {
        assert_eq!(strip_newline("abc\r\n".to_string()), "abc");
        assert_eq!(strip_newline("abc\n".to_string()), "abc");
        assert_eq!(strip_newline("abc".to_string()), "abc");
    }
}
