use std::collections::VecDeque;
use std::fmt;
use std::io::{self, BufRead, Write};

use log::debug;

use crate::runtime::error::RuntimeError;

/// Line-oriented source for `input` statements.
///
/// Supplied lines are consumed first. Once they run out, reads fall back to
/// an interactive reader when one is attached, prompting on stderr.
#[derive(Default)]
pub struct InputSource {
    lines: VecDeque<String>,
    fallback: Option<Box<dyn BufRead>>,
}

impl InputSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits `text` into lines; blank lines are skipped.
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, reader: Box<dyn BufRead>) -> Self {
        self.fallback = Some(reader);
        self
    }

    pub fn interactive() -> Self {
        Self::new().with_fallback(Box::new(io::BufReader::new(io::stdin())))
    }

    pub fn remaining(&self) -> usize {
        self.lines.len()
    }

    /// Reads the integer bound to `name`.
    pub fn read_integer(&mut self, name: &str) -> Result<i64, RuntimeError> {
        let line = match self.lines.pop_front() {
            Some(line) => line,
            None => self.prompt(name)?,
        };
        debug!("input {name} <- {line:?}");
        line.trim()
            .parse()
            .map_err(|_| RuntimeError::InvalidInput { text: line })
    }

    fn prompt(&mut self, name: &str) -> Result<String, RuntimeError> {
        let exhausted = || RuntimeError::InputExhausted {
            name: name.to_string(),
        };
        let reader = self.fallback.as_mut().ok_or_else(exhausted)?;
        eprint!("{name}: ");
        let _ = io::stderr().flush();
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) | Err(_) => Err(exhausted()),
            Ok(_) => Ok(line),
        }
    }
}

impl fmt::Debug for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputSource")
            .field("lines", &self.lines)
            .field("interactive", &self.fallback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_supplied_lines_in_order() {
        let mut input = InputSource::from_text(" 5\n\n-3\n");
        assert_eq!(input.remaining(), 2);
        assert_eq!(input.read_integer("a"), Ok(5));
        assert_eq!(input.read_integer("b"), Ok(-3));
        assert_eq!(
            input.read_integer("c"),
            Err(RuntimeError::InputExhausted {
                name: "c".to_string()
            })
        );
    }

    #[test]
    fn falls_back_to_reader() {
        let reader = io::Cursor::new(b"42\n".to_vec());
        let mut input = InputSource::from_text("1").with_fallback(Box::new(reader));
        assert_eq!(input.read_integer("a"), Ok(1));
        assert_eq!(input.read_integer("b"), Ok(42));
        assert!(input.read_integer("c").is_err());
    }

    #[test]
    fn rejects_non_integer_lines() {
        let mut input = InputSource::from_text("seven");
        assert_eq!(
            input.read_integer("n"),
            Err(RuntimeError::InvalidInput {
                text: "seven".to_string()
            })
        );
    }
}
