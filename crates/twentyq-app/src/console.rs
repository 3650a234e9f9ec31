//! Line-oriented prompts over any reader/writer pair.

use std::fmt::Display;
use std::io::{self, BufRead, Write};

use twentyq_core::model::Answer;

const ANSWER_HINT: &str = "Please answer yes (y), no (n), or maybe (m / ? / unknown).";
const CONFIRM_HINT: &str = "Please answer yes (y) or no (n).";

pub struct Console<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn say(&mut self, line: impl Display) -> io::Result<()> {
        writeln!(self.output, "{line}")
    }

    /// Prints `prompt` and reads one trimmed line. `None` at end of input.
    pub fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.output, "{prompt} ")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Re-prompts until the reply parses as yes/no/maybe.
    pub fn ask_answer(&mut self, prompt: &str) -> io::Result<Option<Answer>> {
        loop {
            let Some(reply) = self.read_line(prompt)? else {
                return Ok(None);
            };
            match Answer::parse_loose(&reply) {
                Some(answer) => return Ok(Some(answer)),
                None => self.say(ANSWER_HINT)?,
            }
        }
    }

    /// Like [`Console::ask_answer`] but only yes or no is accepted.
    pub fn confirm(&mut self, prompt: &str) -> io::Result<Option<bool>> {
        loop {
            let Some(reply) = self.read_line(prompt)? else {
                return Ok(None);
            };
            match Answer::parse_loose(&reply).and_then(Answer::definitive) {
                Some(value) => return Ok(Some(value)),
                None => self.say(CONFIRM_HINT)?,
            }
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }
}
