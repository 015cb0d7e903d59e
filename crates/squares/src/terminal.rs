//! Line-oriented terminal input and output.
//!
//! The session only ever prints a line or reads one; anything that can do
//! both implements [`Terminal`]. End of input is reported as `None` so the
//! session can shut down cleanly when stdin closes.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout,
};

use crate::error::Result;

/// Prompt/response channel to the user.
#[async_trait]
pub trait Terminal: Send {
    /// Print one line.
    async fn write_line(&mut self, line: &str) -> Result<()>;

    /// Print `prompt` without a newline and read one line of input.
    ///
    /// Returns `None` at end of input. The line terminator is stripped.
    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;
}

/// Terminal over a buffered reader and a writer, stdin and stdout by default.
///
/// Input bytes that are not valid UTF-8 are decoded lossily, so a garbled line
/// reaches the session as an answer it can reject rather than as an I/O error.
#[derive(Debug)]
pub struct StdTerminal<R = BufReader<Stdin>, W = Stdout> {
    input: R,
    output: W,
}

impl StdTerminal {
    /// Take hold of stdin and stdout.
    #[must_use]
    pub fn new() -> Self {
        Self::from_io(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl Default for StdTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, W> StdTerminal<R, W> {
    /// Terminal over any line-buffered reader and writer.
    pub fn from_io(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// The writer everything is printed to.
    pub fn writer(&self) -> &W {
        &self.output
    }
}

#[async_trait]
impl<R, W> Terminal for StdTerminal<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn write_line(&mut self, line: &str) -> Result<()> {
        self.output.write_all(line.as_bytes()).await?;
        self.output.write_all(b"\n").await?;
        self.output.flush().await?;
        Ok(())
    }

    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        self.output.write_all(prompt.as_bytes()).await?;
        self.output.flush().await?;

        let mut buf = Vec::new();
        if self.input.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(None);
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }
}

/// Terminal fed from a fixed list of answers, recording everything shown.
///
/// Prompts are recorded as they would appear on screen, so a test can assert
/// on the whole conversation.
#[derive(Debug, Default, Clone)]
pub struct ScriptedTerminal {
    answers: VecDeque<String>,
    transcript: Vec<String>,
}

impl ScriptedTerminal {
    /// Create a terminal that answers prompts with `answers`, in order.
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            transcript: Vec::new(),
        }
    }

    /// Every line and prompt shown so far.
    #[must_use]
    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }

    /// The transcript joined into one string.
    #[must_use]
    pub fn output(&self) -> String {
        self.transcript.join("\n")
    }

    /// Answers not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

#[async_trait]
impl Terminal for ScriptedTerminal {
    async fn write_line(&mut self, line: &str) -> Result<()> {
        self.transcript.push(line.to_string());
        Ok(())
    }

    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        self.transcript.push(prompt.to_string());
        Ok(self.answers.pop_front())
    }
}
