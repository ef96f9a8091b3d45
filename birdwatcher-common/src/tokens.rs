//! Line tokenizer and garbage filter for `birdcl show protocols all` output.
//!
//! Both stages are lazy adapters: nothing is read from the underlying line
//! source until the consumer asks for the next item.

use std::io;

use tracing::trace;

use crate::error::Result;

/// Column header printed by birdcl right before the first protocol entry.
const COLUMN_HEADER: [&str; 6] = ["name", "proto", "table", "state", "since", "info"];

/// One input line split on whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenLine {
    /// 1-based position of the line in the raw input.
    pub number: usize,
    /// Whitespace-delimited tokens, in order.
    pub tokens: Vec<String>,
}

impl TokenLine {
    /// Split a raw line into tokens.
    pub fn new(number: usize, line: &str) -> Self {
        Self {
            number,
            tokens: line.split_whitespace().map(str::to_string).collect(),
        }
    }

    /// An empty line, which terminates a protocol record.
    pub fn is_blank(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The version banner (`BIRD 1.5.0 ready.`) or the column header.
    pub fn is_garbage(&self) -> bool {
        let is_banner =
            self.tokens.len() == 3 && self.tokens[0] == "BIRD" && self.tokens[2] == "ready.";
        is_banner || self.tokens == COLUMN_HEADER
    }

    /// Tokens borrowed as string slices, for slice-pattern matching.
    pub fn as_strs(&self) -> Vec<&str> {
        self.tokens.iter().map(String::as_str).collect()
    }
}

/// Iterator adapter turning raw lines into [`TokenLine`]s.
#[derive(Debug)]
pub struct Tokens<I> {
    lines: I,
    number: usize,
}

impl<I> Iterator for Tokens<I>
where
    I: Iterator<Item = io::Result<String>>,
{
    type Item = Result<TokenLine>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = self.lines.next()?;
        self.number += 1;
        Some(
            line.map(|l| TokenLine::new(self.number, &l))
                .map_err(Into::into),
        )
    }
}

/// Tokenize a sequence of raw lines, preserving order.
pub fn tokenize<I>(lines: I) -> Tokens<I::IntoIter>
where
    I: IntoIterator<Item = io::Result<String>>,
{
    Tokens {
        lines: lines.into_iter(),
        number: 0,
    }
}

/// Iterator adapter dropping the banner and column header lines.
#[derive(Debug)]
pub struct SkipGarbage<I> {
    inner: I,
}

impl<I> Iterator for SkipGarbage<I>
where
    I: Iterator<Item = Result<TokenLine>>,
{
    type Item = Result<TokenLine>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next()? {
                Ok(line) if line.is_garbage() => {
                    trace!(line = line.number, "Skipping birdcl banner line");
                }
                other => return Some(other),
            }
        }
    }
}

/// Remove birdcl's version banner and column header from a token stream.
pub fn skip_garbage<I>(tokens: I) -> SkipGarbage<I::IntoIter>
where
    I: IntoIterator<Item = Result<TokenLine>>,
{
    SkipGarbage {
        inner: tokens.into_iter(),
    }
}
