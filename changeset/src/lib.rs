//! The changelog file written next to each build.
//!
//! A changelog is a sequence of entries, each terminated by an empty line:
//!
//! ```text
//! change 1234
//! author bob
//! client build-linux
//! time 1634567890
//! data 15
//! Fix the parser.
//! file edit 3 //depot/src/parser.c
//!
//! label REL_1.0
//!
//! ```
//!
//! Descriptions are length prefixed, so they may contain anything, including
//! empty lines.

use std::{fmt::Debug, io::Write};

use changelist::LogEntry;

mod entry;

mod error;
pub use error::Error;

mod parser;

/// Writes changelog entries to an underlying writer.
#[derive(Debug)]
pub struct Writer<W>
where
    W: Write + Debug,
{
    writer: W,
    entries: usize,
}

impl<W> Writer<W>
where
    W: Write + Debug,
{
    pub fn new(writer: W) -> Self {
        Self { writer, entries: 0 }
    }

    pub fn entry(&mut self, entry: &LogEntry) -> Result<(), Error> {
        let buf = entry::format(entry)?;
        self.writer.write_all(buf.as_bytes())?;
        self.entries += 1;

        Ok(())
    }

    /// Returns the number of entries written so far.
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Flushes and returns the underlying writer.
    pub fn into_inner(mut self) -> Result<W, Error> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Writes a complete changelog.
pub fn store<W>(writer: W, entries: &[LogEntry]) -> Result<W, Error>
where
    W: Write + Debug,
{
    let mut writer = Writer::new(writer);
    for entry in entries {
        writer.entry(entry)?;
    }

    writer.into_inner()
}

/// Parses a complete changelog.
pub fn parse(input: &[u8]) -> Result<Vec<LogEntry>, Error> {
    parser::entries(input)
}
