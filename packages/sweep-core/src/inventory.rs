//! The on-disk inventory: a single JSON array of records.
//!
//! [`InventoryWriter`] owns the well-formedness invariant: the file it
//! produces is valid JSON on every exit path, including a scan that stops
//! early, and it never emits a dangling trailing element. Consumers can
//! therefore parse without any repair step.
//!
//! [`InventoryReader`] is the matching pull-based iterator: it consumes the
//! opening bracket, then deserializes one record at a time straight off the
//! buffered reader. Memory stays O(record) no matter how large the
//! inventory grows, and the caller controls the pace: the next record is
//! not even read until the current one's work has finished.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::Error as _;
use serde::Deserialize;

use cms_client::Record;

use crate::error::{Result, SweepError};

/// Base name of a scan output file. Later scans get a numbered prefix
/// instead of overwriting.
pub const INVENTORY_BASE_NAME: &str = "content_scan_results.json";

/// The inventory file a processor run reads by default.
pub fn default_inventory_path(report_dir: &Path) -> PathBuf {
    report_dir.join(INVENTORY_BASE_NAME)
}

/// Incremental writer for a JSON array of records.
#[derive(Debug)]
pub struct InventoryWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    count: usize,
}

impl InventoryWriter {
    /// Open a fresh inventory file in `dir`, creating the directory if
    /// needed and picking a numbered name if the base name is taken.
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let mut path = dir.join(INVENTORY_BASE_NAME);
        let mut counter = 1;
        while path.exists() {
            path = dir.join(format!("{counter}_{INVENTORY_BASE_NAME}"));
            counter += 1;
        }
        let file = File::options().create_new(true).write(true).open(&path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(b"[\n")?;
        Ok(Self {
            writer,
            path,
            count: 0,
        })
    }

    pub fn append(&mut self, record: &Record) -> Result<()> {
        if self.count > 0 {
            self.writer.write_all(b",\n")?;
        }
        let json = serde_json::to_string_pretty(record).map_err(SweepError::Parse)?;
        self.writer.write_all(json.as_bytes())?;
        self.count += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the array and flush. Returns the path and the record count.
    pub fn finish(mut self) -> Result<(PathBuf, usize)> {
        self.writer.write_all(b"\n]")?;
        self.writer.flush()?;
        Ok((self.path, self.count))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    /// Opening bracket not consumed yet.
    Start,
    /// Inside the array, before any element.
    First,
    /// Inside the array, at least one element yielded.
    Rest,
    Done,
}

/// Pull-based streaming reader over an inventory file.
#[derive(Debug)]
pub struct InventoryReader<R> {
    reader: R,
    state: ReaderState,
}

impl InventoryReader<BufReader<File>> {
    /// Open an inventory file. A missing file is reported before any record
    /// is read, so callers can abort without leaving partial state behind.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SweepError::MissingInventory {
                path: path.to_path_buf(),
            });
        }
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> InventoryReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            state: ReaderState::Start,
        }
    }

    /// Yield the next record, or `None` at the end of the array.
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        if self.state == ReaderState::Start {
            self.expect_byte(b'[')?;
            self.state = ReaderState::First;
        }
        if self.state == ReaderState::Done {
            return Ok(None);
        }

        match self.peek_after_whitespace()? {
            None => return Err(self.parse_error("unexpected end of inventory")),
            Some(b']') => {
                self.reader.consume(1);
                self.state = ReaderState::Done;
                return Ok(None);
            }
            Some(b',') if self.state == ReaderState::Rest => {
                self.reader.consume(1);
            }
            Some(_) if self.state == ReaderState::First => {}
            Some(other) => {
                return Err(self.parse_error(&format!(
                    "expected ',' or ']' between records, found {:?}",
                    other as char
                )));
            }
        }

        self.skip_whitespace()?;
        let mut de = serde_json::Deserializer::from_reader(&mut self.reader);
        let record = Record::deserialize(&mut de).map_err(SweepError::Parse)?;
        self.state = ReaderState::Rest;
        Ok(Some(record))
    }

    fn expect_byte(&mut self, expected: u8) -> Result<()> {
        match self.peek_after_whitespace()? {
            Some(byte) if byte == expected => {
                self.reader.consume(1);
                Ok(())
            }
            Some(other) => Err(self.parse_error(&format!(
                "expected {:?}, found {:?}",
                expected as char, other as char
            ))),
            None => Err(self.parse_error("unexpected end of inventory")),
        }
    }

    fn peek_after_whitespace(&mut self) -> Result<Option<u8>> {
        self.skip_whitespace()?;
        let buf = self.reader.fill_buf()?;
        Ok(buf.first().copied())
    }

    fn skip_whitespace(&mut self) -> Result<()> {
        loop {
            let buf = self.reader.fill_buf()?;
            if buf.is_empty() {
                return Ok(());
            }
            let n = buf
                .iter()
                .take_while(|&&b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
                .count();
            let exhausted = n == buf.len();
            self.reader.consume(n);
            if !exhausted {
                return Ok(());
            }
        }
    }

    fn parse_error(&self, message: &str) -> SweepError {
        SweepError::Parse(serde_json::Error::custom(message))
    }
}

impl<R: BufRead> Iterator for InventoryReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
