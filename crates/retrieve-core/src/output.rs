//! Writing retrieval results, accuracy reports and submissions to disk.
//!
//! Results are written either as one JSON document or as JSON Lines, one
//! query per line.

use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::types::RetrievalRun;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Single JSON document
    Json,
    /// One JSON object per line
    JsonLines,
}

impl OutputFormat {
    /// Parse format from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "jsonl" | "jsonlines" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::JsonLines => "jsonl",
        }
    }
}

/// Serializes items to JSON or JSONL.
pub struct OutputWriter<W: Write> {
    writer: W,
    format: OutputFormat,
    pretty: bool,
    items_written: usize,
}

impl OutputWriter<BufWriter<File>> {
    /// Create `path` (and its parent directories) for writing.
    pub fn create(path: &Path, format: OutputFormat, pretty: bool) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self::new(BufWriter::new(File::create(path)?), format, pretty))
    }
}

impl<W: Write> OutputWriter<W> {
    /// `pretty` only affects the JSON format; JSONL is always compact.
    pub fn new(writer: W, format: OutputFormat, pretty: bool) -> Self {
        Self {
            writer,
            format,
            pretty,
            items_written: 0,
        }
    }

    /// Write one item as a document (JSON) or a line (JSONL).
    pub fn write<T: Serialize>(&mut self, item: &T) -> io::Result<()> {
        if self.pretty && self.format == OutputFormat::Json {
            serde_json::to_writer_pretty(&mut self.writer, item).map_err(io::Error::other)?;
        } else {
            serde_json::to_writer(&mut self.writer, item).map_err(io::Error::other)?;
        }
        writeln!(self.writer)?;
        self.items_written += 1;
        Ok(())
    }

    /// Write a retrieval run: the whole run as one document for JSON, one
    /// query result per line for JSONL.
    pub fn write_run(&mut self, run: &RetrievalRun) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => self.write(run),
            OutputFormat::JsonLines => {
                for result in &run.results {
                    self.write(result)?;
                }
                Ok(())
            }
        }
    }

    pub fn items_written(&self) -> usize {
        self.items_written
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Write `item` as a single JSON document at `path`, creating parent dirs.
pub fn save_json<T: Serialize>(path: &Path, item: &T, pretty: bool) -> io::Result<PathBuf> {
    let mut writer = OutputWriter::create(path, OutputFormat::Json, pretty)?;
    writer.write(item)?;
    writer.flush()?;
    Ok(path.to_path_buf())
}

/// Serialize an item to a JSON string.
pub fn to_json<T: Serialize>(item: &T, pretty: bool) -> Result<String, serde_json::Error> {
    if pretty {
        serde_json::to_string_pretty(item)
    } else {
        serde_json::to_string(item)
    }
}
