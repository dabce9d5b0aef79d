use std::{
  collections::HashSet,
  fs::OpenOptions,
  path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One fulfillment record: a purpose string and the target it covers.
///
/// Equality is structural over both fields. Persisted as a single
/// two-column CSV row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fulfillment {
  /// Caller-supplied string scoping the record.
  pub purpose: String,
  /// Rendered identity key: a URI string or a `"content hash: ..."` key.
  pub target:  String,
}

impl Fulfillment {
  /// Builds an entry from a purpose and a rendered identity key.
  pub fn new(purpose: impl Into<String>, target: impl Into<String>) -> Self {
    Self { purpose: purpose.into(), target: target.into() }
  }
}

/// Append-only on-disk record of fulfilled entries.
///
/// Rows are comma-separated with standard CSV quoting and no header, so
/// the file can be re-opened, re-parsed row by row, and appended to
/// without rewriting existing rows.
#[derive(Debug)]
pub struct Journal {
  path: PathBuf,
}

impl Journal {
  /// Opens the journal at `path`, creating the file if it doesn't exist.
  ///
  /// The file is touched even before any writes, so callers can stat it
  /// immediately.
  pub fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref().to_path_buf();
    OpenOptions::new().create(true).append(true).open(&path)?;
    Ok(Self { path })
  }

  /// Path of the backing file.
  pub fn path(&self) -> &Path { &self.path }

  /// Parses every persisted row into a set of entries.
  ///
  /// Fails on malformed rows (wrong column count).
  pub fn load(&self) -> Result<HashSet<Fulfillment>> {
    let mut reader = csv::ReaderBuilder::new().has_headers(false).from_path(&self.path)?;
    let mut fulfilled = HashSet::new();
    for row in reader.deserialize() {
      fulfilled.insert(row?);
    }
    Ok(fulfilled)
  }

  /// Appends `entries` as new rows, in order, without touching existing
  /// rows.
  pub fn append(&self, entries: &[Fulfillment]) -> Result<()> {
    if entries.is_empty() {
      return Ok(());
    }
    let file = OpenOptions::new().append(true).open(&self.path)?;
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    for entry in entries {
      writer.serialize(entry)?;
    }
    writer.flush()?;
    Ok(())
  }
}
