//! Hash manifest (SHA256SUMS) format
//!
//! One entry per line, `<digest>  <filename>\n`, the layout produced by
//! `sha256sum`. The manifest is the artifact exchanged between the
//! `hash generate` and `download`/`install` workflows, so the writer is
//! deterministic and the parser keeps document order.
//!
//! Duplicate filenames are resolved last-wins when parsing. This is a
//! different rule from the generator's highest-version-wins, which lives in
//! [`crate::distro::generate`].

use crate::digest::Sha256Digest;
use crate::error::{ReproError, ReproResult};
use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::path::Path;

/// Ordered mapping of filename to digest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashManifest {
    entries: Vec<(String, Sha256Digest)>,
    index: HashMap<String, usize>,
}

impl HashManifest {
    /// Create an empty manifest
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an entry. An overwritten entry keeps its position.
    ///
    /// Filenames that would not survive a write and re-parse (empty, with a
    /// line break, or with surrounding whitespace) are rejected.
    pub fn insert(&mut self, filename: impl Into<String>, digest: Sha256Digest) -> ReproResult<()> {
        let filename = filename.into();
        validate_filename(&filename)?;
        self.insert_valid(filename, digest);
        Ok(())
    }

    fn insert_valid(&mut self, filename: String, digest: Sha256Digest) {
        match self.index.get(&filename) {
            Some(&i) => self.entries[i].1 = digest,
            None => {
                self.index.insert(filename.clone(), self.entries.len());
                self.entries.push((filename, digest));
            }
        }
    }

    /// Look up the digest recorded for a filename
    pub fn get(&self, filename: &str) -> Option<&Sha256Digest> {
        self.index.get(filename).map(|&i| &self.entries[i].1)
    }

    /// Whether `filename` is recorded with exactly `digest`
    pub fn contains_entry(&self, filename: &str, digest: &Sha256Digest) -> bool {
        self.get(filename) == Some(digest)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in document order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Sha256Digest)> {
        self.entries.iter().map(|(f, d)| (f.as_str(), d))
    }

    /// Merge another manifest into this one, later entries winning
    pub fn extend(&mut self, other: HashManifest) {
        for (filename, digest) in other.entries {
            self.insert_valid(filename, digest);
        }
    }

    /// Copy of this manifest with entries sorted by filename
    pub fn sorted(&self) -> Self {
        let mut entries = self.entries.clone();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let mut sorted = Self::new();
        for (filename, digest) in entries {
            sorted.insert_valid(filename, digest);
        }
        sorted
    }

    /// Parse a manifest from text
    pub fn parse(content: &str) -> ReproResult<Self> {
        Self::from_reader(content.as_bytes())
    }

    /// Parse a manifest from a buffered reader
    pub fn from_reader<R: BufRead>(reader: R) -> ReproResult<Self> {
        let mut manifest = Self::new();
        for (i, line) in reader.lines().enumerate() {
            let lineno = i + 1;
            let line = line.map_err(|e| ReproError::io("reading hash manifest", e))?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let (digest, filename) =
                trimmed
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| ReproError::ManifestFormat {
                        line: lineno,
                        reason: format!("expected \"<sha256>  <filename>\", got {:?}", line),
                    })?;
            let filename = filename.trim_start();
            let digest = Sha256Digest::parse(digest).map_err(|e| ReproError::ManifestFormat {
                line: lineno,
                reason: e.to_string(),
            })?;
            manifest.insert_valid(filename.to_string(), digest);
        }
        Ok(manifest)
    }

    /// Read and parse a manifest file
    pub async fn from_file(path: &Path) -> ReproResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ReproError::io(format!("reading hash file {}", path.display()), e))?;
        Self::parse(&content)
    }

    /// Serialize in document order
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for (filename, digest) in self.iter() {
            out.push_str(&format_entry(digest, filename));
        }
        out
    }
}

fn format_entry(digest: &Sha256Digest, filename: &str) -> String {
    format!("{}  {}\n", digest, filename)
}

fn validate_filename(filename: &str) -> ReproResult<()> {
    if filename.is_empty()
        || filename.contains(['\n', '\r'])
        || filename.trim() != filename
    {
        return Err(ReproError::User(format!(
            "Filename {:?} cannot be written to a hash manifest",
            filename
        )));
    }
    Ok(())
}

/// Sink for generated manifest entries
pub trait HashWriter: Send {
    fn write_entry(&mut self, digest: &Sha256Digest, filename: &str) -> ReproResult<()>;
}

impl HashWriter for HashManifest {
    fn write_entry(&mut self, digest: &Sha256Digest, filename: &str) -> ReproResult<()> {
        self.insert(filename, digest.clone())
    }
}

/// Streams entries to an `io::Write` as they are generated
pub struct ManifestWriter<W> {
    inner: W,
}

impl<W: Write + Send> ManifestWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write + Send> HashWriter for ManifestWriter<W> {
    fn write_entry(&mut self, digest: &Sha256Digest, filename: &str) -> ReproResult<()> {
        validate_filename(filename)?;
        self.inner
            .write_all(format_entry(digest, filename).as_bytes())
            .map_err(|e| ReproError::io("writing hash manifest", e))
    }
}

/// Suppresses entries already present, with the same digest, in a prior manifest
pub struct DedupeWriter<'a> {
    prior: &'a HashManifest,
    inner: &'a mut (dyn HashWriter + 'a),
}

impl<'a> DedupeWriter<'a> {
    pub fn new(prior: &'a HashManifest, inner: &'a mut (dyn HashWriter + 'a)) -> Self {
        Self { prior, inner }
    }
}

impl HashWriter for DedupeWriter<'_> {
    fn write_entry(&mut self, digest: &Sha256Digest, filename: &str) -> ReproResult<()> {
        if self.prior.contains_entry(filename, digest) {
            return Ok(());
        }
        self.inner.write_entry(digest, filename)
    }
}
