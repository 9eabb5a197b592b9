//! Indenting text emitter for the scene file

use std::fs::File;
use std::io::{BufWriter, Write};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use fsxport_core::{Error, Result, ResultExt};

const INDENT: &str = "  ";

/// Text sink that prefixes writes with the current indentation
///
/// Indentation is added once at the start of each `write` call, so
/// multi-line strings keep their own layout after the first line.
#[derive(Debug)]
pub struct XWriter<W: Write> {
    out: W,
    depth: usize,
}

impl<W: Write> XWriter<W> {
    /// Wrap an output stream at depth zero
    pub fn new(out: W) -> Self {
        Self { out, depth: 0 }
    }

    /// Write `text` after the current indentation
    pub fn write(&mut self, text: &str) -> Result<()> {
        for _ in 0..self.depth {
            self.out.write_all(INDENT.as_bytes())?;
        }
        self.out.write_all(text.as_bytes())?;
        Ok(())
    }

    /// Write `text` without indentation
    pub fn write_raw(&mut self, text: &str) -> Result<()> {
        self.out.write_all(text.as_bytes())?;
        Ok(())
    }

    /// One level deeper
    pub fn indent(&mut self) {
        self.depth += 1;
    }

    /// One level shallower, never below zero
    pub fn unindent(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Current depth
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Flush the underlying stream
    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    /// Give back the stream
    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Scene file on disk
///
/// Flushes when dropped, so a failed export still leaves the partial file
/// readable.
#[derive(Debug)]
pub struct XFile {
    writer: XWriter<BufWriter<File>>,
    path: PathBuf,
}

impl XFile {
    /// Create (or truncate) the file at `path`
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .map_err(Error::from)
            .with_context(|| format!("creating {}", path.display()))?;
        tracing::debug!(path = %path.display(), "opened scene file");
        Ok(Self {
            writer: XWriter::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    /// Path of the file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and close, reporting errors the drop would swallow
    pub fn close(mut self) -> Result<()> {
        self.writer.flush()
    }
}

impl Deref for XFile {
    type Target = XWriter<BufWriter<File>>;

    fn deref(&self) -> &Self::Target {
        &self.writer
    }
}

impl DerefMut for XFile {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.writer
    }
}

impl Drop for XFile {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to flush scene file");
        }
    }
}
