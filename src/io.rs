//! Transparent gzip handling for inputs and outputs
//!
//! Any path ending in `.gz` is gzip on disk; everything else is plain text.

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{ArchiveError, Result};

/// Check whether a path follows the compressed-file convention
pub fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "gz")
}

/// Open a file for line reading, decompressing `.gz` transparently.
///
/// Multi-member streams (bgzip) are read through to the end.
pub fn open_reader(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).map_err(|e| ArchiveError::io(path, e))?;
    if is_gzip(path) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Write a complete text artifact, gzip-compressing `.gz` paths.
pub fn write_text(path: &Path, content: &str) -> Result<()> {
    let file = File::create(path).map_err(|e| ArchiveError::io(path, e))?;
    let writer = BufWriter::new(file);

    if is_gzip(path) {
        let mut encoder = GzEncoder::new(writer, Compression::default());
        encoder
            .write_all(content.as_bytes())
            .map_err(|e| ArchiveError::io(path, e))?;
        let mut inner = encoder.finish().map_err(|e| ArchiveError::io(path, e))?;
        inner.flush().map_err(|e| ArchiveError::io(path, e))?;
    } else {
        let mut writer = writer;
        writer
            .write_all(content.as_bytes())
            .map_err(|e| ArchiveError::io(path, e))?;
        writer.flush().map_err(|e| ArchiveError::io(path, e))?;
    }
    Ok(())
}
