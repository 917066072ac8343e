use std::{
    ffi::CStr,
    fs::{self, File},
    io::{ErrorKind, Read},
    path::Path,
};

use crate::error::{Error, Result};

/// Whole-file contents followed by a single NUL terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContents {
    bytes: Vec<u8>,
}

impl FileContents {
    fn terminated(mut bytes: Vec<u8>) -> Self {
        bytes.push(0);
        Self { bytes }
    }

    pub(crate) fn from_text(text: &str) -> Self {
        Self::terminated(text.as_bytes().to_vec())
    }

    /// Length of the content, excluding the terminator.
    pub fn len(&self) -> usize {
        self.bytes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The content without its terminator.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len()]
    }

    /// The content with its terminator.
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        &self.bytes
    }

    /// The content as a C string, cut at the first interior NUL if any.
    pub fn as_c_str(&self) -> &CStr {
        // The buffer always ends in NUL so this cannot fail.
        CStr::from_bytes_until_nul(&self.bytes).unwrap_or_default()
    }
}

/// Reads the whole file at `path` into memory.
///
/// The size is taken from the file's metadata; if the file ends before that
/// many bytes arrive, whatever was read is kept. Failing to stat, open or
/// read the file is logged and returned as [`Error::ReadFile`].
pub fn read_entire_file(path: impl AsRef<Path>) -> Result<FileContents> {
    let path = path.as_ref();
    let fail = |source: std::io::Error| {
        tracing::error!("failed to read {}: {source}", path.display());
        Error::ReadFile {
            path: path.to_path_buf(),
            source,
        }
    };

    let size = fs::metadata(path).map_err(fail)?.len() as usize;
    let mut file = File::open(path).map_err(fail)?;

    let mut bytes = vec![0u8; size];
    let mut filled = 0;
    while filled < size {
        match file.read(&mut bytes[filled..]) {
            Ok(0) => {
                tracing::warn!(
                    "{} ended after {filled} of {size} bytes",
                    path.display()
                );
                break;
            }
            Ok(read) => filled += read,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(fail(e)),
        }
    }
    bytes.truncate(filled);

    tracing::trace!("read {filled} bytes from {}", path.display());
    Ok(FileContents::terminated(bytes))
}
