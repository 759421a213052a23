//! Archive blob access.
//!
//! Reads the embedded archive out of the executable using the layout
//! header. Everything here goes through `std::fs` directly: the reader runs
//! before interception is installed and must never observe a patched
//! primitive.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;

use crate::error::{Result, SnapshotError};
use crate::header::PayloadHeader;

/// Read-only random-access view over the archive embedded in the blob.
#[derive(Debug)]
pub struct PayloadReader {
    header: PayloadHeader,
    resource: Arc<[u8]>,
}

impl PayloadReader {
    /// Open the blob named by the header and materialize the archive bytes.
    ///
    /// The header promises exactly `resource_size` bytes at
    /// `resource_start`; a short read is fatal.
    pub fn open(header: PayloadHeader) -> Result<Self> {
        let mut file = File::open(&header.blob_path)?;
        let blob_size = file.metadata()?.len();
        header.validate(blob_size)?;

        let resource = read_exact_at(&mut file, header.resource_start, header.resource_size)?;
        Ok(Self {
            header,
            resource: resource.into(),
        })
    }

    /// The layout header this reader was opened with.
    pub fn header(&self) -> &PayloadHeader {
        &self.header
    }

    /// The archive bytes, shared and immutable for the process lifetime.
    pub fn resource(&self) -> Arc<[u8]> {
        Arc::clone(&self.resource)
    }

    /// The bundled entrypoint text named by the content range.
    pub fn content_text(&self) -> Result<String> {
        let mut file = File::open(&self.header.blob_path)?;
        let bytes = read_exact_at(&mut file, self.header.content_start, self.header.content_size)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn read_exact_at(file: &mut File, start: u64, size: u64) -> Result<Vec<u8>> {
    file.seek(SeekFrom::Start(start))?;
    let mut buf = vec![0u8; size as usize];
    file.read_exact(&mut buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            SnapshotError::HeaderInvalid(format!(
                "short read: wanted {} bytes at offset {}",
                size, start
            ))
        } else {
            SnapshotError::Io(e)
        }
    })?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn blob_with(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_reads_exactly_the_resource_range() {
        let file = blob_with(b"prefix-ARCHIVE-suffix");
        let header = PayloadHeader {
            blob_path: file.path().to_path_buf(),
            resource_start: 7,
            resource_size: 7,
            content_start: 0,
            content_size: 6,
        };

        let reader = PayloadReader::open(header).unwrap();
        assert_eq!(reader.resource().as_ref(), b"ARCHIVE");
        assert_eq!(reader.content_text().unwrap(), "prefix");
    }

    #[test]
    fn test_short_blob_is_fatal() {
        let file = blob_with(b"tiny");
        let header = PayloadHeader {
            blob_path: file.path().to_path_buf(),
            resource_start: 0,
            resource_size: 1024,
            content_start: 0,
            content_size: 0,
        };

        let err = PayloadReader::open(header).unwrap_err();
        assert!(matches!(err, SnapshotError::HeaderInvalid(_)));
    }

    #[test]
    fn test_missing_blob_surfaces_io_error() {
        let header = PayloadHeader {
            blob_path: "/does/not/exist/anywhere".into(),
            resource_start: 0,
            resource_size: 0,
            content_start: 0,
            content_size: 0,
        };

        let err = PayloadReader::open(header).unwrap_err();
        assert!(matches!(err, SnapshotError::Io(_)));
    }
}
