//! Payload layout header.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SnapshotError};

/// Layout of the payload embedded in the executable.
///
/// Captured at bundle time and handed to the runtime at startup. All offsets
/// are absolute byte positions within `blob_path`; sizes are byte counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadHeader {
    /// File containing the archive bytes (typically the executable itself).
    pub blob_path: PathBuf,
    /// Absolute byte offset of the embedded archive.
    pub resource_start: u64,
    /// Size of the embedded archive in bytes.
    pub resource_size: u64,
    /// Absolute byte offset of the bundled entrypoint text.
    pub content_start: u64,
    /// Size of the bundled entrypoint text in bytes.
    pub content_size: u64,
}

impl PayloadHeader {
    /// Validate both byte ranges against the size of the blob file.
    pub fn validate(&self, blob_size: u64) -> Result<()> {
        check_range("resource", self.resource_start, self.resource_size, blob_size)?;
        check_range("content", self.content_start, self.content_size, blob_size)?;
        Ok(())
    }

    /// Directory that contained the application at bundle time, derived
    /// from the blob's own location. Used only for path translation.
    pub fn project_root(&self) -> PathBuf {
        match self.blob_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// The blob file.
    pub fn blob_path(&self) -> &Path {
        &self.blob_path
    }
}

fn check_range(what: &str, start: u64, size: u64, blob_size: u64) -> Result<()> {
    let end = start.checked_add(size).ok_or_else(|| {
        SnapshotError::HeaderInvalid(format!("{} range overflows: {} + {}", what, start, size))
    })?;
    if end > blob_size {
        return Err(SnapshotError::HeaderInvalid(format!(
            "{} range {}..{} exceeds blob size {}",
            what, start, end, blob_size
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(resource_start: u64, resource_size: u64) -> PayloadHeader {
        PayloadHeader {
            blob_path: PathBuf::from("/usr/bin/tool"),
            resource_start,
            resource_size,
            content_start: 0,
            content_size: 0,
        }
    }

    #[test]
    fn test_valid_ranges() {
        assert!(header(10, 90).validate(100).is_ok());
        assert!(header(0, 100).validate(100).is_ok());
    }

    #[test]
    fn test_range_past_end_of_blob() {
        let err = header(10, 91).validate(100).unwrap_err();
        assert!(matches!(err, SnapshotError::HeaderInvalid(_)));
    }

    #[test]
    fn test_range_overflow() {
        let err = header(u64::MAX, 1).validate(100).unwrap_err();
        assert!(matches!(err, SnapshotError::HeaderInvalid(_)));
    }

    #[test]
    fn test_project_root_is_blob_directory() {
        let h = header(0, 0);
        assert_eq!(h.project_root(), PathBuf::from("/usr/bin"));
    }
}
