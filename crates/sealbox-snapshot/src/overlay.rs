//! Overlay of the archive filesystem over the real one.
//!
//! Dispatch is a pure prefix rule: the virtual root and everything below it
//! is served by the archive, every other path by the real filesystem. The
//! two namespaces never merge: an archive entry cannot shadow a real file
//! outside the virtual root, and a real file cannot leak into it.
//!
//! Descriptor handles always belong to the real side and pass through
//! untouched.

use std::fs;
use std::sync::Arc;

use crate::archive::{ArchiveFile, ArchiveFs, EntryKind, FileStat};
use crate::error::{Result, SnapshotError};
use crate::path::SNAPSHOT_ROOT;

/// Read-only filesystem surface shared by the archive, the real filesystem,
/// and the overlay that unions them. The package resolver runs over this
/// seam, so the same algorithm serves virtual and on-disk trees.
pub trait ReadFs {
    fn stat(&self, path: &str) -> Result<FileStat>;

    fn read(&self, path: &str) -> Result<Vec<u8>>;

    fn readdir(&self, path: &str) -> Result<Vec<String>>;

    fn read_to_string(&self, path: &str) -> Result<String> {
        let bytes = self.read(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn is_file(&self, path: &str) -> bool {
        matches!(self.stat(path), Ok(stat) if stat.is_file())
    }

    fn is_dir(&self, path: &str) -> bool {
        matches!(self.stat(path), Ok(stat) if stat.is_dir())
    }
}

/// The real host filesystem behind the overlay.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFs;

impl ReadFs for RealFs {
    fn stat(&self, path: &str) -> Result<FileStat> {
        let meta = fs::metadata(path)?;
        Ok(FileStat {
            kind: if meta.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            },
            size: meta.len(),
        })
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        Ok(fs::read(path)?)
    }

    fn readdir(&self, path: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(path)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }
}

impl ReadFs for ArchiveFs {
    fn stat(&self, path: &str) -> Result<FileStat> {
        ArchiveFs::stat(self, path)
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        ArchiveFs::read(self, path)
    }

    fn readdir(&self, path: &str) -> Result<Vec<String>> {
        ArchiveFs::readdir(self, path)
    }
}

/// Union of the archive filesystem (under the virtual root) and the real
/// filesystem (everywhere else).
pub struct OverlayFs {
    archive: Arc<ArchiveFs>,
    real: RealFs,
}

impl OverlayFs {
    pub fn new(archive: ArchiveFs) -> Self {
        Self {
            archive: Arc::new(archive),
            real: RealFs,
        }
    }

    /// True when `path` is served by the archive side.
    pub fn is_virtual(path: &str) -> bool {
        path == SNAPSHOT_ROOT || path.starts_with("/snapshot/")
    }

    /// The archive side of the overlay.
    pub fn archive(&self) -> &ArchiveFs {
        &self.archive
    }

    /// Open a read handle for an archive file. Real-side callers keep using
    /// the descriptors they already own.
    pub fn open(&self, path: &str) -> Result<ArchiveFile> {
        if Self::is_virtual(path) {
            self.archive.open(path)
        } else {
            Err(SnapshotError::NotFound(path.to_string()))
        }
    }

    /// Write `data` to a real path. The virtual root is read-only.
    pub fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        if Self::is_virtual(path) {
            return Err(SnapshotError::ReadOnly(path.to_string()));
        }
        Ok(fs::write(path, data)?)
    }

    /// Remove a real file. The virtual root is read-only.
    pub fn remove_file(&self, path: &str) -> Result<()> {
        if Self::is_virtual(path) {
            return Err(SnapshotError::ReadOnly(path.to_string()));
        }
        Ok(fs::remove_file(path)?)
    }

    /// Create a real directory. The virtual root is read-only.
    pub fn create_dir(&self, path: &str) -> Result<()> {
        if Self::is_virtual(path) {
            return Err(SnapshotError::ReadOnly(path.to_string()));
        }
        Ok(fs::create_dir(path)?)
    }
}

impl ReadFs for OverlayFs {
    fn stat(&self, path: &str) -> Result<FileStat> {
        if Self::is_virtual(path) {
            self.archive.stat(path)
        } else {
            self.real.stat(path)
        }
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        if Self::is_virtual(path) {
            self.archive.read(path)
        } else {
            self.real.read(path)
        }
    }

    fn readdir(&self, path: &str) -> Result<Vec<String>> {
        if Self::is_virtual(path) {
            self.archive.readdir(path)
        } else {
            self.real.readdir(path)
        }
    }
}

/// Stat a real file descriptor with the host's own primitive.
#[cfg(unix)]
pub fn fstat_fd(fd: std::os::unix::io::RawFd) -> std::io::Result<FileStat> {
    use std::mem::MaybeUninit;

    let mut st = MaybeUninit::<libc::stat>::uninit();
    let rc = unsafe { libc::fstat(fd, st.as_mut_ptr()) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    let st = unsafe { st.assume_init() };
    let kind = if (st.st_mode & libc::S_IFMT) == libc::S_IFDIR {
        EntryKind::Directory
    } else {
        EntryKind::File
    };
    Ok(FileStat {
        kind,
        size: st.st_size as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    fn mount(files: &[(&str, &[u8])]) -> OverlayFs {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (name, data) in files {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        let blob: Arc<[u8]> = writer.finish().unwrap().into_inner().into();
        OverlayFs::new(ArchiveFs::mount(blob).unwrap())
    }

    #[test]
    fn test_virtual_paths_hit_the_archive() {
        let overlay = mount(&[("app/x.js", b"virtual")]);
        assert_eq!(overlay.read("/snapshot/app/x.js").unwrap(), b"virtual");
    }

    #[test]
    fn test_real_paths_hit_the_disk() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("real.txt");
        fs::write(&file, b"disk").unwrap();

        let overlay = mount(&[("real.txt", b"archive copy")]);
        let real = overlay.read(file.to_str().unwrap()).unwrap();
        assert_eq!(real, b"disk");
    }

    #[test]
    fn test_no_fallthrough_across_the_boundary() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("only-on-disk.txt"), b"disk").unwrap();

        let overlay = mount(&[]);
        // Present on disk, absent in the archive: the virtual spelling
        // must not find it.
        let err = overlay.read("/snapshot/only-on-disk.txt").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_writes_under_the_virtual_root_fail() {
        let overlay = mount(&[("x.js", b"x")]);
        for result in [
            overlay.write("/snapshot/x.js", b"nope"),
            overlay.write("/snapshot/new.js", b"nope"),
            overlay.remove_file("/snapshot/x.js"),
            overlay.create_dir("/snapshot/dir"),
        ] {
            assert!(matches!(result, Err(SnapshotError::ReadOnly(_))));
        }
    }

    #[test]
    fn test_writes_outside_the_root_delegate() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("out.txt");

        let overlay = mount(&[]);
        overlay.write(file.to_str().unwrap(), b"written").unwrap();
        assert_eq!(fs::read(&file).unwrap(), b"written");

        overlay.remove_file(file.to_str().unwrap()).unwrap();
        assert!(!file.exists());
    }

    #[test]
    fn test_open_outside_the_root_is_not_handle_based() {
        let overlay = mount(&[]);
        assert!(overlay.open("/etc/hosts").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_fstat_fd_passthrough() {
        use std::os::unix::io::AsRawFd;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"12345").unwrap();
        file.flush().unwrap();

        let stat = fstat_fd(file.as_file().as_raw_fd()).unwrap();
        assert!(stat.is_file());
        assert_eq!(stat.size, 5);
    }
}
