//! Virtual path translation and canonicalization.
//!
//! Bundled programs keep referring to the files they were packaged from: by
//! the project's real directory, by a drive-lettered spelling of the virtual
//! root, or through the extended-length prefix some hosts prepend. The
//! normalizer folds all of those spellings into the canonical POSIX form
//! rooted at the virtual root; everything else passes through untouched.

use std::path::Path;

/// The fixed prefix under which all archive-backed files appear.
pub const SNAPSHOT_ROOT: &str = "/snapshot";

/// Extended-length path prefix (`\\?\`) some hosts prepend on Windows.
const EXTENDED_PREFIX: &str = "\\\\?\\";

/// Host-native to virtual path translation.
///
/// Pure and idempotent: already-virtual paths come back unchanged, and so
/// does anything that matches neither the drive rewrite nor the project
/// root.
#[derive(Debug, Clone)]
pub struct PathNormalizer {
    /// Project root in host-native form, trailing separators trimmed.
    project_root: String,
    /// Drive prefix of the executable (e.g. `C:`), when the root has one.
    drive: Option<String>,
}

impl PathNormalizer {
    pub fn new(project_root: &Path) -> Self {
        let mut root = project_root.to_string_lossy().into_owned();
        while root.len() > 1 && (root.ends_with('/') || root.ends_with('\\')) {
            root.pop();
        }
        let drive = drive_prefix(&root).map(str::to_owned);
        Self {
            project_root: root,
            drive,
        }
    }

    /// Translate a host-native path into canonical virtual form.
    pub fn to_virtual(&self, path: &str) -> String {
        // The extended-length prefix is stripped before any comparison.
        let p = path.strip_prefix(EXTENDED_PREFIX).unwrap_or(path);

        if p == SNAPSHOT_ROOT || p.starts_with("/snapshot/") {
            return p.to_string();
        }

        // `<drive>\snapshot\...` on the executable's own drive. The drive
        // letter compares case-insensitively; nothing else does.
        if let Some(drive) = &self.drive {
            if let Some(rest) = strip_drive(p, drive) {
                if rest == "\\snapshot" {
                    return SNAPSHOT_ROOT.to_string();
                }
                if let Some(tail) = rest.strip_prefix("\\snapshot\\") {
                    return format!("{}/{}", SNAPSHOT_ROOT, tail.replace('\\', "/"));
                }
            }
        }

        // Paths under the original project root map into the virtual root.
        if let Some(rest) = p.strip_prefix(self.project_root.as_str()) {
            if rest.is_empty() {
                return SNAPSHOT_ROOT.to_string();
            }
            if rest.starts_with('/') || rest.starts_with('\\') {
                return format!("{}{}", SNAPSHOT_ROOT, rest.replace('\\', "/"));
            }
        }

        p.to_string()
    }

    /// The project root this normalizer rewrites.
    pub fn project_root(&self) -> &str {
        &self.project_root
    }
}

/// `C:` from `C:\app`, if the path starts with a drive prefix.
fn drive_prefix(path: &str) -> Option<&str> {
    let b = path.as_bytes();
    if b.len() >= 2 && b[0].is_ascii_alphabetic() && b[1] == b':' {
        Some(&path[..2])
    } else {
        None
    }
}

/// The remainder of `path` after `drive`, compared case-insensitively.
fn strip_drive<'a>(path: &'a str, drive: &str) -> Option<&'a str> {
    let b = path.as_bytes();
    let d = drive.as_bytes();
    if b.len() > d.len() && b[0].eq_ignore_ascii_case(&d[0]) && b[1] == b':' {
        Some(&path[d.len()..])
    } else {
        None
    }
}

/// Canonicalize a path into an archive key relative to the virtual root.
///
/// Accepts absolute virtual paths (`/snapshot/a/b`) and root-relative ones
/// (`a/b`); separators are normalized and `.`/`..` collapsed. Returns
/// `None` when `..` would escape the root. The empty string keys the root
/// directory itself.
pub(crate) fn canonical_rel(path: &str) -> Option<String> {
    let normalized = path.replace('\\', "/");
    let rel = if normalized == SNAPSHOT_ROOT {
        ""
    } else if let Some(rest) = normalized.strip_prefix("/snapshot/") {
        rest
    } else {
        normalized.trim_start_matches('/')
    };

    let mut parts: Vec<&str> = Vec::new();
    for comp in rel.split('/') {
        match comp {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return None;
                }
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}
