//! Embedded-archive virtual filesystem.
//!
//! A sealed executable carries a read-only archive of its application
//! sources and dependencies. This crate locates that archive through the
//! layout header, mounts it at the virtual root `/snapshot`, and unions it
//! with the real filesystem:
//! - **header**: the layout record the bundler embeds (blob + byte ranges)
//! - **reader**: materializes the archive bytes out of the executable
//! - **archive**: stat/open/read/readdir over the archive entries
//! - **overlay**: prefix-dispatch union of archive and real filesystem
//! - **path**: host-native to virtual path translation
//!
//! # Example
//!
//! ```rust,ignore
//! use sealbox_snapshot::{ArchiveFs, OverlayFs, PayloadHeader, PayloadReader, ReadFs};
//!
//! let reader = PayloadReader::open(header)?;
//! let overlay = OverlayFs::new(ArchiveFs::mount(reader.resource())?);
//! let entry = overlay.read_to_string("/snapshot/app/main.js")?;
//! ```

pub mod archive;
pub mod error;
pub mod header;
pub mod overlay;
pub mod path;
pub mod reader;

pub use archive::{ArchiveFile, ArchiveFs, EntryKind, FileStat};
pub use error::{Result, SnapshotError};
pub use header::PayloadHeader;
pub use overlay::{OverlayFs, ReadFs, RealFs};
pub use path::{PathNormalizer, SNAPSHOT_ROOT};
pub use reader::PayloadReader;
