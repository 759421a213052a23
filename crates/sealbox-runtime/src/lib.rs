//! Sealbox runtime bootstrap.
//!
//! Mounts the archive embedded in the executable at the virtual root and
//! reroutes the host's filesystem primitives and module resolver through
//! it. Code written against the host's ordinary APIs observes the archived
//! files as if they lived on disk under `/snapshot`.
//!
//! # Example
//!
//! ```rust,ignore
//! use sealbox_runtime::{bootstrap, entry_text, uninstall};
//!
//! // The bundler stub deposited the layout header already.
//! bootstrap()?;
//! let entry = entry_text().expect("installed");
//! // ... hand `entry` to the host for execution ...
//! uninstall();
//! ```

mod hooks;
mod trace;

pub mod error;
pub mod host;
pub mod resolve;

pub use error::RuntimeError;
pub use host::deposit_payload;
pub use sealbox_snapshot::{PayloadHeader, SNAPSHOT_ROOT};
pub use trace::{DEBUG_ENV, DEBUG_TOKEN};

use std::sync::Arc;

use parking_lot::{const_mutex, Mutex};
use sealbox_snapshot::{ArchiveFs, OverlayFs, PathNormalizer, PayloadReader};

use crate::hooks::HookState;
use crate::host::HostSlots;
use crate::trace::Trace;

/// Everything install put in place and uninstall must undo.
struct Installed {
    originals: HostSlots,
    entry_text: String,
}

static INSTALLED: Mutex<Option<Installed>> = const_mutex(None);

/// Mount the embedded archive described by `header` and intercept the host
/// table.
///
/// Idempotent: a second install while installed is a no-op. The only fatal
/// failure is a header that does not describe the blob (`HeaderInvalid`
/// underneath); everything downstream surfaces through the hooks' own
/// return conventions.
pub fn install(header: PayloadHeader) -> Result<(), RuntimeError> {
    let mut installed = INSTALLED.lock();
    if installed.is_some() {
        return Ok(());
    }

    let reader = PayloadReader::open(header)?;
    let entry_text = reader.content_text()?;
    let project_root = reader.header().project_root();

    let state = Arc::new(HookState {
        overlay: OverlayFs::new(ArchiveFs::mount(reader.resource())?),
        normalizer: PathNormalizer::new(&project_root),
        trace: Trace::from_env(),
    });

    let originals = host::slots();
    let replacement = hooks::build_slots(state, &originals);
    host::swap_slots(replacement);

    *installed = Some(Installed {
        originals,
        entry_text,
    });
    Ok(())
}

/// Restore the original host table. Safe to call when not installed, any
/// number of times, in any order with [`install`].
pub fn uninstall() {
    let mut installed = INSTALLED.lock();
    if let Some(prev) = installed.take() {
        host::swap_slots(prev.originals);
    }
}

/// Take the header the bundler deposited on the process and install it.
/// The deposit is removed on first read, even if installation then fails.
pub fn bootstrap() -> Result<(), RuntimeError> {
    let header = host::take_payload().ok_or(RuntimeError::MissingPayload)?;
    install(header)
}

/// Text of the bundled application entrypoint, available while installed.
pub fn entry_text() -> Option<String> {
    INSTALLED.lock().as_ref().map(|i| i.entry_text.clone())
}

/// Scoped installation: restores the host table when dropped.
pub struct InstallGuard {
    _private: (),
}

impl InstallGuard {
    /// Install `header` and return a guard that uninstalls on drop.
    pub fn acquire(header: PayloadHeader) -> Result<Self, RuntimeError> {
        install(header)?;
        Ok(Self { _private: () })
    }
}

impl Drop for InstallGuard {
    fn drop(&mut self) {
        uninstall();
    }
}
