//! Thin compatibility layer over the host runtime's patchable internals.
//!
//! The host keeps its low-level filesystem primitives and its module
//! resolver in swappable slots on a process-wide table; this module is that
//! table. Embedders and tests call through it
//! (`read_file_text`, `read_json_text`, `module_stat`, `find_path`), the
//! default slots reproduce the host's own real-filesystem behavior, and
//! installation swaps slots in and out wholesale.
//!
//! The table also carries the stand-in for the process-global property
//! where the bundler deposits the layout header; bootstrap reads and
//! removes it exactly once.

use std::sync::Arc;

use parking_lot::{const_mutex, const_rwlock, Mutex, RwLock};
use sealbox_snapshot::overlay::{ReadFs, RealFs};
use sealbox_snapshot::PayloadHeader;

use crate::resolve;

/// `ENOENT` for the stat-hook return convention.
#[cfg(unix)]
pub(crate) const ENOENT: i64 = libc::ENOENT as i64;
#[cfg(not(unix))]
pub(crate) const ENOENT: i64 = 2;

/// A loosely typed argument cell, as delivered by the host's private
/// calling conventions (which vary across host major versions).
#[derive(Debug, Clone)]
pub enum HostValue {
    Int(i64),
    Str(String),
    Null,
}

/// Stat-hook argument, decoded from the version-variant positional shapes:
/// `(path, ...)` on older hosts, `(context, path, ...)` on newer ones.
#[derive(Debug, Clone)]
pub enum StatArg {
    Fd(i32),
    Path(String),
}

impl StatArg {
    /// Select the string argument by type inspection of the first two
    /// cells; an integer first argument with no string is a descriptor.
    pub fn from_args(args: &[HostValue]) -> Option<StatArg> {
        for cell in args.iter().take(2) {
            if let HostValue::Str(s) = cell {
                return Some(StatArg::Path(s.clone()));
            }
        }
        for cell in args.iter().take(2) {
            if let HostValue::Int(fd) = cell {
                return Some(StatArg::Fd(*fd as i32));
            }
        }
        None
    }
}

pub type ReadFileSlot = Arc<dyn Fn(&str) -> String + Send + Sync>;
pub type ReadJsonSlot = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;
pub type ModuleStatSlot = Arc<dyn Fn(&[HostValue]) -> i64 + Send + Sync>;
pub type FindPathSlot = Arc<dyn Fn(&str, &[String]) -> Option<String> + Send + Sync>;
pub type FstatSlot = Arc<dyn Fn(i32) -> i64 + Send + Sync>;

/// The host's filesystem-primitive table and module resolver hook.
#[derive(Clone)]
pub struct HostSlots {
    pub read_file_text: ReadFileSlot,
    pub read_json_text: ReadJsonSlot,
    pub module_stat: ModuleStatSlot,
    pub find_path: FindPathSlot,
    pub fstat: FstatSlot,
}

impl HostSlots {
    /// The host's own primitives: plain real-filesystem behavior.
    fn native() -> Self {
        Self {
            read_file_text: Arc::new(|path: &str| std::fs::read_to_string(path).unwrap_or_default()),
            read_json_text: Arc::new(|path: &str| std::fs::read_to_string(path).ok()),
            module_stat: Arc::new(|args: &[HostValue]| native_module_stat(args)),
            find_path: Arc::new(|request: &str, paths: &[String]| native_find_path(request, paths)),
            fstat: Arc::new(native_fstat),
        }
    }
}

static SLOTS: RwLock<Option<HostSlots>> = const_rwlock(None);
static PAYLOAD: Mutex<Option<PayloadHeader>> = const_mutex(None);

fn with_slots<T>(f: impl FnOnce(&HostSlots) -> T) -> T {
    {
        let guard = SLOTS.read();
        if let Some(slots) = guard.as_ref() {
            return f(slots);
        }
    }
    let mut guard = SLOTS.write();
    f(guard.get_or_insert_with(HostSlots::native))
}

/// Snapshot of the current table (clones of the live slots).
pub fn slots() -> HostSlots {
    with_slots(HostSlots::clone)
}

/// Replace the whole table, returning what was installed before.
pub(crate) fn swap_slots(new: HostSlots) -> HostSlots {
    let mut guard = SLOTS.write();
    let old = guard.get_or_insert_with(HostSlots::native).clone();
    *guard = Some(new);
    old
}

// ── Call surface ─────────────────────────────────────────────────────────
//
// Slots are cloned out before invocation so a hook can re-enter the table
// without holding the lock.

/// Raw text of a single file, or the empty sentinel when absent.
pub fn read_file_text(path: &str) -> String {
    let slot = with_slots(|s| s.read_file_text.clone());
    slot(path)
}

/// Manifest text, or the absent marker.
pub fn read_json_text(path: &str) -> Option<String> {
    let slot = with_slots(|s| s.read_json_text.clone());
    slot(path)
}

/// Module-loader stat: 1 for a directory, 0 for a file, negated `ENOENT`
/// when absent. Argument cells follow the host's positional conventions.
pub fn module_stat(args: &[HostValue]) -> i64 {
    let slot = with_slots(|s| s.module_stat.clone());
    slot(args)
}

/// The module resolver entry point.
pub fn find_path(request: &str, search_paths: &[String]) -> Option<String> {
    let slot = with_slots(|s| s.find_path.clone());
    slot(request, search_paths)
}

// ── Layout header handoff ────────────────────────────────────────────────

/// Deposit the layout header for bootstrap to pick up. The bundler's stub
/// calls this before handing control to the application.
pub fn deposit_payload(header: PayloadHeader) {
    *PAYLOAD.lock() = Some(header);
}

/// Take the deposited header; it is removed on first read.
pub(crate) fn take_payload() -> Option<PayloadHeader> {
    PAYLOAD.lock().take()
}

// ── Native slot implementations ──────────────────────────────────────────

fn native_module_stat(args: &[HostValue]) -> i64 {
    match StatArg::from_args(args) {
        Some(StatArg::Fd(fd)) => native_fstat(fd),
        Some(StatArg::Path(path)) => match std::fs::metadata(&path) {
            Ok(meta) if meta.is_dir() => 1,
            Ok(_) => 0,
            Err(_) => -ENOENT,
        },
        None => -ENOENT,
    }
}

#[cfg(unix)]
fn native_fstat(fd: i32) -> i64 {
    match sealbox_snapshot::overlay::fstat_fd(fd) {
        Ok(_) => 0,
        Err(_) => -ENOENT,
    }
}

#[cfg(not(unix))]
fn native_fstat(_fd: i32) -> i64 {
    -ENOENT
}

/// The host's own resolver: walk the search paths, probe the request as a
/// file, then as a package directory.
fn native_find_path(request: &str, search_paths: &[String]) -> Option<String> {
    for base in search_paths {
        let candidate = format!("{}/{}", base.trim_end_matches('/'), request);
        if let Some(hit) = resolve::probe_with_extensions(&RealFs, &candidate) {
            return Some(hit);
        }
        if RealFs.is_dir(&candidate) {
            if let Some(hit) = resolve::resolve_package_dir(&RealFs, &candidate, request) {
                return Some(hit);
            }
        }
    }
    None
}
