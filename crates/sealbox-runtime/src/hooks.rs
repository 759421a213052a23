//! Hook implementations installed into the host table.
//!
//! Each hook translates the incoming host path into virtual form, delegates
//! to the overlay, and folds snapshot errors into the return convention the
//! host expects: empty text for reads, the absent marker for JSON reads,
//! negated `ENOENT` for stats, falsy for resolution. Hooks never raise.

use std::sync::Arc;

use sealbox_snapshot::overlay::{OverlayFs, ReadFs};
use sealbox_snapshot::PathNormalizer;

use crate::host::{FindPathSlot, FstatSlot, HostSlots, HostValue, StatArg, ENOENT};
use crate::resolve;
use crate::trace::Trace;

/// State captured by every installed hook closure.
pub(crate) struct HookState {
    pub(crate) overlay: OverlayFs,
    pub(crate) normalizer: PathNormalizer,
    pub(crate) trace: Trace,
}

/// Build the replacement slot table from the mounted overlay and the
/// original slots being displaced. The fstat slot is carried over: the stat
/// hook delegates descriptor stats to it.
pub(crate) fn build_slots(state: Arc<HookState>, originals: &HostSlots) -> HostSlots {
    HostSlots {
        read_file_text: {
            let st = Arc::clone(&state);
            Arc::new(move |path: &str| read_file_text(&st, path))
        },
        read_json_text: {
            let st = Arc::clone(&state);
            Arc::new(move |path: &str| read_json_text(&st, path))
        },
        module_stat: {
            let st = Arc::clone(&state);
            let fstat = originals.fstat.clone();
            Arc::new(move |args: &[HostValue]| module_stat(&st, &fstat, args))
        },
        find_path: {
            let st = Arc::clone(&state);
            let original = originals.find_path.clone();
            Arc::new(move |request: &str, paths: &[String]| find_path(&st, &original, request, paths))
        },
        fstat: originals.fstat.clone(),
    }
}

fn read_file_text(state: &HookState, path: &str) -> String {
    let virtual_path = state.normalizer.to_virtual(path);
    state.trace.record("read-file", path, &virtual_path);
    state.overlay.read_to_string(&virtual_path).unwrap_or_default()
}

/// JSON reads report absence instead of emptiness: the host takes the
/// missing-manifest branch for both an absent and an empty manifest, while
/// plain reads keep the empty-string sentinel.
fn read_json_text(state: &HookState, path: &str) -> Option<String> {
    let virtual_path = state.normalizer.to_virtual(path);
    state.trace.record("read-json", path, &virtual_path);
    match state.overlay.read_to_string(&virtual_path) {
        Ok(text) if text.is_empty() => None,
        Ok(text) => Some(text),
        Err(_) => None,
    }
}

fn module_stat(state: &HookState, original_fstat: &FstatSlot, args: &[HostValue]) -> i64 {
    match StatArg::from_args(args) {
        Some(StatArg::Fd(fd)) => {
            state.trace.record("stat", &format!("fd {}", fd), "-");
            if original_fstat(fd) == 0 {
                0
            } else {
                -ENOENT
            }
        }
        Some(StatArg::Path(path)) => {
            let virtual_path = state.normalizer.to_virtual(&path);
            state.trace.record("stat", &path, &virtual_path);
            match state.overlay.stat(&virtual_path) {
                Ok(stat) if stat.is_dir() => 1,
                Ok(_) => 0,
                Err(_) => -ENOENT,
            }
        }
        None => -ENOENT,
    }
}

/// Wrap the host resolver: the original runs first, and only bare
/// specifiers it misses are resolved from the bundled dependency store.
fn find_path(
    state: &HookState,
    original: &FindPathSlot,
    request: &str,
    search_paths: &[String],
) -> Option<String> {
    if let Some(found) = original(request, search_paths) {
        return Some(found);
    }
    if !resolve::is_bare_specifier(request) {
        return None;
    }
    let resolved = resolve::resolve_bare(&state.overlay, request);
    state
        .trace
        .record("find-path", request, resolved.as_deref().unwrap_or("-"));
    resolved
}
