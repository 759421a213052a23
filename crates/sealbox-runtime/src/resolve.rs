//! Package entry resolution over the bundled dependency store.
//!
//! Re-implements the subset of the host's package resolution that bundled
//! dependency trees need: conditional `exports`, the `main` field,
//! extension probing, and directory-index fallbacks. Runs over any
//! [`ReadFs`], so the same algorithm serves the virtual tree and a real
//! on-disk one. Resolution is strictly non-throwing: every internal
//! failure, manifest parse errors included, collapses to `None`.

use sealbox_snapshot::overlay::ReadFs;
use sealbox_snapshot::SNAPSHOT_ROOT;
use serde_json::Value;

/// Conditions consulted when resolving a conditional `exports` target, in
/// priority order.
const EXPORT_CONDITIONS: [&str; 3] = ["require", "node", "default"];

/// Extensions probed after an exact-path miss, in order.
const PROBE_EXTENSIONS: [&str; 3] = [".js", ".json", ".node"];

/// True for specifiers resolved through the dependency store: neither
/// relative, absolute, nor drive-lettered.
pub fn is_bare_specifier(request: &str) -> bool {
    if request.is_empty() {
        return false;
    }
    if request.starts_with('.') || request.starts_with('/') || request.starts_with('\\') {
        return false;
    }
    let b = request.as_bytes();
    !(b.len() >= 2 && b[0].is_ascii_alphabetic() && b[1] == b':')
}

/// Resolve a bare specifier against the bundled dependency store under the
/// virtual root.
pub fn resolve_bare<F: ReadFs + ?Sized>(fs: &F, request: &str) -> Option<String> {
    let base = format!("{}/node_modules/{}", SNAPSHOT_ROOT, request);
    resolve_package_dir(fs, &base, request)
}

/// Resolve the entry of the package rooted at `base`.
pub fn resolve_package_dir<F: ReadFs + ?Sized>(fs: &F, base: &str, request: &str) -> Option<String> {
    let manifest_text = fs.read_to_string(&format!("{}/package.json", base)).ok()?;
    let manifest: Value = serde_json::from_str(&manifest_text).ok()?;

    if let Some(exports) = manifest.get("exports") {
        if let Some(hit) = resolve_exports(fs, base, exports) {
            return Some(hit);
        }
    } else {
        let main = manifest.get("main").and_then(Value::as_str).unwrap_or("index.js");
        if let Some(hit) = resolve_main(fs, base, main) {
            return Some(hit);
        }
    }

    // Directory-index fallback, then the dist convention.
    let index = format!("{}/index.js", base);
    if fs.is_file(&index) {
        return Some(index);
    }
    let dist_index = format!("{}/dist/index.js", base);
    if fs.is_file(&dist_index) {
        return Some(dist_index);
    }
    let dist_named = format!("{}/dist/{}.js", base, request);
    if fs.is_file(&dist_named) {
        return Some(dist_named);
    }
    None
}

/// Resolve a conditional `exports` value. A top-level `"."` subpath key is
/// unwrapped before condition matching.
fn resolve_exports<F: ReadFs + ?Sized>(fs: &F, base: &str, exports: &Value) -> Option<String> {
    let target = match exports {
        Value::Object(map) => map.get(".").unwrap_or(exports),
        _ => exports,
    };
    resolve_export_target(fs, base, target)
}

/// Strings are literal subpath targets; objects are condition maps walked
/// in insertion order, committing to the first key in the condition set.
fn resolve_export_target<F: ReadFs + ?Sized>(fs: &F, base: &str, target: &Value) -> Option<String> {
    match target {
        Value::String(subpath) => probe_with_extensions(fs, &join(base, subpath)),
        Value::Object(map) => {
            for (key, value) in map {
                if EXPORT_CONDITIONS.contains(&key.as_str()) {
                    return resolve_export_target(fs, base, value);
                }
            }
            None
        }
        _ => None,
    }
}

/// Resolve the `main` field: strip a leading `./`, map empty and `.` to
/// `index.js`, complete trailing slashes with `index.js`, then probe the
/// joined path as a file, as a directory with an index, and with the
/// fallback extensions.
fn resolve_main<F: ReadFs + ?Sized>(fs: &F, base: &str, main: &str) -> Option<String> {
    let stripped = main.strip_prefix("./").unwrap_or(main);
    let main = if stripped.is_empty() || stripped == "." {
        "index.js".to_string()
    } else if stripped.ends_with('/') {
        format!("{}index.js", stripped)
    } else {
        stripped.to_string()
    };

    let joined = format!("{}/{}", base, main);
    if fs.is_file(&joined) {
        return Some(joined);
    }
    if fs.is_dir(&joined) {
        let index = format!("{}/index.js", joined);
        if fs.is_file(&index) {
            return Some(index);
        }
        return None;
    }
    for ext in PROBE_EXTENSIONS {
        let candidate = format!("{}{}", joined, ext);
        if fs.is_file(&candidate) {
            return Some(candidate);
        }
    }
    None
}

/// Probe `path` as a file, then with each fallback extension appended.
pub(crate) fn probe_with_extensions<F: ReadFs + ?Sized>(fs: &F, path: &str) -> Option<String> {
    if fs.is_file(path) {
        return Some(path.to_string());
    }
    for ext in PROBE_EXTENSIONS {
        let candidate = format!("{}{}", path, ext);
        if fs.is_file(&candidate) {
            return Some(candidate);
        }
    }
    None
}

fn join(base: &str, rel: &str) -> String {
    let rel = rel.strip_prefix("./").unwrap_or(rel);
    format!("{}/{}", base, rel.trim_start_matches('/'))
}
