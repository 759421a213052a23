//! Module resolution through the installed hook: bare specifiers against
//! the bundled dependency store, original-resolver precedence, and
//! equivalence with resolution over a real on-disk tree.

use std::io::{Cursor, Write};
use std::sync::{Mutex, MutexGuard};

use sealbox_runtime::host;
use sealbox_runtime::{InstallGuard, PayloadHeader};
use zip::write::SimpleFileOptions;

static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|e| e.into_inner())
}

fn seal(files: &[(&str, &str)]) -> (tempfile::TempDir, PayloadHeader) {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, data) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data.as_bytes()).unwrap();
    }
    let blob = writer.finish().unwrap().into_inner();

    let dir = tempfile::tempdir().unwrap();
    let exe = dir.path().join("tool");
    std::fs::write(&exe, &blob).unwrap();

    let header = PayloadHeader {
        blob_path: exe,
        resource_start: 0,
        resource_size: blob.len() as u64,
        content_start: 0,
        content_size: 0,
    };
    (dir, header)
}

#[test]
fn test_bare_specifier_via_exports() {
    let _guard = serial();
    let (_dir, header) = seal(&[
        (
            "node_modules/left-pad/package.json",
            r#"{"exports":{".":{"require":"./cjs/index.js","default":"./esm/index.js"}}}"#,
        ),
        ("node_modules/left-pad/cjs/index.js", "module.exports = pad;"),
    ]);
    let _install = InstallGuard::acquire(header).unwrap();

    assert_eq!(
        host::find_path("left-pad", &[]).as_deref(),
        Some("/snapshot/node_modules/left-pad/cjs/index.js")
    );
}

#[test]
fn test_bare_specifier_via_main_with_probing() {
    let _guard = serial();
    let (_dir, header) = seal(&[
        ("node_modules/axios/package.json", r#"{"main":"./lib/axios"}"#),
        ("node_modules/axios/lib/axios.js", "module.exports = axios;"),
    ]);
    let _install = InstallGuard::acquire(header).unwrap();

    assert_eq!(
        host::find_path("axios", &[]).as_deref(),
        Some("/snapshot/node_modules/axios/lib/axios.js")
    );
}

#[test]
fn test_bare_specifier_dist_fallback() {
    let _guard = serial();
    let (_dir, header) = seal(&[
        ("node_modules/widget/package.json", "{}"),
        ("node_modules/widget/dist/index.js", "module.exports = 1;"),
    ]);
    let _install = InstallGuard::acquire(header).unwrap();

    assert_eq!(
        host::find_path("widget", &[]).as_deref(),
        Some("/snapshot/node_modules/widget/dist/index.js")
    );
}

#[test]
fn test_original_resolver_runs_first() {
    let _guard = serial();
    let (_dir, header) = seal(&[
        ("node_modules/dual/package.json", r#"{"main":"./archived.js"}"#),
        ("node_modules/dual/archived.js", "archive copy"),
    ]);

    // The same package also exists on the real disk.
    let disk = tempfile::tempdir().unwrap();
    let pkg = disk.path().join("node_modules/dual");
    std::fs::create_dir_all(&pkg).unwrap();
    std::fs::write(pkg.join("package.json"), r#"{"main":"./on-disk.js"}"#).unwrap();
    std::fs::write(pkg.join("on-disk.js"), "disk copy").unwrap();

    let _install = InstallGuard::acquire(header).unwrap();
    let search = vec![format!("{}/node_modules", disk.path().display())];

    let found = host::find_path("dual", &search).unwrap();
    assert!(found.ends_with("on-disk.js"), "expected the disk hit, got {}", found);
}

#[test]
fn test_relative_requests_never_consult_the_store() {
    let _guard = serial();
    let (_dir, header) = seal(&[
        ("node_modules/local/package.json", "{}"),
        ("node_modules/local/index.js", "x"),
    ]);
    let _install = InstallGuard::acquire(header).unwrap();

    assert!(host::find_path("./local", &[]).is_none());
    assert!(host::find_path("/local", &[]).is_none());
}

#[test]
fn test_resolver_miss_is_falsy_not_an_error() {
    let _guard = serial();
    let (_dir, header) = seal(&[("node_modules/broken/package.json", "{oops")]);
    let _install = InstallGuard::acquire(header).unwrap();

    assert!(host::find_path("broken", &[]).is_none());
    assert!(host::find_path("never-bundled", &[]).is_none());
}

#[test]
fn test_archive_and_disk_resolution_agree() {
    let _guard = serial();

    let manifest = r#"{"exports":{".":{"require":"./cjs/entry.js","default":"./esm/entry.js"}}}"#;
    let (_dir, header) = seal(&[
        ("node_modules/demo/package.json", manifest),
        ("node_modules/demo/cjs/entry.js", "cjs"),
    ]);

    // The same tree written to the real disk, resolved by the host's own
    // resolver (the original slot, pre-interception).
    let disk = tempfile::tempdir().unwrap();
    let pkg = disk.path().join("node_modules/demo");
    std::fs::create_dir_all(pkg.join("cjs")).unwrap();
    std::fs::write(pkg.join("package.json"), manifest).unwrap();
    std::fs::write(pkg.join("cjs/entry.js"), "cjs").unwrap();

    let store = format!("{}/node_modules", disk.path().display());
    let on_disk = host::find_path("demo", &[store.clone()]).unwrap();

    let _install = InstallGuard::acquire(header).unwrap();
    let in_archive = host::find_path("demo", &[]).unwrap();

    let disk_rel = on_disk.strip_prefix(&store).unwrap();
    let archive_rel = in_archive.strip_prefix("/snapshot/node_modules").unwrap();
    assert_eq!(disk_rel, archive_rel);
    assert_eq!(archive_rel, "/demo/cjs/entry.js");
}
