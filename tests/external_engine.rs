//! `ExternalEngine` against stand-in `pdftoppm`/`tesseract` shell scripts.
#![cfg(unix)]

use scheduled_ocr::{
    config::Config,
    engine::{Engine, PageImage, external::ExternalEngine},
};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn engine(pdftoppm: &Path, tesseract: &Path, tweak: impl FnOnce(&mut Config)) -> ExternalEngine {
    let mut cfg = Config::default();
    cfg.render.pdftoppm_exe = pdftoppm.display().to_string();
    cfg.ocr.tesseract_exe = tesseract.display().to_string();
    tweak(&mut cfg);
    ExternalEngine::new(&cfg)
}

/// pdftoppm's output prefix is its last argument.
const LAST_ARG: &str = "for a; do last=$a; done";

#[test]
fn render_sorts_pages_numerically() {
    let bin = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let pdftoppm = script(
        bin.path(),
        "pdftoppm",
        &format!("{LAST_ARG}\ntouch \"$last-10.png\" \"$last-9.png\" \"$last-1.png\" \"$last.txt\""),
    );
    let e = engine(&pdftoppm, Path::new("tesseract"), |_| {});

    let images = e.render_pages(Path::new("in.pdf"), 1, 10, out.path()).unwrap();
    assert_eq!(images.iter().map(|i| i.page).collect::<Vec<_>>(), vec![1, 9, 10]);
    assert!(images.iter().all(|i| i.path.starts_with(out.path())));
}

#[test]
fn render_passes_dpi_and_page_range() {
    let bin = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let pdftoppm = script(
        bin.path(),
        "pdftoppm",
        &format!("{LAST_ARG}\necho \"$*\" > \"$last-1.png\""),
    );
    let e = engine(&pdftoppm, Path::new("tesseract"), |cfg| cfg.render.dpi = 300);

    let images = e.render_pages(Path::new("in.pdf"), 3, 4, out.path()).unwrap();
    let args = std::fs::read_to_string(&images[0].path).unwrap();
    assert!(args.starts_with("-png -r 300 -f 3 -l 4 in.pdf "), "{args}");
}

#[test]
fn render_without_images_fails() {
    let bin = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let pdftoppm = script(bin.path(), "pdftoppm", "exit 0");
    let e = engine(&pdftoppm, Path::new("tesseract"), |_| {});

    let err = e.render_pages(Path::new("in.pdf"), 1, 2, out.path()).unwrap_err();
    assert!(format!("{err:#}").contains("pdftoppm produced no images"));
}

#[test]
fn render_failure_carries_stderr() {
    let bin = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let pdftoppm = script(
        bin.path(),
        "pdftoppm",
        "echo 'Syntax Error: Couldn'\"'\"'t find trailer dictionary' >&2\nexit 1",
    );
    let e = engine(&pdftoppm, Path::new("tesseract"), |_| {});

    let err = format!("{:#}", e.render_pages(Path::new("in.pdf"), 1, 2, out.path()).unwrap_err());
    assert!(err.contains("rendering in.pdf"), "{err}");
    assert!(err.contains("find trailer dictionary"), "{err}");
}

#[test]
fn render_timeout_kills_child() {
    let bin = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let pdftoppm = script(bin.path(), "pdftoppm", "exec sleep 30");
    let e = engine(&pdftoppm, Path::new("tesseract"), |cfg| cfg.render.timeout_seconds = 1);

    let started = Instant::now();
    let err = e.render_pages(Path::new("in.pdf"), 1, 2, out.path()).unwrap_err();
    assert!(format!("{err:#}").contains("exceeded timeout"));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn recognize_forwards_lang_psm_args_and_env() {
    let bin = TempDir::new().unwrap();
    let tesseract = script(bin.path(), "tesseract", "echo \"$*\"\necho \"prefix=$TESSDATA_PREFIX\"");
    let e = engine(Path::new("pdftoppm"), &tesseract, |cfg| {
        cfg.ocr.psm = Some(6);
        cfg.ocr.extra_args = vec!["-c".into(), "preserve_interword_spaces=1".into()];
        cfg.ocr.env.insert("TESSDATA_PREFIX".into(), "/opt/tessdata".into());
    });

    let text = e
        .recognize(&PageImage {
            page: 1,
            path: PathBuf::from("page-1.png"),
        })
        .unwrap();
    assert_eq!(
        text,
        "page-1.png stdout -l jpn --psm 6 -c preserve_interword_spaces=1\nprefix=/opt/tessdata\n"
    );
}

#[test]
fn recognize_failure_names_the_page() {
    let bin = TempDir::new().unwrap();
    let tesseract = script(bin.path(), "tesseract", "echo 'Failed loading language jpn' >&2\nexit 1");
    let e = engine(Path::new("pdftoppm"), &tesseract, |_| {});

    let err = format!(
        "{:#}",
        e.recognize(&PageImage {
            page: 2,
            path: PathBuf::from("page-2.png"),
        })
        .unwrap_err()
    );
    assert!(err.contains("OCR failed for page 2"), "{err}");
    assert!(err.contains("Failed loading language jpn"), "{err}");
}

#[test]
fn doctor_flags_tool_that_exits_nonzero() {
    let bin = TempDir::new().unwrap();
    let pdftoppm = script(bin.path(), "pdftoppm", "echo 'broken install' >&2\nexit 3");
    let tesseract = script(
        bin.path(),
        "tesseract",
        "case \"$1\" in\n--list-langs) printf 'List of available languages in \"/x\" (2):\\neng\\njpn\\n' ;;\n*) echo 'tesseract 5.3.0' ;;\nesac",
    );
    let e = engine(&pdftoppm, &tesseract, |_| {});

    let diag = e.doctor().unwrap();
    assert!(!diag.pdftoppm.ok);
    assert!(diag.pdftoppm.error.as_deref().unwrap_or("").contains("broken install"));
    assert!(diag.tesseract.ok);
    assert_eq!(diag.tesseract.version.as_deref(), Some("tesseract 5.3.0"));
    assert!(diag.lang_installed);
    assert!(!diag.ok);
}

#[test]
fn doctor_reports_missing_lang() {
    let bin = TempDir::new().unwrap();
    let pdftoppm = script(bin.path(), "pdftoppm", "echo 'pdftoppm version 24.02.0' >&2");
    let tesseract = script(
        bin.path(),
        "tesseract",
        "case \"$1\" in\n--list-langs) printf 'List of available languages in \"/x\" (1):\\neng\\n' ;;\n*) echo 'tesseract 5.3.0' ;;\nesac",
    );
    let e = engine(&pdftoppm, &tesseract, |_| {});

    let diag = e.doctor().unwrap();
    assert!(diag.pdftoppm.ok);
    assert_eq!(diag.pdftoppm.version.as_deref(), Some("pdftoppm version 24.02.0"));
    assert!(!diag.lang_installed);
    assert!(!diag.ok);
}
