//! Engine backed by the poppler `pdftoppm` and `tesseract` command-line tools.

use super::{Engine, types::*};
use crate::config::Config;
use anyhow::{Context, Result, anyhow, bail};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// File stem passed to `pdftoppm`; it appends `-<page>.png`.
const PAGE_PREFIX: &str = "page";

pub struct ExternalEngine {
    cfg: Config,
    pdftoppm_exe: PathBuf,
    tesseract_exe: PathBuf,
}

impl ExternalEngine {
    pub fn new(cfg: &Config) -> Self {
        Self {
            cfg: cfg.clone(),
            pdftoppm_exe: resolve_exe(&cfg.render.pdftoppm_exe, "SCHEDULED_OCR_PDFTOPPM", "pdftoppm"),
            tesseract_exe: resolve_exe(&cfg.ocr.tesseract_exe, "SCHEDULED_OCR_TESSERACT", "tesseract"),
        }
    }

    fn run(&self, name: &str, mut cmd: Command, timeout_seconds: u64) -> Result<Output> {
        debug!(?cmd, timeout_seconds, "spawning {name}");
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning {name}"))?;

        let output = if timeout_seconds > 0 {
            wait_with_timeout(name, &mut child, Duration::from_secs(timeout_seconds))?
        } else {
            child
                .wait_with_output()
                .with_context(|| format!("waiting for {name}"))?
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("{name} failed ({}):\n{}", output.status, stderr.trim()));
        }

        if !output.stderr.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("{name} stderr: {}", stderr.trim());
        }

        Ok(output)
    }

    fn tool_diag(&self, exe: &Path, version_arg: &str) -> ToolDiag {
        let exe_str = exe.display().to_string();
        match Command::new(exe).arg(version_arg).output() {
            Ok(out) => {
                // pdftoppm prints its version on stderr, tesseract on stdout.
                let version = String::from_utf8_lossy(&out.stdout)
                    .lines()
                    .chain(String::from_utf8_lossy(&out.stderr).lines())
                    .map(str::trim)
                    .find(|l| !l.is_empty())
                    .map(str::to_string);
                let error = if out.status.success() {
                    None
                } else {
                    let stderr = String::from_utf8_lossy(&out.stderr);
                    Some(format!("{} exited with {}: {}", exe_str, out.status, stderr.trim()))
                };
                ToolDiag {
                    exe: exe_str,
                    ok: out.status.success(),
                    version,
                    error,
                }
            }
            Err(err) => ToolDiag {
                exe: exe_str,
                ok: false,
                version: None,
                error: Some(err.to_string()),
            },
        }
    }

    fn installed_langs(&self) -> Result<Vec<String>> {
        let mut cmd = Command::new(&self.tesseract_exe);
        cmd.arg("--list-langs");
        let out = self.run("tesseract", cmd, self.cfg.ocr.timeout_seconds)?;
        Ok(parse_lang_list(&String::from_utf8_lossy(&out.stdout)))
    }
}

impl Engine for ExternalEngine {
    fn doctor(&self) -> Result<EngineDiag> {
        let pdftoppm = self.tool_diag(&self.pdftoppm_exe, "-v");
        let tesseract = self.tool_diag(&self.tesseract_exe, "--version");

        let lang_installed = if tesseract.ok {
            match self.installed_langs() {
                Ok(langs) => self
                    .cfg
                    .ocr
                    .lang
                    .split('+')
                    .all(|l| langs.iter().any(|have| have == l)),
                Err(err) => {
                    warn!("listing tesseract languages failed: {err:#}");
                    false
                }
            }
        } else {
            false
        };

        Ok(EngineDiag {
            ok: pdftoppm.ok && tesseract.ok && lang_installed,
            pdftoppm,
            tesseract,
            lang: self.cfg.ocr.lang.clone(),
            lang_installed,
        })
    }

    fn render_pages(
        &self,
        input: &Path,
        first_page: u32,
        last_page: u32,
        out_dir: &Path,
    ) -> Result<Vec<PageImage>> {
        info!(
            "converting {} pages {}-{} to png",
            input.display(),
            first_page,
            last_page
        );

        let mut cmd = Command::new(&self.pdftoppm_exe);
        cmd.arg("-png")
            .arg("-r")
            .arg(self.cfg.render.dpi.to_string())
            .arg("-f")
            .arg(first_page.to_string())
            .arg("-l")
            .arg(last_page.to_string())
            .arg(input)
            .arg(out_dir.join(PAGE_PREFIX));
        self.run("pdftoppm", cmd, self.cfg.render.timeout_seconds)
            .with_context(|| format!("rendering {}", input.display()))?;

        let mut images = Vec::new();
        for entry in std::fs::read_dir(out_dir)
            .with_context(|| format!("read_dir {}", out_dir.display()))?
        {
            let entry = entry.with_context(|| format!("read_dir entry in {}", out_dir.display()))?;
            let name = entry.file_name();
            match page_number_from_file_name(&name.to_string_lossy(), PAGE_PREFIX) {
                Some(page) => images.push(PageImage {
                    page,
                    path: entry.path(),
                }),
                None => debug!("ignoring unexpected file {}", entry.path().display()),
            }
        }
        images.sort_by_key(|img| img.page);

        if images.is_empty() {
            bail!("pdftoppm produced no images for {}", input.display());
        }

        info!("converted {} png images", images.len());
        Ok(images)
    }

    fn recognize(&self, image: &PageImage) -> Result<String> {
        info!("extracting characters from page {}", image.page);

        let mut cmd = Command::new(&self.tesseract_exe);
        cmd.arg(&image.path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.cfg.ocr.lang);
        if let Some(psm) = self.cfg.ocr.psm {
            cmd.arg("--psm").arg(psm.to_string());
        }
        cmd.args(&self.cfg.ocr.extra_args);
        for (k, v) in &self.cfg.ocr.env {
            cmd.env(k, v);
        }

        let out = self
            .run("tesseract", cmd, self.cfg.ocr.timeout_seconds)
            .with_context(|| format!("OCR failed for page {}", image.page))?;
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }
}

/// Parse the page number out of a `pdftoppm` output name such as
/// `page-1.png` or `page-007.png`.
pub fn page_number_from_file_name(name: &str, prefix: &str) -> Option<u32> {
    name.strip_prefix(prefix)?
        .strip_prefix('-')?
        .strip_suffix(".png")?
        .parse()
        .ok()
}

/// Parse `tesseract --list-langs` output, skipping its header line.
pub fn parse_lang_list(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("List of available languages"))
        .map(str::to_string)
        .collect()
}

fn resolve_exe(raw: &str, env_key: &str, default: &str) -> PathBuf {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("auto") {
        if let Ok(env_val) = std::env::var(env_key) {
            return expand_tilde(&env_val);
        }
        return PathBuf::from(default);
    }
    expand_tilde(raw)
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

fn wait_with_timeout(name: &str, child: &mut Child, timeout: Duration) -> Result<Output> {
    // Drain pipes while waiting so a chatty child can't block on a full buffer.
    let stdout_reader = child.stdout.take();
    let stderr_reader = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout_reader {
            out.read_to_end(&mut buf).with_context(|| "read stdout")?;
        }
        Ok(buf)
    });

    let stderr_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr_reader {
            err.read_to_end(&mut buf).with_context(|| "read stderr")?;
        }
        Ok(buf)
    });

    let start = Instant::now();
    let (status, timed_out) = loop {
        if let Some(status) = child.try_wait().with_context(|| "try_wait")? {
            break (status, false);
        }
        if start.elapsed() > timeout {
            warn!("{name} timed out after {:?}", timeout);
            let _ = child.kill();
            let status = child.wait().with_context(|| "wait after kill")?;
            break (status, true);
        }
        std::thread::sleep(Duration::from_millis(50));
    };

    let stdout = stdout_thread
        .join()
        .map_err(|_| anyhow!("stdout reader thread panicked"))??;
    let stderr = stderr_thread
        .join()
        .map_err(|_| anyhow!("stderr reader thread panicked"))??;

    if timed_out {
        return Err(anyhow!(
            "{name} exceeded timeout ({:?}); stderr: {}",
            timeout,
            String::from_utf8_lossy(&stderr)
        ));
    }

    Ok(Output {
        status,
        stdout,
        stderr,
    })
}
