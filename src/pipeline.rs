use crate::{
    config::Config,
    engine::Engine,
    normalize,
    report::{JobReport, PageReport},
    util::rfc3339,
};
use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::time::Instant;
use time::OffsetDateTime;
use tracing::{debug, info};

pub struct Pipeline<E: Engine> {
    cfg: Config,
    engine: E,
}

impl<E: Engine> Pipeline<E> {
    pub fn new(cfg: &Config, engine: E) -> Self {
        Self {
            cfg: cfg.clone(),
            engine,
        }
    }

    /// One invocation: render, OCR every page in order, normalize.
    pub fn run_job(&self) -> Result<JobReport> {
        let started_at = OffsetDateTime::now_utc();
        let started = Instant::now();

        let input = PathBuf::from(&self.cfg.job.pdf_path);
        let (first_page, last_page) = (self.cfg.job.first_page, self.cfg.job.last_page);
        validate_job(&input, first_page, last_page)?;

        let tmpdir = tempfile::TempDir::with_prefix("scheduled-ocr-pages")
            .with_context(|| "create page image tempdir")?;
        debug!("page images in {}", tmpdir.path().display());

        let images = self
            .engine
            .render_pages(&input, first_page, last_page, tmpdir.path())?;

        let mut raw = String::new();
        let mut pages = Vec::with_capacity(images.len());
        for image in &images {
            let page_started = Instant::now();
            let text = self.engine.recognize(image)?;
            let chars = text.chars().count();
            debug!("page {} chars={}", image.page, chars);

            pages.push(PageReport {
                page: image.page,
                chars,
                ocr_ms: page_started.elapsed().as_millis() as u64,
            });
            raw.push_str(&text);
        }
        drop(tmpdir);

        let text = normalize::normalize(&self.cfg, &raw);

        let finished_at = OffsetDateTime::now_utc();
        let elapsed = started.elapsed();
        info!(
            "job done pages={} chars={} elapsed={:.3}s",
            pages.len(),
            text.chars().count(),
            elapsed.as_secs_f64()
        );

        Ok(JobReport {
            input: input.display().to_string(),
            first_page,
            last_page,
            started: rfc3339(started_at),
            finished: rfc3339(finished_at),
            duration_seconds: elapsed.as_secs_f64(),
            pages,
            text,
        })
    }
}

fn validate_job(input: &Path, first_page: u32, last_page: u32) -> Result<()> {
    if first_page == 0 {
        return Err(anyhow!("job.first_page is 1-based; got 0"));
    }
    if last_page < first_page {
        return Err(anyhow!(
            "job.last_page ({last_page}) is before job.first_page ({first_page})"
        ));
    }
    if !input.exists() {
        return Err(anyhow!("input does not exist: {}", input.display()));
    }
    Ok(())
}
