use crate::acquire::{partial_path, Fetcher};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Blocking HTTP(S) downloader.
///
/// No retries and no overall timeout: a stalled transfer blocks until the
/// connection drops. The body is streamed to `<dest>.part` and renamed on success.
pub struct HttpFetcher {
    client: Client,
    show_progress: bool,
}

impl HttpFetcher {
    /// Create fetcher with a progress bar on stderr
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(Option::<Duration>::None)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            show_progress: true,
        })
    }

    /// Toggle the download progress bar
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    fn progress_bar(&self, len: Option<u64>) -> Result<ProgressBar> {
        let len = match len {
            Some(len) if self.show_progress => len,
            _ => return Ok(ProgressBar::hidden()),
        };
        let style = ProgressStyle::with_template(
            "{spinner} [{elapsed_precise}] [{bar:40}] {bytes}/{total_bytes} ({bytes_per_sec})",
        )?
        .progress_chars("=> ");
        Ok(ProgressBar::new(len).with_style(style))
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        let mut response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("Request to {} failed", url))?
            .error_for_status()
            .with_context(|| format!("Server rejected request to {}", url))?;

        let pb = self.progress_bar(response.content_length())?;
        let part = partial_path(dest);
        let mut out = BufWriter::new(
            File::create(&part).with_context(|| format!("Failed to create {:?}", part))?,
        );

        let bytes = io::copy(&mut pb.wrap_read(&mut response), &mut out)
            .with_context(|| format!("Failed to download {}", url))?;
        out.flush()?;
        drop(out);
        pb.finish_and_clear();

        fs::rename(&part, dest)
            .with_context(|| format!("Failed to move {:?} to {:?}", part, dest))?;
        info!("Downloaded {} bytes to {:?}", bytes, dest);
        Ok(())
    }
}
