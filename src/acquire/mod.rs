//! Input acquisition: fetch the source files once and reuse them on later runs

pub mod http;

use crate::utils::{ensure_dir, file_exists, list_dir};
use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub use http::HttpFetcher;

/// Transport that copies a remote resource to a local file
pub trait Fetcher {
    /// Download `url` into `dest`, replacing anything there
    fn fetch(&self, url: &str, dest: &Path) -> Result<()>;
}

/// One remote input file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Download URL
    pub url: String,
    /// Name of the (decompressed) file inside the input directory
    pub file_name: String,
    /// Whether the download is gzip-compressed
    pub compressed: bool,
}

impl SourceFile {
    /// Name the compressed download is stored under before decompression
    pub fn archive_name(&self) -> String {
        format!("{}.gz", self.file_name)
    }
}

/// The two inputs of the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Gene expression matrix (genes x samples)
    pub expression: SourceFile,
    /// Clinical phenotype matrix (samples x attributes)
    pub clinical: SourceFile,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            expression: SourceFile {
                url: "https://tcga.xenahubs.net/download/TCGA.BRCA.sampleMap/HiSeqV2_PANCAN.gz"
                    .to_string(),
                file_name: "HiSeqV2_PANCAN".to_string(),
                compressed: true,
            },
            clinical: SourceFile {
                url: "https://tcga.xenahubs.net/download/TCGA.BRCA.sampleMap/BRCA_clinicalMatrix"
                    .to_string(),
                file_name: "BRCA_clinicalMatrix".to_string(),
                compressed: false,
            },
        }
    }
}

/// Local paths of both inputs once acquired
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputPaths {
    pub expression: PathBuf,
    pub clinical: PathBuf,
}

/// Fetch-or-reuse cache over an input directory
pub struct InputCache {
    dir: PathBuf,
    fetcher: Box<dyn Fetcher>,
    offline: bool,
}

impl InputCache {
    /// Create cache rooted at `dir`
    pub fn new<P: AsRef<Path>>(dir: P, fetcher: Box<dyn Fetcher>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            fetcher,
            offline: false,
        }
    }

    /// Refuse to download; missing inputs become errors
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// Input directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Ensure both inputs exist locally, then log the directory listing
    pub fn ensure_all(&self, sources: &SourceConfig) -> Result<InputPaths> {
        ensure_dir(&self.dir)?;
        info!("Data directory is {:?}", self.dir);

        let paths = InputPaths {
            expression: self.ensure(&sources.expression)?,
            clinical: self.ensure(&sources.clinical)?,
        };

        info!("Input directory contents: {:?}", list_dir(&self.dir)?);
        Ok(paths)
    }

    /// Ensure one input exists locally, downloading (and decompressing) only if absent
    pub fn ensure(&self, source: &SourceFile) -> Result<PathBuf> {
        let target = self.dir.join(&source.file_name);
        if file_exists(&target) {
            debug!("Reusing existing {:?}", target);
            return Ok(target);
        }

        if !source.compressed {
            self.download(source, &target)?;
            return Ok(target);
        }

        let archive = self.dir.join(source.archive_name());
        if file_exists(&archive) {
            debug!("Reusing existing archive {:?}", archive);
        } else {
            self.download(source, &archive)?;
        }

        decompress(&archive, &target)?;
        fs::remove_file(&archive)
            .with_context(|| format!("Failed to remove archive {:?}", archive))?;
        Ok(target)
    }

    fn download(&self, source: &SourceFile, dest: &Path) -> Result<()> {
        if self.offline {
            bail!(
                "Input file {:?} not found and downloads are disabled",
                dest
            );
        }
        info!("Fetching {} into {:?}", source.url, dest);
        self.fetcher
            .fetch(&source.url, dest)
            .with_context(|| format!("Failed to fetch {}", source.url))
    }
}

/// Path used while a file is being written, renamed into place once complete
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

/// Decompress a gzip archive into `target`
pub fn decompress(archive: &Path, target: &Path) -> Result<()> {
    info!("Decompressing {:?}", archive);

    let file = File::open(archive).with_context(|| format!("Failed to open {:?}", archive))?;
    let mut decoder = GzDecoder::new(BufReader::new(file));

    let part = partial_path(target);
    let mut out = BufWriter::new(
        File::create(&part).with_context(|| format!("Failed to create {:?}", part))?,
    );
    let bytes = io::copy(&mut decoder, &mut out)
        .with_context(|| format!("Failed to decompress {:?}", archive))?;
    out.flush()?;
    drop(out);

    fs::rename(&part, target)
        .with_context(|| format!("Failed to move {:?} to {:?}", part, target))?;
    debug!("Decompressed {} bytes into {:?}", bytes, target);
    Ok(())
}
