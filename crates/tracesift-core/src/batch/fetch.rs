use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use flate2::read::MultiGzDecoder;
use thiserror::Error;
use tracing::{debug, warn};

use super::sources::TraceSource;
use crate::FailureCategory;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("unsupported URL scheme `{scheme}`")]
    UnsupportedScheme { scheme: String },
    #[error("cannot build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("cannot download {url}: {source}")]
    Http { url: String, source: reqwest::Error },
    #[error("cannot read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("cannot write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("cannot decompress {}: {source}", .path.display())]
    Decompress { path: PathBuf, source: io::Error },
    #[error("download failed: {0}")]
    Download(String),
}

impl FetchError {
    pub fn category(&self) -> FailureCategory {
        match self {
            FetchError::Decompress { .. } => FailureCategory::Decompress,
            _ => FailureCategory::Download,
        }
    }
}

/// A raw capture file ready to be opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedCapture {
    pub path: PathBuf,
    /// The file was created by the fetcher and may be deleted after use.
    pub owned: bool,
}

/// Produces a local, uncompressed capture for a source.
///
/// `target` is the path reserved for this source inside the work directory;
/// implementations either write there or return an existing file.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, source: &TraceSource, target: &Path)
    -> Result<FetchedCapture, FetchError>;
}

/// Fetcher for local archives: plain paths and `file://` URLs.
///
/// See [`HttpFetcher`](super::HttpFetcher) for `http`/`https` sources.
///
/// Gzip input (detected by magic bytes) is decompressed into `target`;
/// uncompressed captures are used in place.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveFetcher;

#[async_trait]
impl Fetcher for ArchiveFetcher {
    async fn fetch(
        &self,
        source: &TraceSource,
        target: &Path,
    ) -> Result<FetchedCapture, FetchError> {
        let path = local_path(&source.url)?;
        let target = target.to_path_buf();
        tokio::task::spawn_blocking(move || materialize(&path, &target))
            .await
            .map_err(|err| FetchError::Download(err.to_string()))?
    }
}

/// Map a source URL to a local path.
///
/// ```text
/// file:///data/a.pcap.gz -> /data/a.pcap.gz
/// traces/b.pcap          -> traces/b.pcap
/// https://host/c.pcap    -> UnsupportedScheme
/// ```
fn local_path(url: &str) -> Result<PathBuf, FetchError> {
    if let Some(path) = url.strip_prefix("file://") {
        return Ok(PathBuf::from(path));
    }
    if let Some((scheme, _)) = url.split_once("://") {
        return Err(FetchError::UnsupportedScheme {
            scheme: scheme.to_ascii_lowercase(),
        });
    }
    Ok(PathBuf::from(url))
}

fn materialize(path: &Path, target: &Path) -> Result<FetchedCapture, FetchError> {
    let (reader, is_gzip) = open_sniffed(path)?;
    if !is_gzip {
        debug!(path = %path.display(), "using uncompressed capture in place");
        return Ok(FetchedCapture {
            path: path.to_path_buf(),
            owned: false,
        });
    }

    gunzip(reader, path, target)?;
    Ok(FetchedCapture {
        path: target.to_path_buf(),
        owned: true,
    })
}

/// Open `path` and report whether it starts with the gzip magic.
pub(super) fn open_sniffed(path: &Path) -> Result<(BufReader<File>, bool), FetchError> {
    let read_err = |source| FetchError::Read {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = BufReader::new(File::open(path).map_err(read_err)?);
    let is_gzip = reader.fill_buf().map_err(read_err)?.starts_with(&GZIP_MAGIC);
    Ok((reader, is_gzip))
}

/// Decompress a gzip stream read from `path` into `target`.
///
/// On failure `target` is removed.
pub(super) fn gunzip(
    reader: BufReader<File>,
    path: &Path,
    target: &Path,
) -> Result<(), FetchError> {
    debug!(path = %path.display(), target = %target.display(), "decompressing capture");
    let write_err = |source| FetchError::Write {
        path: target.to_path_buf(),
        source,
    };
    let mut output = BufWriter::new(File::create(target).map_err(write_err)?);
    let copied = io::copy(&mut MultiGzDecoder::new(reader), &mut output)
        .map_err(|source| FetchError::Decompress {
            path: path.to_path_buf(),
            source,
        })
        .and_then(|_| output.flush().map_err(write_err));
    if let Err(err) = copied {
        drop(output);
        discard(target);
        return Err(err);
    }
    Ok(())
}

/// Best-effort removal of a file this fetcher created.
pub(super) fn discard(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed partial file"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), error = %err, "cannot remove partial file"),
    }
}
