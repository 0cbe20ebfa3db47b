use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::fetch::{
    ArchiveFetcher, FetchError, FetchedCapture, Fetcher, discard, gunzip, open_sniffed,
};
use super::sources::TraceSource;

/// Fetcher for `http`/`https` sources; everything else goes to
/// [`ArchiveFetcher`].
///
/// The body is streamed into `<target>.download`, then gunzipped into
/// `target` (or renamed there when it is not gzip). Partial files are
/// removed on failure.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    local: ArchiveFetcher,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("tracesift/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            local: ArchiveFetcher,
        }
    }

    async fn download(&self, url: &str, download: &Path) -> Result<u64, FetchError> {
        let http_err = |source| FetchError::Http {
            url: url.to_string(),
            source,
        };
        let write_err = |source| FetchError::Write {
            path: download.to_path_buf(),
            source,
        };

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(http_err)?;
        let mut file = tokio::fs::File::create(download).await.map_err(write_err)?;
        let mut received = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(http_err)? {
            file.write_all(&chunk).await.map_err(write_err)?;
            received += chunk.len() as u64;
        }
        file.flush().await.map_err(write_err)?;
        Ok(received)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        source: &TraceSource,
        target: &Path,
    ) -> Result<FetchedCapture, FetchError> {
        if !is_http(&source.url) {
            return self.local.fetch(source, target).await;
        }

        let download = download_path(target);
        debug!(url = %source.url, path = %download.display(), "downloading capture");
        match self.download(&source.url, &download).await {
            Ok(bytes) => debug!(url = %source.url, bytes, "download complete"),
            Err(err) => {
                discard(&download);
                return Err(err);
            }
        }

        let target = target.to_path_buf();
        tokio::task::spawn_blocking(move || settle(&download, &target))
            .await
            .map_err(|err| FetchError::Download(err.to_string()))?
    }
}

fn is_http(url: &str) -> bool {
    url.split_once("://").is_some_and(|(scheme, _)| {
        scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https")
    })
}

/// `work/trace.pcap` -> `work/trace.pcap.download`
fn download_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(".download");
    PathBuf::from(name)
}

/// Turn a finished download into the capture at `target`.
fn settle(download: &Path, target: &Path) -> Result<FetchedCapture, FetchError> {
    let settled = open_sniffed(download).and_then(|(reader, is_gzip)| {
        if is_gzip {
            gunzip(reader, download, target)
        } else {
            drop(reader);
            fs::rename(download, target).map_err(|source| FetchError::Write {
                path: target.to_path_buf(),
                source,
            })
        }
    });
    discard(download);
    settled.map(|()| FetchedCapture {
        path: target.to_path_buf(),
        owned: true,
    })
}
