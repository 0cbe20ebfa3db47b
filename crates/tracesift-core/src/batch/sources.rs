use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One remote (or local) capture archive to process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceSource {
    pub url: String,
    /// Record count announced by the listing; advisory only.
    #[serde(default)]
    pub expected_records: u64,
}

impl TraceSource {
    pub fn new(url: impl Into<String>, expected_records: u64) -> Self {
        Self {
            url: url.into(),
            expected_records,
        }
    }
}

#[derive(Debug, Error)]
pub enum SourcesError {
    #[error("cannot open link list {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid link list: {0}")]
    Csv(#[from] csv::Error),
    #[error("link list line {line}: empty url")]
    EmptyUrl { line: u64 },
}

/// Row layout written by the link scraper: `url,total[,ip,tcp,udp]`.
#[derive(Debug, Deserialize)]
struct LinkRow {
    url: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    total: Option<u64>,
}

pub fn load_sources(path: &Path) -> Result<Vec<TraceSource>, SourcesError> {
    let file = File::open(path).map_err(|source| SourcesError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_sources(file)
}

/// Parse a link list in file order. `#` lines are comments; a missing or
/// non-numeric `total` becomes 0.
pub fn parse_sources<R: Read>(mut reader: R) -> Result<Vec<TraceSource>, SourcesError> {
    let mut text = String::new();
    reader.read_to_string(&mut text).map_err(csv::Error::from)?;
    let mut reader = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let mut sources = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: LinkRow = record.deserialize(Some(&headers))?;
        if row.url.is_empty() {
            let line = record.position().map_or(0, |pos| record_line(&text, pos));
            return Err(SourcesError::EmptyUrl { line });
        }
        sources.push(TraceSource::new(row.url, row.total.unwrap_or(0)));
    }
    Ok(sources)
}

/// Line of a record in `text`.
///
/// The reader stamps a record with the position where its scan began, which
/// is before any comment or empty lines it skipped on the way.
fn record_line(text: &str, pos: &csv::Position) -> u64 {
    let skipped = text
        .get(pos.byte() as usize..)
        .unwrap_or("")
        .split_inclusive('\n')
        .take_while(|line| {
            line.starts_with('#') || line.trim_end_matches(['\r', '\n']).is_empty()
        })
        .count();
    pos.line() + skipped as u64
}

#[cfg(test)]
mod tests {
    use super::{SourcesError, TraceSource, parse_sources};

    #[test]
    fn parses_scraper_output() {
        let text = "url,total,ip,tcp,udp\n\
                    # scraped 2016-01-21\n\
                    https://example.org/a.pcap.gz,1200,1100,900,200\n\
                    https://example.org/b.pcap.gz,,,,\n";
        let sources = parse_sources(text.as_bytes()).unwrap();
        assert_eq!(
            sources,
            vec![
                TraceSource::new("https://example.org/a.pcap.gz", 1200),
                TraceSource::new("https://example.org/b.pcap.gz", 0),
            ]
        );
    }

    #[test]
    fn total_column_is_optional() {
        let sources = parse_sources("url\n/data/x.pcap\n".as_bytes()).unwrap();
        assert_eq!(sources, vec![TraceSource::new("/data/x.pcap", 0)]);
    }

    #[test]
    fn missing_url_column_is_an_error() {
        assert!(parse_sources("total\n5\n".as_bytes()).is_err());
    }

    #[test]
    fn empty_url_reports_file_line() {
        let text = "url,total\n\
                    # scraped 2016-01-21\n\
                    # samplepoint-F\n\
                    https://example.org/a.pcap.gz,10\n\
                    ,5\n";
        let err = parse_sources(text.as_bytes()).unwrap_err();
        assert!(matches!(err, SourcesError::EmptyUrl { line: 5 }), "{err}");
    }

    #[test]
    fn empty_url_right_after_comments() {
        let text = "url,total\n\
                    # scraped 2016-01-21\n\
                    \n\
                    # samplepoint-F\n\
                    ,5\n\
                    https://example.org/a.pcap.gz,10\n";
        let err = parse_sources(text.as_bytes()).unwrap_err();
        assert!(matches!(err, SourcesError::EmptyUrl { line: 5 }), "{err}");
    }
}
