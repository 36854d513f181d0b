//! Archive download and payload lookup
//!
//! The published list is a ~10 MB zip. It is buffered in memory in full
//! before anything is parsed; the entry itself is decompressed lazily on the
//! parser thread.

use reqwest::Client;
use std::io::{BufReader, Cursor};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};
use u1m_common::types::RankedEntry;
use zip::result::ZipError;
use zip::ZipArchive;

use super::parser::{forward_records, RecordParser};
use super::{IngestError, IngestResult};

/// HTTP client for the archive source
///
/// No retries: a failed download fails the cycle and the scheduler tries
/// again on the next tick.
#[derive(Debug, Clone)]
pub struct ArchiveFetcher {
    client: Client,
}

impl ArchiveFetcher {
    /// Create a fetcher whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> IngestResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("u1m-loader/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IngestError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Download `url` and return the complete body
    ///
    /// The response is consumed in full before returning, which releases the
    /// connection back to the client.
    pub async fn fetch(&self, url: &str) -> IngestResult<Vec<u8>> {
        debug!(url, "Downloading archive");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| IngestError::NetworkFailure {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::BadStatus {
                url: url.to_string(),
                status,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| IngestError::NetworkFailure {
                url: url.to_string(),
                source,
            })?;

        info!(url, bytes = body.len(), "Downloaded archive");
        Ok(body.to_vec())
    }
}

/// A downloaded archive known to contain the expected payload entry
pub struct PayloadArchive {
    archive: ZipArchive<Cursor<Vec<u8>>>,
    name: String,
}

impl std::fmt::Debug for PayloadArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadArchive")
            .field("name", &self.name)
            .field("entries", &self.archive.len())
            .finish()
    }
}

impl PayloadArchive {
    /// Read the zip directory and check that `name` is present
    ///
    /// Only the exact entry name matches; every other entry is ignored.
    pub fn open(bytes: Vec<u8>, name: &str) -> IngestResult<Self> {
        let missing = |reason: String| IngestError::MissingPayload {
            name: name.to_string(),
            reason,
        };

        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| missing(format!("not a readable zip archive: {}", e)))?;

        for other in archive.file_names().filter(|entry| *entry != name) {
            debug!(entry = other, "Skipping unknown archive entry");
        }

        let lookup = archive.by_name(name).map(|_| ());
        match lookup {
            Ok(()) => {},
            Err(ZipError::FileNotFound) => {
                return Err(missing(format!(
                    "archive has {} entries, none named {}",
                    archive.len(),
                    name
                )))
            },
            Err(e) => return Err(missing(e.to_string())),
        }

        Ok(Self {
            archive,
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decompress the payload and send every parsed record to `tx`
    ///
    /// Blocking; run it on `spawn_blocking`. Returns how many records were
    /// sent, or the first parse error. Stops early without error if the
    /// receiving side is dropped. The archive is released when this returns.
    pub fn stream_records(mut self, tx: &mpsc::Sender<RankedEntry>) -> IngestResult<u64> {
        let entry = self
            .archive
            .by_name(&self.name)
            .map_err(|e| IngestError::MissingPayload {
                name: self.name.clone(),
                reason: e.to_string(),
            })?;

        debug!(entry = %self.name, compressed = entry.compressed_size(), size = entry.size(), "Reading payload");
        forward_records(RecordParser::new(BufReader::new(entry)), tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use zip::write::SimpleFileOptions;

    fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn drain(mut rx: mpsc::Receiver<RankedEntry>) -> Vec<RankedEntry> {
        let mut out = Vec::new();
        while let Ok(entry) = rx.try_recv() {
            out.push(entry);
        }
        out
    }

    #[tokio::test]
    async fn test_fetch_returns_full_body() {
        let server = MockServer::start().await;
        let archive = build_zip(&[("top-1m.csv", "1,example.com\n")]);
        Mock::given(method("GET"))
            .and(path("/top-1m.csv.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(archive.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = ArchiveFetcher::new(Duration::from_secs(5)).unwrap();
        let body = fetcher
            .fetch(&format!("{}/top-1m.csv.zip", server.uri()))
            .await
            .unwrap();

        assert_eq!(body, archive);
    }

    #[tokio::test]
    async fn test_fetch_bad_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let fetcher = ArchiveFetcher::new(Duration::from_secs(5)).unwrap();
        let err = fetcher
            .fetch(&format!("{}/top-1m.csv.zip", server.uri()))
            .await
            .unwrap_err();

        match err {
            IngestError::BadStatus { status, .. } => assert_eq!(status.as_u16(), 503),
            other => panic!("expected BadStatus, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_network_failure() {
        // Bind and immediately drop a listener so the port refuses connections.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let fetcher = ArchiveFetcher::new(Duration::from_secs(5)).unwrap();
        let err = fetcher
            .fetch(&format!("http://127.0.0.1:{}/top-1m.csv.zip", port))
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::NetworkFailure { .. }), "got {:?}", err);
    }

    #[test]
    fn test_open_finds_payload_among_other_entries() {
        let bytes = build_zip(&[
            ("README.txt", "ignore me"),
            ("top-1m.csv", "1,example.com\n2,test.org\n"),
        ]);

        let archive = PayloadArchive::open(bytes, "top-1m.csv").unwrap();
        assert_eq!(archive.name(), "top-1m.csv");

        let (tx, rx) = mpsc::channel(16);
        let sent = archive.stream_records(&tx).unwrap();
        drop(tx);

        assert_eq!(sent, 2);
        assert_eq!(
            drain(rx),
            vec![
                RankedEntry::new(1, "example.com"),
                RankedEntry::new(2, "test.org"),
            ]
        );
    }

    #[test]
    fn test_open_missing_payload() {
        let bytes = build_zip(&[("top-1m-old.csv", "1,example.com\n")]);
        let err = PayloadArchive::open(bytes, "top-1m.csv").unwrap_err();
        assert!(matches!(err, IngestError::MissingPayload { .. }), "got {:?}", err);
    }

    #[test]
    fn test_open_rejects_non_zip_body() {
        let err = PayloadArchive::open(b"<html>not a zip</html>".to_vec(), "top-1m.csv")
            .unwrap_err();
        assert!(matches!(err, IngestError::MissingPayload { .. }), "got {:?}", err);
    }

    #[test]
    fn test_stream_records_reports_malformed_line() {
        let bytes = build_zip(&[("top-1m.csv", "1,example.com\nbroken\n3,c.com\n")]);
        let archive = PayloadArchive::open(bytes, "top-1m.csv").unwrap();

        let (tx, rx) = mpsc::channel(16);
        let err = archive.stream_records(&tx).unwrap_err();
        drop(tx);

        assert!(matches!(err, IngestError::MalformedRecord { line: 2, .. }), "got {:?}", err);
        assert_eq!(drain(rx).len(), 1);
    }
}
