//! Test fixtures for ingestion tests
//!
//! Archives are built in memory and served by a wiremock server, so no test
//! touches the real download location.

use std::io::{Cursor, Write};
use u1m_server::ingest::{IngestConfig, TableNames};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zip::write::SimpleFileOptions;

pub const ARCHIVE_PATH: &str = "/top-1m.csv.zip";

/// Zip archive with the given `(entry name, contents)` pairs
pub fn zip_archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("Failed to start zip entry");
        writer
            .write_all(content.as_bytes())
            .expect("Failed to write zip entry");
    }
    writer
        .finish()
        .expect("Failed to finish zip archive")
        .into_inner()
}

/// Archive holding a single `top-1m.csv`
pub fn top_list(csv: &str) -> Vec<u8> {
    zip_archive(&[("top-1m.csv", csv)])
}

/// `count` lines of `<rank>,site<rank>.com`
pub fn numbered_csv(count: usize) -> String {
    (1..=count)
        .map(|rank| format!("{},site{}.com\n", rank, rank))
        .collect()
}

/// Mock archive endpoint
pub struct ArchiveServer {
    server: MockServer,
}

impl ArchiveServer {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn url(&self) -> String {
        format!("{}{}", self.server.uri(), ARCHIVE_PATH)
    }

    /// Serve `body` with status 200 until the next `serve*` call
    pub async fn serve(&self, body: Vec<u8>) {
        self.respond(ResponseTemplate::new(200).set_body_bytes(body))
            .await;
    }

    /// Serve an empty response with `status`
    pub async fn serve_status(&self, status: u16) {
        self.respond(ResponseTemplate::new(status)).await;
    }

    async fn respond(&self, template: ResponseTemplate) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path(ARCHIVE_PATH))
            .respond_with(template)
            .mount(&self.server)
            .await;
    }

    /// Ingestion config pointed at this server
    pub fn config(&self, tables: TableNames) -> IngestConfig {
        IngestConfig {
            zip_url: self.url(),
            http_timeout_secs: 10,
            tables,
            ..Default::default()
        }
    }
}
