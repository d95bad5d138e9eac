//! End-to-end batch tests.
//!
//! These drive the real metadata client and download engine against an
//! in-memory update server: metadata documents and package bodies are
//! served from a map, and range requests are honoured or ignored
//! depending on the server's mode.

use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::sync::Mutex;

use reqwest::StatusCode;
use sha1::{Digest, Sha1};
use tempfile::TempDir;

use updatedl::config::{DownloadConfig, NetworkConfig};
use updatedl::download::{
    ChecksumMode, DescriptorOutcome, IntegrityVerifier, SkipReason, TitleOutcome,
    VerificationPolicy, VerificationResult,
};
use updatedl::metadata::UpdateMetadataClient;
use updatedl::session::{ByteRange, Transport, TransportError, TransportResponse};
use updatedl::BatchOrchestrator;

const TEMPLATE: &str = "https://meta.test/{id}/{id}-ver.xml";
const PACKAGE_URL: &str = "http://cdn.test/NPUA80662/pkg.bin";

struct UpdateServer {
    resources: HashMap<String, Vec<u8>>,
    honour_ranges: bool,
    requests: Mutex<Vec<(String, Option<ByteRange>)>>,
}

impl UpdateServer {
    fn new(honour_ranges: bool) -> Self {
        Self {
            resources: HashMap::new(),
            honour_ranges,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn with(mut self, url: &str, content: impl Into<Vec<u8>>) -> Self {
        self.resources.insert(url.to_string(), content.into());
        self
    }

    fn ranges_requested(&self, url: &str) -> Vec<Option<ByteRange>> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u == url)
            .map(|(_, r)| *r)
            .collect()
    }
}

impl Transport for UpdateServer {
    fn get(
        &self,
        url: &str,
        range: Option<ByteRange>,
    ) -> Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push((url.to_string(), range));

        let respond = |status: StatusCode, body: Vec<u8>| TransportResponse {
            status,
            body: Box::new(Cursor::new(body)),
        };

        let Some(content) = self.resources.get(url) else {
            return Ok(respond(StatusCode::NOT_FOUND, b"Not Found".to_vec()));
        };

        Ok(match range {
            Some(range) if self.honour_ranges => {
                let start = range.start as usize;
                if start >= content.len() {
                    respond(StatusCode::RANGE_NOT_SATISFIABLE, Vec::new())
                } else {
                    let end = (range.end as usize + 1).min(content.len());
                    respond(StatusCode::PARTIAL_CONTENT, content[start..end].to_vec())
                }
            }
            _ => respond(StatusCode::OK, content.clone()),
        })
    }
}

fn metadata_document(title: &str, packages: &[(&str, &[u8], &str)]) -> String {
    let mut xml = String::from("<titlepatch titleid=\"NPUA80662\"><tag name=\"T\">");
    for (index, (version, content, url)) in packages.iter().enumerate() {
        xml.push_str(&format!(
            "<package version=\"{}\" size=\"{}\" sha1sum=\"{}\" url=\"{}\" ps3_system_ver=\"03.7000\">",
            version,
            content.len(),
            hex::encode(Sha1::digest(content)),
            url
        ));
        if index == 0 {
            xml.push_str(&format!("<paramsfo><TITLE>{}</TITLE></paramsfo>", title));
        }
        xml.push_str("</package>");
    }
    xml.push_str("</tag></titlepatch>");
    xml
}

fn network() -> NetworkConfig {
    NetworkConfig::default().with_metadata_url(TEMPLATE)
}

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 251) as u8).collect()
}

#[test]
fn test_single_title_end_to_end() {
    let out = TempDir::new().unwrap();
    let server = UpdateServer::new(true)
        .with(
            "https://meta.test/NPUA80662/NPUA80662-ver.xml",
            metadata_document("Example Game", &[("01.00", &b"0123456789"[..], PACKAGE_URL)]),
        )
        .with(PACKAGE_URL, b"0123456789".to_vec());
    let network = network();
    let metadata = UpdateMetadataClient::new(&server, &network);
    let config = DownloadConfig::default().with_checksum(ChecksumMode::Strict);

    let report = BatchOrchestrator::new(&metadata, &server, config).run(&["NPUA80662"], out.path());

    let path = out.path().join("Example Game").join("v01.00 - pkg.bin");
    assert_eq!(fs::read(&path).unwrap(), b"0123456789");
    assert_eq!(report.downloaded(), 1);
    assert_eq!(report.titles[0].outcome, TitleOutcome::Completed);

    let collection = updatedl::MetadataSource::fetch_descriptors(&metadata, "NPUA80662").unwrap();
    assert_eq!(
        hex::encode(collection.descriptors[0].checksum()),
        "87acec17cd9dcd20a716cc2cf67417b71c8a7016"
    );
    let verdict = IntegrityVerifier::new(ChecksumMode::Strict)
        .verify(&path, &collection.descriptors[0])
        .unwrap();
    assert_eq!(verdict, VerificationResult::Ok);
}

#[test]
fn test_unknown_title_leaves_no_directory() {
    let out = TempDir::new().unwrap();
    let server = UpdateServer::new(true);
    let network = network();
    let metadata = UpdateMetadataClient::new(&server, &network);

    let report = BatchOrchestrator::new(&metadata, &server, DownloadConfig::default())
        .run(&["BADID123"], out.path());

    assert_eq!(report.failed_titles(), 1);
    match &report.titles[0].outcome {
        TitleOutcome::Failed { reason } => assert!(reason.contains("BADID123")),
        other => panic!("expected Failed, got {:?}", other),
    }
    assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
}

#[test]
fn test_second_run_resumes_partial_file() {
    let out = TempDir::new().unwrap();
    let content = payload(1000);
    let server = UpdateServer::new(true)
        .with(
            "https://meta.test/NPUA80662/NPUA80662-ver.xml",
            metadata_document("Example Game", &[("01.00", &content[..], PACKAGE_URL)]),
        )
        .with(PACKAGE_URL, content.clone());

    let dir = out.path().join("Example Game");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("v01.00 - pkg.bin"), &content[..500]).unwrap();

    let network = network();
    let metadata = UpdateMetadataClient::new(&server, &network);
    let config = DownloadConfig::default().with_checksum(ChecksumMode::Strict);
    let report = BatchOrchestrator::new(&metadata, &server, config).run(&["NPUA80662"], out.path());

    assert_eq!(
        report.titles[0].descriptors[0].outcome,
        DescriptorOutcome::Downloaded { bytes_written: 500 }
    );
    assert_eq!(fs::read(dir.join("v01.00 - pkg.bin")).unwrap(), content);
    assert_eq!(
        server.ranges_requested(PACKAGE_URL),
        vec![Some(ByteRange::new(500, 1000))]
    );
}

#[test]
fn test_resume_downgraded_to_full_download() {
    let out = TempDir::new().unwrap();
    let content = payload(1000);
    let server = UpdateServer::new(false)
        .with(
            "https://meta.test/NPUA80662/NPUA80662-ver.xml",
            metadata_document("Example Game", &[("01.00", &content[..], PACKAGE_URL)]),
        )
        .with(PACKAGE_URL, content.clone());

    let dir = out.path().join("Example Game");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("v01.00 - pkg.bin"), vec![0xAA; 500]).unwrap();

    let network = network();
    let metadata = UpdateMetadataClient::new(&server, &network);
    let report = BatchOrchestrator::new(&metadata, &server, DownloadConfig::default())
        .run(&["NPUA80662"], out.path());

    assert_eq!(report.downloaded(), 1);
    assert_eq!(fs::read(dir.join("v01.00 - pkg.bin")).unwrap(), content);
}

#[test]
fn test_rerun_skips_completed_files() {
    let out = TempDir::new().unwrap();
    let content = payload(64);
    let server = UpdateServer::new(true)
        .with(
            "https://meta.test/NPUA80662/NPUA80662-ver.xml",
            metadata_document("Example Game", &[("01.00", &content[..], PACKAGE_URL)]),
        )
        .with(PACKAGE_URL, content.clone());
    let network = network();
    let metadata = UpdateMetadataClient::new(&server, &network);
    let orchestrator = BatchOrchestrator::new(&metadata, &server, DownloadConfig::default());

    let first = orchestrator.run(&["NPUA80662"], out.path());
    let second = orchestrator.run(&["NPUA80662"], out.path());

    assert_eq!(first.downloaded(), 1);
    assert_eq!(
        second.titles[0].descriptors[0].outcome,
        DescriptorOutcome::Skipped(SkipReason::AlreadyComplete)
    );
    assert_eq!(server.ranges_requested(PACKAGE_URL).len(), 1);
}

#[test]
fn test_oversized_file_is_left_alone() {
    let out = TempDir::new().unwrap();
    let content = payload(100);
    let server = UpdateServer::new(true)
        .with(
            "https://meta.test/NPUA80662/NPUA80662-ver.xml",
            metadata_document("Example Game", &[("01.00", &content[..], PACKAGE_URL)]),
        )
        .with(PACKAGE_URL, content.clone());

    let dir = out.path().join("Example Game");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("v01.00 - pkg.bin"), payload(150)).unwrap();

    let network = network();
    let metadata = UpdateMetadataClient::new(&server, &network);
    let report = BatchOrchestrator::new(&metadata, &server, DownloadConfig::default())
        .run(&["NPUA80662"], out.path());

    assert_eq!(
        report.titles[0].descriptors[0].outcome,
        DescriptorOutcome::Skipped(SkipReason::LargerThanExpected {
            actual: 150,
            expected: 100
        })
    );
    assert_eq!(fs::read(dir.join("v01.00 - pkg.bin")).unwrap(), payload(150));
    assert!(server.ranges_requested(PACKAGE_URL).is_empty());
}

#[test]
fn test_bad_checksum_with_abort_policy_stops_batch() {
    let out = TempDir::new().unwrap();
    let served = payload(32);
    let advertised = vec![0u8; 32];
    let server = UpdateServer::new(true)
        .with(
            "https://meta.test/NPUA80662/NPUA80662-ver.xml",
            metadata_document("Example Game", &[("01.00", &advertised[..], PACKAGE_URL)]),
        )
        .with(PACKAGE_URL, served);
    let network = network();
    let metadata = UpdateMetadataClient::new(&server, &network);
    let config = DownloadConfig::default()
        .with_checksum(ChecksumMode::Strict)
        .with_verification_policy(VerificationPolicy::AbortBatch);

    let report = BatchOrchestrator::new(&metadata, &server, config)
        .run(&["NPUA80662", "BCUS98245"], out.path());

    assert!(report.was_aborted());
    assert_eq!(report.titles.len(), 1);
    assert_eq!(report.verification_failures(), 1);
}

#[test]
fn test_missing_package_does_not_stop_title() {
    let out = TempDir::new().unwrap();
    let second = payload(20);
    let second_url = "http://cdn.test/NPUA80662/pkg2.bin";
    let server = UpdateServer::new(true)
        .with(
            "https://meta.test/NPUA80662/NPUA80662-ver.xml",
            metadata_document(
                "Example Game",
                &[("01.00", &b"gone"[..], PACKAGE_URL), ("01.01", &second[..], second_url)],
            ),
        )
        .with(second_url, second.clone());
    let network = network();
    let metadata = UpdateMetadataClient::new(&server, &network);

    let report = BatchOrchestrator::new(&metadata, &server, DownloadConfig::default())
        .run(&["NPUA80662"], out.path());

    assert_eq!(report.failed(), 1);
    assert_eq!(report.downloaded(), 1);
    assert_eq!(
        fs::read(out.path().join("Example Game").join("v01.01 - pkg2.bin")).unwrap(),
        second
    );
}
