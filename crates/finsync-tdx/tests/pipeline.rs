//! End-to-end pipeline tests against an in-memory server
//!
//! The coordinator runs for real (worker pool, staging, zip, parquet); only
//! the network is replaced by `FakeServer`.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use arrow::record_batch::RecordBatch;
use finsync_core::{ProgressContext, StreamError, Transport, hash_bytes, is_valid_parquet};
use finsync_tdx::{
    Config, Coordinator, CorporateActionOutcome, CorporateActionRecord, DecodeError, Decoder,
    PlanReason, RunPhase, TdxDecoder,
};
use indicatif::ProgressBar;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

static NOT_CANCELLED: AtomicBool = AtomicBool::new(false);
static CANCELLED: AtomicBool = AtomicBool::new(true);

// ---------------------------------------------------------------------------
// Fixtures

/// gpcw snapshot with one float column per value
fn snapshot_bytes(report_date: u32, rows: &[(&str, Vec<f32>)]) -> Vec<u8> {
    let cols = rows.first().map_or(0, |(_, v)| v.len());
    let report_size = cols * 4;
    let mut out = Vec::new();
    out.extend_from_slice(&1i16.to_le_bytes());
    out.extend_from_slice(&report_date.to_le_bytes());
    out.extend_from_slice(&(rows.len() as u16).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(report_size as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    let data_start = 20 + rows.len() * 11;
    for (i, (code, _)) in rows.iter().enumerate() {
        let mut padded = [0u8; 6];
        padded[..code.len()].copy_from_slice(code.as_bytes());
        out.extend_from_slice(&padded);
        out.push(0);
        out.extend_from_slice(&((data_start + i * report_size) as u32).to_le_bytes());
    }
    for (_, vals) in rows {
        for v in vals {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }
    out
}

/// Zip package holding `<stem>.dat`
fn package_bytes(name: &str, dat: &[u8]) -> Vec<u8> {
    let stem = name.trim_end_matches(".zip");
    let mut zw = zip::ZipWriter::new(Cursor::new(Vec::new()));
    zw.start_file(format!("{stem}.dat"), SimpleFileOptions::default())
        .unwrap();
    zw.write_all(dat).unwrap();
    zw.finish().unwrap().into_inner()
}

fn sample_package(name: &str) -> Vec<u8> {
    let date: u32 = name
        .trim_start_matches("gpcw")
        .trim_end_matches(".zip")
        .parse()
        .unwrap_or(20240101);
    package_bytes(
        name,
        &snapshot_bytes(
            date,
            &[("000001", vec![1.0, 2.0]), ("600000", vec![3.0, 4.0])],
        ),
    )
}

/// gbbq file readable with an all-zero key (each block's halves swapped)
fn gbbq_bytes(records: &[(&str, u32, u8, [f32; 4])]) -> Vec<u8> {
    let mut out = (records.len() as u32).to_le_bytes().to_vec();
    for (code, date, category, vals) in records {
        let mut rec = [0u8; 29];
        rec[0] = 1;
        rec[1..1 + code.len()].copy_from_slice(code.as_bytes());
        rec[8..12].copy_from_slice(&date.to_le_bytes());
        rec[12] = *category;
        for (i, v) in vals.iter().enumerate() {
            rec[13 + i * 4..17 + i * 4].copy_from_slice(&v.to_le_bytes());
        }
        for b in 0..3 {
            let s = b * 8;
            let (lo, hi) = rec[s..s + 8].split_at_mut(4);
            lo.swap_with_slice(hi);
        }
        out.extend_from_slice(&rec);
    }
    out
}

// ---------------------------------------------------------------------------
// Fakes

#[derive(Default)]
struct FakeServer {
    manifest: Mutex<Option<String>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
    failing: Mutex<HashSet<String>>,
    downloads: AtomicUsize,
}

impl FakeServer {
    /// Serve `packages` and a manifest listing their true md5 and size
    fn with_packages(packages: &[(&str, Vec<u8>)]) -> Arc<Self> {
        let server = Arc::new(Self::default());
        server.set_manifest(Some(""));
        for (name, bytes) in packages {
            server.publish(name, bytes.clone());
        }
        server
    }

    fn publish(&self, name: &str, bytes: Vec<u8>) {
        let mut files = self.files.lock().unwrap();
        files.insert(name.to_string(), bytes);
        let mut names: Vec<_> = files.keys().cloned().collect();
        names.sort();
        let text: String = names
            .iter()
            .map(|n| format!("{n},{},{}\r\n", hash_bytes(&files[n]), files[n].len()))
            .collect();
        *self.manifest.lock().unwrap() = Some(text);
    }

    fn set_manifest(&self, text: Option<&str>) {
        *self.manifest.lock().unwrap() = text.map(str::to_string);
    }

    fn fail(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

impl Transport for FakeServer {
    fn fetch_text(&self, _url: &str) -> Result<String, StreamError> {
        self.manifest.lock().unwrap().clone().ok_or(StreamError::Http {
            status: Some(404),
            message: "no manifest".into(),
        })
    }

    fn download(
        &self,
        url: &str,
        dest: &Path,
        _deadline: Instant,
        _pb: &ProgressBar,
    ) -> Result<u64, StreamError> {
        let name = url.rsplit('/').next().unwrap_or_default();
        if self.failing.lock().unwrap().contains(name) {
            return Err(StreamError::Http {
                status: Some(404),
                message: format!("{name} not found"),
            });
        }
        let bytes = self.files.lock().unwrap().get(name).cloned().ok_or(
            StreamError::Http {
                status: Some(404),
                message: format!("{name} not found"),
            },
        )?;
        self.downloads.fetch_add(1, Ordering::SeqCst);
        fs::write(dest, &bytes)?;
        Ok(bytes.len() as u64)
    }
}

/// Real decoder that can be told to reject specific raw files
struct FlakyDecoder {
    inner: TdxDecoder,
    reject: Mutex<HashSet<String>>,
    panic_on: Mutex<HashSet<String>>,
}

impl FlakyDecoder {
    fn new(key_file: Option<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            inner: TdxDecoder::new(key_file),
            reject: Mutex::new(HashSet::new()),
            panic_on: Mutex::new(HashSet::new()),
        })
    }
}

impl Decoder for FlakyDecoder {
    fn decode_snapshot(&self, path: &Path) -> Result<RecordBatch, DecodeError> {
        let file = path.file_name().unwrap().to_string_lossy().into_owned();
        if self.reject.lock().unwrap().contains(&file) {
            return Err(DecodeError::new(path, "rejected by test"));
        }
        if self.panic_on.lock().unwrap().contains(&file) {
            panic!("decoder blew up on {file}");
        }
        self.inner.decode_snapshot(path)
    }

    fn decode_corporate_actions(
        &self,
        path: &Path,
    ) -> Result<Vec<CorporateActionRecord>, DecodeError> {
        self.inner.decode_corporate_actions(path)
    }
}

struct Harness {
    dir: TempDir,
    config: Config,
    server: Arc<FakeServer>,
    decoder: Arc<FlakyDecoder>,
}

impl Harness {
    fn new(server: Arc<FakeServer>) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = Config::for_tdx_root(&dir.path().join("tdx"), &dir.path().join("out"));
        config.workers = 2;
        config.max_retries = 0;
        config.corporate_actions_enabled = false;
        config.base_url = "http://fake/tdxfin/".into();
        Self {
            dir,
            config,
            server,
            decoder: FlakyDecoder::new(None),
        }
    }

    fn coordinator(&self) -> Coordinator {
        self.coordinator_with(&NOT_CANCELLED)
    }

    fn coordinator_with(&self, cancel: &'static AtomicBool) -> Coordinator {
        Coordinator::new(
            self.config.clone(),
            self.server.clone(),
            self.decoder.clone(),
            Arc::new(ProgressContext::hidden()),
        )
        .with_cancel_flag(cancel)
    }

    fn package(&self, name: &str) -> PathBuf {
        self.config.package_dir.join(name)
    }

    fn snapshot(&self, stem: &str) -> PathBuf {
        self.config.snapshot_dir.join(format!("{stem}.parquet"))
    }

    fn enable_corporate_actions(&mut self, gbbq: &[u8]) {
        let key = self.dir.path().join("gbbq.key");
        fs::write(&key, vec![0u8; 0x1048]).unwrap();
        let input = &self.config.corporate_action_input;
        fs::create_dir_all(input.parent().unwrap()).unwrap();
        fs::write(input, gbbq).unwrap();
        self.config.corporate_actions_enabled = true;
        self.config.corporate_action_key = Some(key.clone());
        self.decoder = FlakyDecoder::new(Some(key));
    }
}

// ---------------------------------------------------------------------------
// Tests

#[test]
fn single_package_syncs_then_plans_nothing() {
    let server = FakeServer::with_packages(&[("gpcw20240101.zip", sample_package("gpcw20240101.zip"))]);
    let h = Harness::new(server.clone());

    let (_, plan) = h.coordinator().plan().unwrap();
    assert_eq!(plan.names().collect::<Vec<_>>(), ["gpcw20240101.zip"]);
    assert_eq!(plan.reason("gpcw20240101.zip"), Some(PlanReason::Missing));

    let summary = h.coordinator().run().unwrap();
    assert_eq!(summary.phase, RunPhase::Done);
    assert_eq!(summary.planned, 1);
    assert_eq!(summary.succeeded, 1);
    assert!(summary.failed.is_empty());
    assert_eq!(summary.rows_written, 2);
    assert!(h.package("gpcw20240101.zip").exists());
    assert!(h.config.package_dir.join("gpcw20240101.dat").exists());
    assert!(is_valid_parquet(&h.snapshot("gpcw20240101")));

    let (_, plan) = h.coordinator().plan().unwrap();
    assert!(plan.is_empty());
}

#[test]
fn second_run_downloads_nothing() {
    let server = FakeServer::with_packages(&[
        ("gpcw20231231.zip", sample_package("gpcw20231231.zip")),
        ("gpcw20240331.zip", sample_package("gpcw20240331.zip")),
        ("gpcw20240630.zip", sample_package("gpcw20240630.zip")),
    ]);
    let h = Harness::new(server.clone());

    let first = h.coordinator().run().unwrap();
    assert_eq!(first.succeeded, 3);
    assert_eq!(server.downloads(), 3);
    let before = fs::metadata(h.snapshot("gpcw20240331")).unwrap().modified().unwrap();

    let second = h.coordinator().run().unwrap();
    assert_eq!(second.planned, 0);
    assert_eq!(second.succeeded, 0);
    assert_eq!(server.downloads(), 3);
    let after = fs::metadata(h.snapshot("gpcw20240331")).unwrap().modified().unwrap();
    assert_eq!(before, after);
}

#[test]
fn one_failed_transfer_does_not_stop_the_others() {
    let server = FakeServer::with_packages(&[
        ("gpcw20231231.zip", sample_package("gpcw20231231.zip")),
        ("gpcw20240331.zip", sample_package("gpcw20240331.zip")),
        ("gpcw20240630.zip", sample_package("gpcw20240630.zip")),
        ("gpcw20240930.zip", sample_package("gpcw20240930.zip")),
    ]);
    server.fail("gpcw20240331.zip");
    let h = Harness::new(server.clone());

    let mut coordinator = h.coordinator();
    let summary = coordinator.run().unwrap();
    assert_eq!(coordinator.phase(), RunPhase::Done);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed.len(), 1);
    let (name, err) = &summary.failed[0];
    assert_eq!(name, "gpcw20240331.zip");
    assert_eq!(err.kind(), "transfer");

    assert!(!h.package("gpcw20240331.zip").exists());
    assert!(!h.package("gpcw20240331.zip.tmp").exists());
    assert!(is_valid_parquet(&h.snapshot("gpcw20240630")));

    // Only the failed item is left to do
    let (_, plan) = h.coordinator().plan().unwrap();
    assert_eq!(plan.names().collect::<Vec<_>>(), ["gpcw20240331.zip"]);
}

#[test]
fn changed_server_hash_forces_redownload() {
    let server = FakeServer::with_packages(&[("gpcw20240101.zip", sample_package("gpcw20240101.zip"))]);
    let h = Harness::new(server.clone());
    h.coordinator().run().unwrap();

    // Server republishes the package with different content; local output still exists
    let revised = package_bytes(
        "gpcw20240101.zip",
        &snapshot_bytes(
            20240101,
            &[("000001", vec![9.0]), ("000002", vec![8.0]), ("000003", vec![7.0])],
        ),
    );
    server.publish("gpcw20240101.zip", revised.clone());

    let (_, plan) = h.coordinator().plan().unwrap();
    assert_eq!(plan.reason("gpcw20240101.zip"), Some(PlanReason::Stale));

    let summary = h.coordinator().run().unwrap();
    assert_eq!(summary.stale, 1);
    assert_eq!(summary.rows_written, 3);
    assert_eq!(server.downloads(), 2);
    assert_eq!(fs::read(h.package("gpcw20240101.zip")).unwrap(), revised);
}

#[test]
fn tampered_local_package_is_replaced() {
    let bytes = sample_package("gpcw20240101.zip");
    let server = FakeServer::with_packages(&[("gpcw20240101.zip", bytes.clone())]);
    let h = Harness::new(server.clone());
    h.coordinator().run().unwrap();

    fs::write(h.package("gpcw20240101.zip"), b"bit rot").unwrap();
    let (_, plan) = h.coordinator().plan().unwrap();
    assert_eq!(plan.reason("gpcw20240101.zip"), Some(PlanReason::Stale));

    h.coordinator().run().unwrap();
    assert_eq!(fs::read(h.package("gpcw20240101.zip")).unwrap(), bytes);
}

#[test]
fn failed_decode_is_retried_without_redownload() {
    let server = FakeServer::with_packages(&[("gpcw20240101.zip", sample_package("gpcw20240101.zip"))]);
    let h = Harness::new(server.clone());
    h.decoder
        .reject
        .lock()
        .unwrap()
        .insert("gpcw20240101.dat".into());

    let summary = h.coordinator().run().unwrap();
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].1.kind(), "parse");
    // Package and raw file stay; no output
    assert!(h.package("gpcw20240101.zip").exists());
    assert!(h.config.package_dir.join("gpcw20240101.dat").exists());
    assert!(!h.snapshot("gpcw20240101").exists());

    h.decoder.reject.lock().unwrap().clear();
    let (_, plan) = h.coordinator().plan().unwrap();
    assert_eq!(plan.reason("gpcw20240101.zip"), Some(PlanReason::Undecoded));

    let summary = h.coordinator().run().unwrap();
    assert_eq!(summary.undecoded, 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.bytes_downloaded, 0);
    assert_eq!(server.downloads(), 1);
    assert!(is_valid_parquet(&h.snapshot("gpcw20240101")));
}

#[test]
fn panicking_item_is_reported_as_panic() {
    let server = FakeServer::with_packages(&[
        ("gpcw20240101.zip", sample_package("gpcw20240101.zip")),
        ("gpcw20240331.zip", sample_package("gpcw20240331.zip")),
    ]);
    let h = Harness::new(server);
    h.decoder
        .panic_on
        .lock()
        .unwrap()
        .insert("gpcw20240101.dat".into());

    let summary = h.coordinator().run().unwrap();
    assert_eq!(summary.phase, RunPhase::Done);
    assert_eq!(summary.succeeded, 1);
    let (name, err) = &summary.failed[0];
    assert_eq!(name, "gpcw20240101.zip");
    assert_eq!(err.kind(), "panic");
    assert!(err.to_string().contains("decoder blew up on gpcw20240101.dat"), "{err}");
}

#[test]
fn corrupt_package_is_cleaned_up() {
    // Hash and size in the manifest match, but the bytes are not a zip
    let server = FakeServer::with_packages(&[
        ("gpcw20240101.zip", b"this is not a zip archive".to_vec()),
        ("gpcw20240331.zip", sample_package("gpcw20240331.zip")),
    ]);
    let h = Harness::new(server.clone());

    let summary = h.coordinator().run().unwrap();
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed[0].1.kind(), "corrupt-archive");
    assert!(!h.package("gpcw20240101.zip").exists());
    assert!(!h.config.package_dir.join("gpcw20240101.dat").exists());

    let (_, plan) = h.coordinator().plan().unwrap();
    assert_eq!(plan.reason("gpcw20240101.zip"), Some(PlanReason::Missing));
}

#[test]
fn hash_mismatch_leaves_existing_package_untouched() {
    let good = sample_package("gpcw20240101.zip");
    let server = FakeServer::with_packages(&[("gpcw20240101.zip", good.clone())]);
    let h = Harness::new(server.clone());
    h.coordinator().run().unwrap();

    // Manifest now promises different content than the server delivers
    server.set_manifest(Some(&format!(
        "gpcw20240101.zip,{},{}\r\n",
        hash_bytes(b"something else"),
        good.len()
    )));
    let summary = h.coordinator().run().unwrap();
    assert_eq!(summary.failed.len(), 1);
    assert!(summary.failed[0].1.to_string().contains("md5"));
    assert_eq!(fs::read(h.package("gpcw20240101.zip")).unwrap(), good);
    assert!(!h.package("gpcw20240101.zip.tmp").exists());
}

#[test]
fn manifest_failure_aborts_before_touching_disk() {
    let server = Arc::new(FakeServer::default());
    let h = Harness::new(server.clone());

    let mut coordinator = h.coordinator();
    let err = coordinator.run().unwrap_err();
    assert!(format!("{err:#}").contains("manifest unavailable"), "{err:#}");
    assert_eq!(coordinator.phase(), RunPhase::Failed);
    assert!(!h.config.package_dir.exists());
    assert_eq!(server.downloads(), 0);
}

#[test]
fn malformed_manifest_aborts() {
    let server = Arc::new(FakeServer::default());
    server.set_manifest(Some("gpcw20240101.zip,abc\r\n"));
    let h = Harness::new(server);
    let err = h.coordinator().run().unwrap_err();
    assert!(format!("{err:#}").contains("line 1"), "{err:#}");
}

#[test]
fn manifest_name_outside_package_dir_aborts() {
    let bytes = sample_package("gpcw20240101.zip");
    let server = Arc::new(FakeServer::default());
    server.set_manifest(Some(&format!(
        "../escape.zip,{},{}\r\n",
        hash_bytes(&bytes),
        bytes.len()
    )));
    server.files.lock().unwrap().insert("escape.zip".into(), bytes);
    let h = Harness::new(server.clone());

    let mut coordinator = h.coordinator();
    let err = coordinator.run().unwrap_err();
    assert!(format!("{err:#}").contains("not a plain file name"), "{err:#}");
    assert_eq!(coordinator.phase(), RunPhase::Failed);
    assert_eq!(server.downloads(), 0);
    let outside = h.config.package_dir.parent().unwrap().join("escape.zip");
    assert!(!outside.exists());
}

#[test]
fn package_cannot_replace_another_items_raw_file() {
    let server = FakeServer::with_packages(&[("gpcw20240331.zip", sample_package("gpcw20240331.zip"))]);
    let h = Harness::new(server.clone());
    h.coordinator().run().unwrap();
    let sibling_raw = h.config.package_dir.join("gpcw20240331.dat");
    let before = fs::read(&sibling_raw).unwrap();

    // A new package that also carries the other item's raw file
    let mut zw = zip::ZipWriter::new(Cursor::new(Vec::new()));
    zw.start_file("gpcw20240331.dat", SimpleFileOptions::default()).unwrap();
    zw.write_all(b"garbage from another package").unwrap();
    zw.start_file("gpcw20240101.dat", SimpleFileOptions::default()).unwrap();
    zw.write_all(&snapshot_bytes(20240101, &[("000001", vec![1.0])])).unwrap();
    server.publish("gpcw20240101.zip", zw.finish().unwrap().into_inner());

    let summary = h.coordinator().run().unwrap();
    assert_eq!(summary.planned, 1);
    assert_eq!(summary.succeeded, 1, "failed: {:?}", summary.failed);
    assert_eq!(fs::read(&sibling_raw).unwrap(), before);
    assert!(h.coordinator().plan().unwrap().1.is_empty());
}

#[test]
fn cancelled_run_starts_nothing() {
    let server = FakeServer::with_packages(&[
        ("gpcw20240101.zip", sample_package("gpcw20240101.zip")),
        ("gpcw20240331.zip", sample_package("gpcw20240331.zip")),
    ]);
    let mut h = Harness::new(server.clone());
    h.enable_corporate_actions(&gbbq_bytes(&[]));

    let summary = h.coordinator_with(&CANCELLED).run().unwrap();
    assert_eq!(summary.cancelled, 2);
    assert_eq!(summary.succeeded, 0);
    assert!(summary.was_cancelled());
    assert!(matches!(summary.corporate_actions, CorporateActionOutcome::Cancelled));
    assert_eq!(server.downloads(), 0);
}

#[test]
fn stale_staging_files_are_removed() {
    let server = FakeServer::with_packages(&[("gpcw20240101.zip", sample_package("gpcw20240101.zip"))]);
    let h = Harness::new(server);
    fs::create_dir_all(&h.config.snapshot_dir).unwrap();
    fs::create_dir_all(&h.config.package_dir).unwrap();
    fs::write(h.snapshot("gpcw19990101").with_extension("parquet.tmp"), b"x").unwrap();
    fs::write(h.package("gpcw19990101.zip.tmp"), b"x").unwrap();

    h.coordinator().run().unwrap();
    assert!(!h.config.snapshot_dir.join("gpcw19990101.parquet.tmp").exists());
    assert!(!h.package("gpcw19990101.zip.tmp").exists());
}

#[test]
fn corporate_actions_are_exported_with_labels() {
    let server = FakeServer::with_packages(&[]);
    let mut h = Harness::new(server);
    h.enable_corporate_actions(&gbbq_bytes(&[
        ("600000", 20230615, 1, [1.5, 100.0, 0.5, 120.0]),
        ("000001", 20240101, 12, [0.0, 10.0, 0.0, 8.0]),
    ]));

    let summary = h.coordinator().run().unwrap();
    let CorporateActionOutcome::Exported { rows, path } = &summary.corporate_actions else {
        panic!("expected export, got {}", summary.corporate_actions);
    };
    assert_eq!(*rows, 2);
    assert_eq!(path, &h.config.corporate_action_dir.join("gbbq.csv"));

    let text = fs::read_to_string(path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1], "600000,2023-06-15,除权除息,1.5,100,0.5,120");
    assert!(lines[2].starts_with("000001,2024-01-01,非流通股缩股,"));
}

#[test]
fn unknown_category_fails_export_but_not_run() {
    let server = FakeServer::with_packages(&[("gpcw20240101.zip", sample_package("gpcw20240101.zip"))]);
    let mut h = Harness::new(server);
    h.enable_corporate_actions(&gbbq_bytes(&[
        ("600000", 20230615, 1, [0.0; 4]),
        ("600001", 20230615, 15, [0.0; 4]),
    ]));

    let summary = h.coordinator().run().unwrap();
    assert_eq!(summary.phase, RunPhase::Done);
    assert_eq!(summary.succeeded, 1);
    match &summary.corporate_actions {
        CorporateActionOutcome::Failed(e) => assert_eq!(e.kind(), "unknown-category"),
        other => panic!("expected failure, got {other}"),
    }
    assert!(summary.corporate_actions.is_failure());
    assert!(!h.config.corporate_action_output().exists());
}

#[test]
fn missing_corporate_action_input_is_a_failure() {
    let server = FakeServer::with_packages(&[]);
    let mut h = Harness::new(server);
    h.enable_corporate_actions(&[]);
    fs::remove_file(&h.config.corporate_action_input).unwrap();

    let outcome = h.coordinator().process_corporate_actions();
    assert!(outcome.is_failure());
}

#[test]
fn disabled_corporate_actions_are_skipped() {
    let h = Harness::new(FakeServer::with_packages(&[]));
    assert!(matches!(
        h.coordinator().process_corporate_actions(),
        CorporateActionOutcome::Disabled
    ));
}

#[test]
fn corporate_actions_without_key_table_are_skipped() {
    let server = FakeServer::with_packages(&[("gpcw20240101.zip", sample_package("gpcw20240101.zip"))]);
    let mut h = Harness::new(server);
    h.enable_corporate_actions(&gbbq_bytes(&[("000001", 20230615, 1, [0.0; 4])]));
    h.config.corporate_action_key = None;
    h.decoder = FlakyDecoder::new(None);

    let summary = h.coordinator().run().unwrap();
    assert_eq!(summary.phase, RunPhase::Done);
    assert_eq!(summary.succeeded, 1);
    assert!(matches!(summary.corporate_actions, CorporateActionOutcome::Disabled));
    assert!(!summary.corporate_actions.is_failure());
    assert!(!h.config.corporate_action_output().exists());
}
