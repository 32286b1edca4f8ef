//! Streaming admission over one index file.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::record::{parse_line, IndexRecord};
use crate::dispatcher::{BoundedDispatcher, DispatchError};
use crate::fetch::ContentFetcher;
use crate::mime::ActiveMimeSet;
use crate::quota::MimeQuotaRegistry;
use crate::stats::HarvestStats;

/// Per-file counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileReport {
    pub lines: u64,
    pub malformed: u64,
    pub admitted: u64,
}

/// How a call to [`RecordStreamParser::parse_file`] ended.
#[derive(Debug)]
pub enum ParseOutcome {
    /// End of file reached; `active` is carried into the next file.
    Finished {
        active: ActiveMimeSet,
        report: FileReport,
    },
    /// Every budget is used up. Outstanding workers have been drained.
    Exhausted { report: FileReport },
    /// Shutdown was requested. Workers may still be in flight.
    Cancelled {
        active: ActiveMimeSet,
        report: FileReport,
    },
}

enum Admission {
    Spawned,
    Skipped,
    Exhausted,
    Cancelled,
}

/// Single producer: reads records, prunes exhausted types and hands matching
/// records to fetch workers through the dispatcher.
pub struct RecordStreamParser {
    registry: Arc<MimeQuotaRegistry>,
    dispatcher: BoundedDispatcher,
    fetcher: Arc<dyn ContentFetcher>,
    stats: Arc<HarvestStats>,
    target_language: String,
    shutdown: CancellationToken,
}

impl RecordStreamParser {
    pub fn new(
        registry: Arc<MimeQuotaRegistry>,
        dispatcher: BoundedDispatcher,
        fetcher: Arc<dyn ContentFetcher>,
        stats: Arc<HarvestStats>,
        target_language: impl Into<String>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            fetcher,
            stats,
            target_language: target_language.into(),
            shutdown,
        }
    }

    pub fn dispatcher(&self) -> &BoundedDispatcher {
        &self.dispatcher
    }

    /// Streams `path` line by line, admitting records against `active`.
    ///
    /// Undecodable lines are counted and skipped. Only failing to open or read
    /// the file is an error.
    pub async fn parse_file(&self, path: &Path, mut active: ActiveMimeSet) -> Result<ParseOutcome> {
        let file = File::open(path)
            .await
            .with_context(|| format!("Failed to open index file {}", path.display()))?;
        let mut lines = BufReader::new(file).split(b'\n');
        let mut report = FileReport::default();

        info!(
            "Parsing {} with {} active mime types",
            path.display(),
            active.len()
        );

        loop {
            if self.shutdown.is_cancelled() {
                return Ok(ParseOutcome::Cancelled { active, report });
            }

            let Some(line) = lines
                .next_segment()
                .await
                .with_context(|| format!("Failed to read index file {}", path.display()))?
            else {
                break;
            };
            report.lines += 1;

            let record = match parse_line(&line) {
                Ok(record) => record,
                Err(e) => {
                    report.malformed += 1;
                    debug!("Skipping line {}: {}", report.lines, e);
                    continue;
                }
            };

            match self.admit(&record, &mut active).await? {
                Admission::Spawned => report.admitted += 1,
                Admission::Skipped => {}
                Admission::Exhausted => {
                    info!("All mime types exceeded limit. Waiting for outstanding downloads.");
                    self.dispatcher.drain().await;
                    log_report(path, &report);
                    return Ok(ParseOutcome::Exhausted { report });
                }
                Admission::Cancelled => return Ok(ParseOutcome::Cancelled { active, report }),
            }
        }

        log_report(path, &report);
        Ok(ParseOutcome::Finished { active, report })
    }

    /// Every active type is re-checked against its budget on every record;
    /// the first type the record matches wins.
    async fn admit(
        &self,
        record: &IndexRecord,
        active: &mut ActiveMimeSet,
    ) -> Result<Admission, DispatchError> {
        for mime in active.snapshot() {
            self.registry.check_and_prune(active, &mime).await;
            if MimeQuotaRegistry::is_exhausted(active) {
                return Ok(Admission::Exhausted);
            }
            if !active.contains(&mime) {
                continue;
            }

            if record.mime_detected != mime || !record.is_ok_status() {
                continue;
            }

            if !record.matches_language(&self.target_language) {
                debug!(
                    "Mime type {} is not {}. Skipping. ({})",
                    mime, self.target_language, record.languages
                );
                return Ok(Admission::Skipped);
            }

            let slot = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return Ok(Admission::Cancelled),
                slot = self.dispatcher.acquire() => slot?,
            };

            self.stats.record_admitted();
            let fetcher = self.fetcher.clone();
            let url = record.url.clone();
            self.dispatcher.spawn(slot, async move {
                fetcher.fetch_and_persist(url, mime).await;
            });
            return Ok(Admission::Spawned);
        }

        Ok(Admission::Skipped)
    }
}

fn log_report(path: &Path, report: &FileReport) {
    info!(
        "Finished {}: {} lines, {} malformed, {} admitted",
        path.display(),
        report.lines,
        report.malformed,
        report.admitted
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchOutcome;
    use crate::mime::{ContentTypeLimits, APPLICATION_PDF, IMAGE_PNG};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records every call and charges a fixed size to the quota.
    struct RecordingFetcher {
        registry: Arc<MimeQuotaRegistry>,
        megabytes: f64,
        calls: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ContentFetcher for RecordingFetcher {
        async fn fetch_and_persist(&self, url: String, mime: String) -> FetchOutcome {
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.registry.record(&mime, self.megabytes).await;
            self.calls.lock().unwrap().push((url, mime));
            FetchOutcome::Stored {
                path: PathBuf::from("unused"),
                megabytes: self.megabytes,
            }
        }
    }

    struct Rig {
        registry: Arc<MimeQuotaRegistry>,
        fetcher: Arc<RecordingFetcher>,
        parser: RecordStreamParser,
        shutdown: CancellationToken,
    }

    fn rig(limits: &[(&str, f64)], megabytes: f64, capacity: usize) -> Rig {
        let limits: HashMap<String, f64> =
            limits.iter().map(|(m, l)| (m.to_string(), *l)).collect();
        let registry = Arc::new(MimeQuotaRegistry::new(Arc::new(ContentTypeLimits::new(
            limits,
        ))));
        let fetcher = Arc::new(RecordingFetcher {
            registry: registry.clone(),
            megabytes,
            calls: Mutex::new(Vec::new()),
        });
        let shutdown = CancellationToken::new();
        let parser = RecordStreamParser::new(
            registry.clone(),
            BoundedDispatcher::new(capacity).unwrap(),
            fetcher.clone(),
            Arc::new(HarvestStats::new()),
            "eng",
            shutdown.clone(),
        );
        Rig {
            registry,
            fetcher,
            parser,
            shutdown,
        }
    }

    fn line(url: &str, mime: &str, status: &str, languages: &str) -> String {
        format!(
            r#"com,example)/ 20240301000000 {{"url": "{url}", "mime-detected": "{mime}", "status": "{status}", "languages": "{languages}"}}"#
        )
    }

    fn write_index(dir: &tempfile::TempDir, lines: &[String]) -> PathBuf {
        let path = dir.path().join("cdx-00000");
        std::fs::write(&path, lines.join("\n")).unwrap();
        path
    }

    #[tokio::test]
    async fn test_admits_only_matching_records() {
        let rig = rig(&[(APPLICATION_PDF, 100.0), (IMAGE_PNG, 100.0)], 0.1, 4);
        let dir = tempfile::tempdir().unwrap();
        let path = write_index(
            &dir,
            &[
                line("https://a.example.edu/1", APPLICATION_PDF, "200", ""),
                line("https://a.example.edu/2", APPLICATION_PDF, "404", ""),
                line("https://a.example.edu/3", "text/html", "200", ""),
                line("https://a.example.edu/4", IMAGE_PNG, "200", "eng"),
                line("https://a.example.edu/5", IMAGE_PNG, "200", "fra"),
                "no object on this line".to_string(),
                "x 1 {not json".to_string(),
            ],
        );

        let active = ActiveMimeSet::new([APPLICATION_PDF, IMAGE_PNG]);
        let outcome = rig.parser.parse_file(&path, active).await.unwrap();
        rig.parser.dispatcher().drain().await;

        match outcome {
            ParseOutcome::Finished { active, report } => {
                assert_eq!(
                    report,
                    FileReport {
                        lines: 7,
                        malformed: 2,
                        admitted: 2,
                    }
                );
                assert_eq!(active.len(), 2);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        let mut calls = rig.fetcher.calls.lock().unwrap().clone();
        calls.sort();
        assert_eq!(
            calls,
            vec![
                ("https://a.example.edu/1".to_string(), APPLICATION_PDF.to_string()),
                ("https://a.example.edu/4".to_string(), IMAGE_PNG.to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_exceeded_type_is_never_admitted() {
        let rig = rig(&[(APPLICATION_PDF, 100.0), (IMAGE_PNG, 1.0)], 0.1, 2);
        rig.registry.record(IMAGE_PNG, 1.5).await;

        let dir = tempfile::tempdir().unwrap();
        let path = write_index(
            &dir,
            &[
                line("https://a.example.edu/shot.png", IMAGE_PNG, "200", ""),
                line("https://a.example.edu/paper", APPLICATION_PDF, "200", ""),
            ],
        );

        let active = ActiveMimeSet::new([IMAGE_PNG, APPLICATION_PDF]);
        let outcome = rig.parser.parse_file(&path, active).await.unwrap();
        rig.parser.dispatcher().drain().await;

        let ParseOutcome::Finished { active, report } = outcome else {
            panic!("expected the file to finish");
        };
        assert!(!active.contains(IMAGE_PNG));
        assert!(active.contains(APPLICATION_PDF));
        assert_eq!(report.admitted, 1);
        let calls = rig.fetcher.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, APPLICATION_PDF);
    }

    #[tokio::test]
    async fn test_exhaustion_stops_admissions_and_drains() {
        let rig = rig(&[(APPLICATION_PDF, 1.0)], 0.6, 1);
        let dir = tempfile::tempdir().unwrap();
        let lines: Vec<String> = (0..10)
            .map(|i| line(&format!("https://a.example.edu/{i}"), APPLICATION_PDF, "200", ""))
            .collect();
        let path = write_index(&dir, &lines);

        let outcome = rig
            .parser
            .parse_file(&path, ActiveMimeSet::new([APPLICATION_PDF]))
            .await
            .unwrap();

        let report = match outcome {
            ParseOutcome::Exhausted { report } => report,
            other => panic!("expected exhaustion, got {other:?}"),
        };
        // Drained before returning: every admitted worker has finished
        assert_eq!(rig.parser.dispatcher().in_flight(), 0);
        let calls = rig.fetcher.calls.lock().unwrap().len() as u64;
        assert_eq!(calls, report.admitted);
        assert!((2..=3).contains(&report.admitted));
        assert!(report.lines < 10);
        assert!(rig.registry.usage(APPLICATION_PDF).await > 1.0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let rig = rig(&[(APPLICATION_PDF, 1.0)], 0.1, 1);
        let dir = tempfile::tempdir().unwrap();
        let path = write_index(
            &dir,
            &[line("https://a.example.edu/1", APPLICATION_PDF, "200", "")],
        );
        rig.shutdown.cancel();

        let outcome = rig
            .parser
            .parse_file(&path, ActiveMimeSet::new([APPLICATION_PDF]))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            ParseOutcome::Cancelled { report, .. } if report.lines == 0
        ));
        assert!(rig.fetcher.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let rig = rig(&[(APPLICATION_PDF, 1.0)], 0.1, 1);
        let result = rig
            .parser
            .parse_file(
                Path::new("/nonexistent/cdx-00000"),
                ActiveMimeSet::new([APPLICATION_PDF]),
            )
            .await;
        assert!(result.is_err());
    }
}
