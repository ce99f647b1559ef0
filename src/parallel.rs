//! Batch extraction over XML dumps.
//!
//! One reader thread splits the dump into `<page>` blocks, a pool of workers
//! runs the extractor over them, and the calling thread writes JSONL in page
//! order through a reorder buffer. All threads are scoped, so workers borrow
//! the caller's transform table directly.

use crate::error::{Error, Result};
use crate::iri::EntryQuery;
use crate::lang::language_heading;
use crate::pipeline::{Extraction, Extractor};
use crate::source::{page_from_xml, scan_pages, RawPage};
use indicatif::ProgressBar;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::{BufWriter, Read, Write};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct ParallelConfig {
    /// Number of extraction threads
    pub num_workers: usize,
    /// Bound on pages (and results) in flight
    pub channel_buffer: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        let cpus = thread::available_parallelism().map(|p| p.get()).unwrap_or(4);
        Self {
            num_workers: cpus.saturating_sub(1).max(1),
            channel_buffer: 10000,
        }
    }
}

/// What each JSONL line holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputKind {
    /// The flattened semantic document.
    #[default]
    Document,
    /// `{"@id": ..., "sections": <tree>}`, for inspecting rule coverage.
    Tree,
}

impl OutputKind {
    pub fn render(self, extraction: &Extraction) -> Result<String> {
        let line = match self {
            OutputKind::Document => serde_json::to_string(&extraction.document)?,
            OutputKind::Tree => {
                let mut map = Map::new();
                map.insert("@id".to_string(), Value::String(extraction.document.id.clone()));
                map.insert("sections".to_string(), serde_json::to_value(&extraction.tree)?);
                serde_json::to_string(&Value::Object(map))?
            }
        };
        Ok(line)
    }
}

/// Which entries to pull from every page of a dump.
#[derive(Debug, Clone)]
pub struct DumpJob {
    pub wiki: String,
    pub lang: String,
    pub output: OutputKind,
    /// Stop after this many `<page>` blocks
    pub page_limit: Option<usize>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Stats {
    pub pages_scanned: usize,
    pub documents_written: usize,
    /// Main-namespace pages without the requested language
    pub missing_section: usize,
    /// Other namespaces and redirects
    pub skipped: usize,
    pub failed: usize,
    pub unresolved_templates: usize,
    pub elapsed: Duration,
}

#[derive(Debug)]
enum Outcome {
    Written { line: String, unresolved: usize },
    MissingSection,
    Skipped,
    Failed,
}

#[derive(Debug)]
struct PageResult {
    page_id: usize,
    outcome: Outcome,
}

/// Extract every page of `reader` and write one JSONL line per page that
/// has the requested language section.
pub fn process_dump<R, W>(
    reader: R,
    writer: W,
    extractor: &Extractor<'_>,
    job: &DumpJob,
    config: &ParallelConfig,
    progress: &ProgressBar,
) -> Result<Stats>
where
    R: Read + Send,
    W: Write,
{
    if language_heading(&job.lang).is_none() {
        return Err(Error::UnknownLanguage(job.lang.clone()));
    }

    let start_time = Instant::now();
    let (page_tx, page_rx) = sync_channel::<(usize, String)>(config.channel_buffer);
    let (result_tx, result_rx) = sync_channel::<PageResult>(config.channel_buffer);

    let mut stats = thread::scope(|scope| -> Result<Stats> {
        let reader_handle = scope.spawn(move || read_pages(reader, page_tx, job.page_limit));

        // Workers hold the only receiver; once they stop the reader's sends fail.
        let page_rx = Arc::new(Mutex::new(page_rx));
        for _ in 0..config.num_workers.max(1) {
            let rx = Arc::clone(&page_rx);
            let tx = result_tx.clone();
            scope.spawn(move || extract_worker(rx, tx, extractor, job));
        }
        drop(page_rx);
        drop(result_tx);

        let mut stats = write_ordered(result_rx, writer, progress, start_time)?;
        stats.pages_scanned = reader_handle
            .join()
            .map_err(|_| Error::Io(std::io::Error::other("page reader panicked")))??;
        Ok(stats)
    })?;

    stats.elapsed = start_time.elapsed();
    Ok(stats)
}

fn read_pages(
    reader: impl Read,
    tx: SyncSender<(usize, String)>,
    limit: Option<usize>,
) -> Result<usize> {
    let mut page_id: usize = 0;
    scan_pages(reader, |page_xml| {
        if limit.is_some_and(|l| page_id >= l) {
            return false;
        }
        if tx.send((page_id, page_xml)).is_err() {
            return false;
        }
        page_id += 1;
        true
    })?;
    Ok(page_id)
}

fn extract_worker(
    rx: Arc<Mutex<Receiver<(usize, String)>>>,
    tx: SyncSender<PageResult>,
    extractor: &Extractor<'_>,
    job: &DumpJob,
) {
    loop {
        let item = {
            let lock = rx.lock().ok();
            lock.and_then(|guard| guard.recv().ok())
        };
        let Some((page_id, xml)) = item else {
            break;
        };

        // Every page id gets a result, or the writer would wait on it forever.
        let outcome = match page_from_xml(&xml, page_id) {
            Some(page) => extract_page(extractor, job, &page),
            None => Outcome::Skipped,
        };
        if tx.send(PageResult { page_id, outcome }).is_err() {
            break;
        }
    }
}

fn extract_page(extractor: &Extractor<'_>, job: &DumpJob, page: &RawPage) -> Outcome {
    let query = EntryQuery::new(&job.wiki, &job.lang, &page.title);
    let result = extractor.extract(&query, &page.text).and_then(|extraction| {
        if !extraction.found() {
            return Ok(Outcome::MissingSection);
        }
        let line = job.output.render(&extraction)?;
        Ok(Outcome::Written { line, unresolved: extraction.unresolved() })
    });

    result.unwrap_or_else(|e| {
        warn!(title = %page.title, error = %e, "extraction failed");
        Outcome::Failed
    })
}

/// Write results in page order, holding early arrivals in a reorder buffer.
fn write_ordered<W: Write>(
    rx: Receiver<PageResult>,
    writer: W,
    progress: &ProgressBar,
    start_time: Instant,
) -> Result<Stats> {
    let mut writer = BufWriter::with_capacity(256 * 1024, writer);
    let mut stats = Stats::default();
    let mut pending: BTreeMap<usize, Outcome> = BTreeMap::new();
    let mut next_expected: usize = 0;
    let mut seen: usize = 0;

    for result in rx {
        pending.insert(result.page_id, result.outcome);
        while let Some(outcome) = pending.remove(&next_expected) {
            record(outcome, &mut stats, &mut writer)?;
            next_expected += 1;
            seen += 1;

            if seen % 1000 == 0 {
                let rate = seen as f64 / start_time.elapsed().as_secs_f64();
                progress.set_message(format!(
                    "Pages: {} | Documents: {} | Unresolved: {} | Rate: {:.0} pg/s",
                    seen, stats.documents_written, stats.unresolved_templates, rate
                ));
            }
        }
    }

    // Only reachable if a worker died mid-page.
    for (_, outcome) in std::mem::take(&mut pending) {
        record(outcome, &mut stats, &mut writer)?;
    }

    writer.flush()?;
    Ok(stats)
}

fn record(outcome: Outcome, stats: &mut Stats, writer: &mut impl Write) -> Result<()> {
    match outcome {
        Outcome::Written { line, unresolved } => {
            writeln!(writer, "{}", line)?;
            stats.documents_written += 1;
            stats.unresolved_templates += unresolved;
        }
        Outcome::MissingSection => stats.missing_section += 1,
        Outcome::Skipped => stats.skipped += 1,
        Outcome::Failed => stats.failed += 1,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iri::IriResolver;
    use crate::transform::TransformTable;

    const RULES: &str = r#"
- _id: nounHeadword
  _match: [en-noun]
"#;

    fn dump(titles: &[&str]) -> String {
        let mut xml = String::from("<mediawiki>\n");
        for (i, title) in titles.iter().enumerate() {
            let text = if i % 3 == 2 {
                "==French==\n{{fr-noun}}"
            } else {
                "==English==\n{{en-noun}} {{mystery}}"
            };
            xml.push_str(&format!(
                "<page><title>{title}</title><ns>0</ns><text>{text}</text></page>\n"
            ));
        }
        xml.push_str("<page><title>Talk:x</title><ns>1</ns><text>==English==</text></page>\n");
        xml.push_str("</mediawiki>\n");
        xml
    }

    fn job() -> DumpJob {
        DumpJob {
            wiki: "en".into(),
            lang: "en".into(),
            output: OutputKind::Document,
            page_limit: None,
        }
    }

    fn run(input: &str, job: &DumpJob, workers: usize) -> (Stats, Vec<serde_json::Value>) {
        let table = TransformTable::from_yaml_str(RULES).unwrap();
        let extractor = Extractor::new(&table, IriResolver::default());
        let config = ParallelConfig { num_workers: workers, channel_buffer: 2 };
        let mut out = Vec::new();
        let progress = ProgressBar::hidden();
        let stats =
            process_dump(input.as_bytes(), &mut out, &extractor, job, &config, &progress).unwrap();
        let lines = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        (stats, lines)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Ordering and counting
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn output_keeps_page_order() {
        let titles: Vec<String> = (0..30).map(|i| format!("w{i}")).collect();
        let refs: Vec<&str> = titles.iter().map(String::as_str).collect();
        let (_, lines) = run(&dump(&refs), &job(), 4);

        let ids: Vec<&str> = lines.iter().map(|v| v["@id"].as_str().unwrap()).collect();
        let expected: Vec<String> = (0..30)
            .filter(|i| i % 3 != 2)
            .map(|i| format!("https://en.wiktionary.org/wiki/w{i}#English"))
            .collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn stats_add_up() {
        let (stats, lines) = run(&dump(&["a", "b", "c", "d"]), &job(), 2);
        assert_eq!(stats.pages_scanned, 5);
        assert_eq!(stats.documents_written, 3);
        assert_eq!(stats.missing_section, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.unresolved_templates, 3);
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn page_limit_stops_reader() {
        let job = DumpJob { page_limit: Some(2), ..job() };
        let (stats, lines) = run(&dump(&["a", "b", "c", "d"]), &job, 3);
        assert_eq!(stats.pages_scanned, 2);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn tree_output() {
        let job = DumpJob { output: OutputKind::Tree, ..job() };
        let (_, lines) = run(&dump(&["a"]), &job, 1);
        assert_eq!(lines[0]["@id"], "https://en.wiktionary.org/wiki/a#English");
        assert_eq!(lines[0]["sections"]["preface"][0]["@template"], "nounHeadword");
    }

    #[test]
    fn unknown_language_fails_before_reading() {
        let table = TransformTable::from_yaml_str(RULES).unwrap();
        let extractor = Extractor::new(&table, IriResolver::default());
        let job = DumpJob { lang: "zz".into(), ..job() };
        let err = process_dump(
            "".as_bytes(),
            Vec::new(),
            &extractor,
            &job,
            &ParallelConfig::default(),
            &ProgressBar::hidden(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnknownLanguage(_)));
    }
}
