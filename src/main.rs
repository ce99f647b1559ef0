use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;
use wiktionary_ld::iri::DEFAULT_CONTEXT_BASE;
use wiktionary_ld::lang::language_heading;
use wiktionary_ld::parallel::{process_dump, DumpJob, OutputKind, ParallelConfig, Stats};
use wiktionary_ld::source::{open_input, parse_api_response};
use wiktionary_ld::transform::find_transform_source;
use wiktionary_ld::{EntryQuery, Extractor, IriResolver, IriStyle, TableCache};

#[derive(Parser)]
#[command(name = "wiktionary-ld")]
#[command(about = "Extract Wiktionary entries into JSON-LD shaped documents, one JSON line each")]
struct Args {
    /// Input file: API payload (.json), raw wikitext, or XML dump (.xml or .xml.bz2)
    input: PathBuf,

    /// Output JSONL file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Entry word (default: page title from the payload, else the file stem)
    #[arg(short, long)]
    word: Option<String>,

    /// Wiktionary edition, e.g. en for en.wiktionary.org
    #[arg(long, default_value = "en")]
    wiki: String,

    /// Language section to extract (ISO 639 code)
    #[arg(short, long, default_value = "en")]
    lang: String,

    /// Path to transform rules YAML (default: schema/transforms.yaml relative to project root)
    #[arg(long)]
    transforms: Option<PathBuf>,

    /// Use compact IRIs (en.wt:cat#English) instead of full URLs
    #[arg(long)]
    compact_iris: bool,

    /// Base URL the JSON-LD context is served under
    #[arg(long, default_value = DEFAULT_CONTEXT_BASE)]
    context_base: String,

    /// Emit the section tree instead of the flattened document
    #[arg(long)]
    tree: bool,

    /// Number of worker threads for dumps (0 = auto-detect)
    #[arg(short, long, default_value_t = 0)]
    threads: usize,

    /// Channel buffer size for the dump pipeline
    #[arg(long, default_value_t = 10000)]
    channel_buffer: usize,

    /// Limit number of pages to scan (for testing with raw dumps)
    #[arg(long)]
    page_limit: Option<usize>,

    /// Quiet mode - minimal output
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputKind {
    Api,
    Wikitext,
    Dump,
}

impl InputKind {
    fn of(path: &Path) -> Self {
        let name = path.to_string_lossy();
        if name.ends_with(".xml") || name.ends_with(".bz2") {
            InputKind::Dump
        } else if name.ends_with(".json") {
            InputKind::Api
        } else {
            InputKind::Wikitext
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

fn progress_bar(quiet: bool) -> Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner} {msg}")?);
    Ok(pb)
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    let writer: Box<dyn Write> = match path {
        Some(p) => {
            let file = File::create(p).with_context(|| format!("creating {}", p.display()))?;
            Box::new(BufWriter::with_capacity(256 * 1024, file))
        }
        None => Box::new(io::stdout().lock()),
    };
    Ok(writer)
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
}

fn run_single(
    args: &Args,
    kind: InputKind,
    extractor: &Extractor<'_>,
    output: OutputKind,
) -> Result<()> {
    let text = fs::read_to_string(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let (title, wikitext) = match kind {
        InputKind::Api => {
            let page = parse_api_response(&text)
                .with_context(|| format!("decoding API payload {}", args.input.display()))?;
            (page.title, page.wikitext)
        }
        _ => (None, text),
    };

    let word = args
        .word
        .clone()
        .or(title)
        .or_else(|| file_stem(&args.input))
        .context("no entry word; pass --word")?;
    let query = EntryQuery::new(&args.wiki, &args.lang, word);
    let extraction = extractor.extract(&query, &wikitext)?;

    let mut writer = open_output(args.output.as_deref())?;
    writeln!(writer, "{}", output.render(&extraction)?)?;
    writer.flush()?;

    if !args.quiet {
        if !extraction.found() {
            eprintln!(
                "No {} section for '{}'",
                language_heading(&query.lang).unwrap_or(query.lang.as_str()),
                query.word
            );
        }
        let unresolved = extraction.unresolved();
        if unresolved > 0 {
            eprintln!("{} template(s) passed through without a rule", unresolved);
        }
    }
    Ok(())
}

fn run_dump(args: &Args, extractor: &Extractor<'_>, output: OutputKind) -> Result<()> {
    let mut config = ParallelConfig::default();
    if args.threads > 0 {
        config.num_workers = args.threads;
    }
    config.channel_buffer = args.channel_buffer;

    if !args.quiet {
        eprintln!("Parsing: {}", args.input.display());
        if let Some(path) = &args.output {
            eprintln!("Output: {}", path.display());
        }
        eprintln!("Threads: {}", config.num_workers);
        if let Some(limit) = args.page_limit {
            eprintln!("Page limit: {}", limit);
        }
        eprintln!();
    }

    let reader = open_input(&args.input)
        .with_context(|| format!("opening {}", args.input.display()))?;
    let writer = open_output(args.output.as_deref())?;
    let job = DumpJob {
        wiki: args.wiki.clone(),
        lang: args.lang.clone(),
        output,
        page_limit: args.page_limit,
    };

    let pb = progress_bar(args.quiet)?;
    let stats = process_dump(reader, writer, extractor, &job, &config, &pb)?;
    match args.page_limit {
        Some(limit) if stats.pages_scanned >= limit => {
            pb.finish_with_message(format!("Reached page limit of {}", limit))
        }
        _ => pb.finish_and_clear(),
    }

    if !args.quiet {
        print_stats(&stats);
    }
    Ok(())
}

fn print_stats(stats: &Stats) {
    let secs = stats.elapsed.as_secs_f64().max(f64::EPSILON);
    eprintln!();
    eprintln!("============================================================");
    eprintln!("Pages scanned: {}", stats.pages_scanned);
    eprintln!("Documents written: {}", stats.documents_written);
    eprintln!("Unresolved templates: {}", stats.unresolved_templates);
    eprintln!("------------------------------------------------------------");
    eprintln!("Without language section: {}", stats.missing_section);
    eprintln!("Other namespaces / redirects: {}", stats.skipped);
    eprintln!("Failed: {}", stats.failed);
    eprintln!("Time: {}m {}s", stats.elapsed.as_secs() / 60, stats.elapsed.as_secs() % 60);
    eprintln!("Rate: {:.0} pages/sec", stats.pages_scanned as f64 / secs);
    eprintln!("============================================================");
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let source = match &args.transforms {
        Some(path) => path.clone(),
        None => find_transform_source().context("use --transforms to specify the rule file")?,
    };
    let cache = TableCache::new(source);
    let table = cache
        .get()
        .with_context(|| format!("loading transform rules from {}", cache.source().display()))?;

    let style = if args.compact_iris { IriStyle::Compact } else { IriStyle::Full };
    let extractor = Extractor::new(table, IriResolver::new(style, args.context_base.clone()));
    let output = if args.tree { OutputKind::Tree } else { OutputKind::Document };

    match InputKind::of(&args.input) {
        InputKind::Dump => run_dump(&args, &extractor, output),
        kind => run_single(&args, kind, &extractor, output),
    }
}
