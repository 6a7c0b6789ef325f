use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rindex::algo::BackendChoice;
use rindex::config::IndexConfig;
use rindex::construction::{BuildOutcome, ReverseIndexConstructor, identity_rewriter};
use rindex::index::stats::{format_size, show_stats};
use rindex::index::{ReaderOptions, ReverseIndexReader, domain_id, local_ordinal};
use rindex::journal::JournalFileSource;
use rindex::query::{AllOf, QueryFilter};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "rindex")]
#[command(about = "Build and query on-disk reverse indexes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Index configuration (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an index from the journal shards in a directory
    Build {
        /// Directory holding page-index-NNNN.dat shards
        input: PathBuf,

        /// Directory to write words.dat and docs.dat into
        output: PathBuf,

        /// Directory for intermediate files
        #[arg(long)]
        tmp_dir: Option<PathBuf>,

        /// Force the portable search backend
        #[arg(long)]
        scalar: bool,

        /// Print the build report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show index statistics
    Stats {
        /// Index directory
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// List documents containing a term
    Query {
        /// Index directory
        path: PathBuf,

        /// Term id
        term: u64,

        /// Only documents that also contain this term
        #[arg(long = "also", value_name = "TERM")]
        also: Vec<u64>,

        /// Drop documents that contain this term
        #[arg(long = "not", value_name = "TERM")]
        not: Vec<u64>,

        /// Stop after this many documents
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show a term's metadata for some documents
    Meta {
        /// Index directory
        path: PathBuf,

        /// Term id
        term: u64,

        /// Document ids
        #[arg(required = true)]
        docs: Vec<u64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    rindex::logging::init_logger(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => IndexConfig::load(path)?,
        None => IndexConfig::default(),
    };

    match cli.command {
        Commands::Build {
            input,
            output,
            tmp_dir,
            scalar,
            json,
        } => {
            if tmp_dir.is_some() {
                config.tmp_dir = tmp_dir;
            }
            if scalar {
                config.backend = BackendChoice::Scalar;
            }
            build(&config, &input, &output, json)?;
        }
        Commands::Stats { path, json } => {
            show_stats(&path, &config, json)?;
        }
        Commands::Query {
            path,
            term,
            also,
            not,
            limit,
        } => {
            let reader = open_reader(&config, &path)?;
            query(&reader, term, &also, &not, limit.unwrap_or(usize::MAX));
        }
        Commands::Meta { path, term, mut docs } => {
            let reader = open_reader(&config, &path)?;
            docs.sort_unstable();
            docs.dedup();
            let metas = reader.get_term_meta(term, &docs);
            for (doc, meta) in docs.iter().zip(metas) {
                println!("{}\t{:#x}", doc, meta);
            }
        }
    }

    Ok(())
}

fn build(config: &IndexConfig, input: &Path, output: &Path, json: bool) -> Result<()> {
    std::fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output dir {}", output.display()))?;

    let spinner = if json {
        None
    } else {
        println!("Indexing: {}", input.display());
        Some(rindex::progress::build_spinner())
    };

    let mut constructor = ReverseIndexConstructor::from_config(
        config,
        output,
        JournalFileSource,
        identity_rewriter(),
    );
    if let Some(spinner) = &spinner {
        let spinner = spinner.clone();
        constructor = constructor.with_step_listener(move |step| {
            spinner.set_message(rindex::progress::step_message(step));
        });
    }

    let outcome = constructor.create_reverse_index(input);
    if let Some(spinner) = &spinner {
        spinner.finish_and_clear();
    }

    match outcome? {
        BuildOutcome::NoInput => {
            anyhow::bail!("No journal files found in {}", input.display());
        }
        BuildOutcome::Built(report) if json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        BuildOutcome::Built(report) => {
            println!(
                "Indexed {} terms, {} postings ({} + {})",
                report.terms,
                report.postings,
                format_size(report.words_bytes),
                format_size(report.docs_bytes)
            );
        }
    }
    Ok(())
}

fn open_reader(config: &IndexConfig, index_dir: &Path) -> Result<ReverseIndexReader> {
    let reader = ReverseIndexReader::open_with(
        &config.words_path(index_dir),
        &config.docs_path(index_dir),
        ReaderOptions::from_config(config),
    )
    .with_context(|| format!("Failed to open index in {}", index_dir.display()))?;

    if !reader.is_ready() {
        anyhow::bail!(
            "No index found in {}. Run 'rindex build' first.",
            index_dir.display()
        );
    }
    Ok(reader)
}

fn query(reader: &ReverseIndexReader, term: u64, also: &[u64], not: &[u64], limit: usize) {
    const BATCH: usize = 4096;

    let mut filters: Vec<Box<dyn QueryFilter + '_>> = Vec::new();
    filters.extend(also.iter().map(|&t| reader.also(t)));
    filters.extend(not.iter().map(|&t| reader.not(t)));
    let filter = AllOf::new(filters);
    log::info!("Query {} filtered by {}", term, filter.describe());

    let mut source = reader.documents(term);
    let mut buf = Vec::with_capacity(BATCH);
    let mut printed = 0;

    while source.has_more() && printed < limit {
        buf.clear();
        source.read_into(&mut buf, BATCH);
        filter.apply(&mut buf);

        for &doc in buf.iter().take(limit - printed) {
            println!("{}\t{}:{}", doc, domain_id(doc), local_ordinal(doc));
            printed += 1;
        }
    }
}
