use super::reader::{ReaderOptions, ReverseIndexReader};
use crate::config::IndexConfig;
use crate::index::types::TermId;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

/// Summary of a reverse index
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub terms: usize,
    pub postings: usize,
    pub words_bytes: u64,
    pub docs_bytes: u64,
    /// Terms with the most documents, largest first
    pub largest_terms: Vec<(TermId, usize)>,
}

impl IndexStats {
    pub fn collect(reader: &ReverseIndexReader, top: usize) -> Self {
        let mut counts = reader.term_counts();
        let postings = counts.iter().map(|&(_, n)| n).sum();
        let (words_bytes, docs_bytes) = reader.size_bytes();

        counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        counts.truncate(top);

        Self {
            terms: reader.num_terms(),
            postings,
            words_bytes,
            docs_bytes,
            largest_terms: counts,
        }
    }
}

/// Display index statistics
pub fn show_stats(index_dir: &Path, config: &IndexConfig, json: bool) -> Result<()> {
    let words = config.words_path(index_dir);
    let docs = config.docs_path(index_dir);
    let reader = ReverseIndexReader::open_with(&words, &docs, ReaderOptions::from_config(config))
        .with_context(|| format!("Failed to open index in {}", index_dir.display()))?;

    if !reader.is_ready() {
        anyhow::bail!(
            "No index found in {}. Run 'rindex build' first.",
            index_dir.display()
        );
    }

    let stats = IndexStats::collect(&reader, 15);

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Index Statistics");
    println!("================");
    println!();
    println!("Index location:   {}", index_dir.display());
    println!("Terms:            {}", stats.terms);
    println!("Postings:         {}", stats.postings);
    println!("Words file:       {}", format_size(stats.words_bytes));
    println!("Docs file:        {}", format_size(stats.docs_bytes));

    if !stats.largest_terms.is_empty() {
        println!();
        println!("Largest terms:");
        for (term, count) in &stats.largest_terms {
            println!("  {:20} {}", term, count);
        }
        if stats.terms > stats.largest_terms.len() {
            println!("  ... and {} more", stats.terms - stats.largest_terms.len());
        }
    }

    Ok(())
}

/// Format byte size to human readable
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
