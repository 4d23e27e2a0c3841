//! Batch conversion pipeline.
//!
//! Stages, in order: collect input files, load the vocabulary once, load the
//! rule set, then parse and map each document. A document's rows join the
//! aggregate only after the whole document maps; the aggregated tables are
//! written once at the end.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use ccda_ingest::parse_file;
use indicatif::{ProgressBar, ProgressStyle};
use omop_map::{DocumentMapper, load_rules};
use omop_model::OmopData;
use omop_output::CsvWriter;
use omop_report::ConversionReport;
use omop_vocab::{VocabIndex, code_system_name, vocabulary_id_for};
use tracing::{debug, info};

use crate::cli::{ConvertArgs, VocabCheckArgs};

/// Outcome of a `convert` run, for the terminal summary.
pub struct ConvertResult {
    pub files_processed: usize,
    pub output_dir: PathBuf,
    pub data: OmopData,
    pub report: Option<ConversionReport>,
}

pub fn run_convert(args: &ConvertArgs) -> Result<ConvertResult> {
    let files = collect_xml_files(&args.input)?;
    info!(files = files.len(), input = %args.input.display(), "starting conversion");

    let vocab = load_vocabulary(
        args.concept_file.as_deref(),
        args.relationship_file.as_deref(),
        args.vocab_dir.as_deref(),
    )?;

    let rules = load_rules(&args.rules)
        .with_context(|| format!("load rules from {}", args.rules.display()))?;
    if rules.is_empty() {
        bail!("no mapping rules found in {}", args.rules.display());
    }
    info!(rules = rules.len(), "loaded mapping rules");

    let mapper = DocumentMapper::new(&vocab, rules);
    let mut report = ConversionReport::new();
    let mut aggregated = OmopData::new();

    let progress = if args.no_progress {
        ProgressBar::hidden()
    } else {
        progress_bar(files.len() as u64)
    };

    for file in &files {
        let name = file_name(file);
        progress.set_message(name.clone());

        let result = parse_file(file)
            .with_context(|| format!("parse {}", file.display()))
            .and_then(|doc| {
                mapper
                    .map_document(&doc, &mut report)
                    .with_context(|| format!("map {}", file.display()))
            });

        let mut data = match result {
            Ok(data) => data,
            Err(error) => {
                report.add_document(true);
                progress.finish_and_clear();
                return Err(error);
            }
        };
        report.add_document(false);

        data.set_source_file(&name);
        debug!(file = %file.display(), records = data.total_records(), "mapped document");
        aggregated.extend(data);
        progress.inc(1);
    }
    progress.finish_and_clear();

    report.tally_tables(&aggregated);

    CsvWriter::new(&args.output_dir)
        .write_all(&aggregated)
        .with_context(|| format!("write output to {}", args.output_dir.display()))?;

    Ok(ConvertResult {
        files_processed: files.len(),
        output_dir: args.output_dir.clone(),
        data: aggregated,
        report: args.report.then_some(report),
    })
}

pub fn run_vocab_check(args: &VocabCheckArgs) -> Result<()> {
    let vocab = load_vocabulary(
        Some(&args.concept_file),
        args.relationship_file.as_deref(),
        args.vocab_dir.as_deref(),
    )?;

    let vocabulary_id = vocabulary_id_for(&args.system);
    if vocabulary_id.is_empty() {
        bail!("unrecognized code system: {}", args.system);
    }
    println!("code system: {} ({vocabulary_id})", code_system_name(&args.system));

    let Some(concept) = vocab.lookup(vocabulary_id, &args.code) else {
        println!("{vocabulary_id} {} -> not in vocabulary", args.code);
        return Ok(());
    };
    println!(
        "{vocabulary_id} {} -> {} \"{}\" (domain {}, class {}, standard: {})",
        concept.concept_code,
        concept.concept_id,
        concept.concept_name,
        concept.domain_id,
        concept.concept_class_id,
        if concept.is_standard() { "yes" } else { "no" },
    );

    let resolution = vocab.resolution(vocabulary_id, &args.code);
    for id in &resolution.concept_ids {
        match vocab.lookup_by_id(*id) {
            Some(target) if *id != concept.concept_id => {
                println!(
                    "  maps to {} \"{}\" (domain {})",
                    target.concept_id, target.concept_name, target.domain_id
                );
            }
            Some(_) => {}
            None => println!("  maps to {id} (not in vocabulary)"),
        }
    }
    Ok(())
}

/// The input files, sorted: a directory yields its `*.xml` members, a file is
/// taken as-is.
fn collect_xml_files(input: &Path) -> Result<Vec<PathBuf>> {
    if !input.is_dir() {
        return Ok(vec![input.to_path_buf()]);
    }

    let mut files = Vec::new();
    let entries = std::fs::read_dir(input)
        .with_context(|| format!("read input directory {}", input.display()))?;
    for entry in entries {
        let path = entry
            .with_context(|| format!("read input directory {}", input.display()))?
            .path();
        if path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
        {
            files.push(path);
        }
    }
    files.sort();
    if files.is_empty() {
        bail!("no XML files found in directory: {}", input.display());
    }
    Ok(files)
}

/// Load the vocabulary once for the whole batch. All paths are optional; an
/// empty index resolves every code to nothing, which degrades mapping but
/// does not fail it.
fn load_vocabulary(
    concept_file: Option<&Path>,
    relationship_file: Option<&Path>,
    vocab_dir: Option<&Path>,
) -> Result<VocabIndex> {
    let mut vocab = VocabIndex::new();

    let Some(concept_file) = concept_file else {
        info!("no vocabulary supplied, codes will not resolve to standard concepts");
        return Ok(vocab);
    };

    vocab
        .load_concepts(concept_file)
        .with_context(|| format!("load concepts from {}", concept_file.display()))?;

    if let Some(path) = relationship_file {
        vocab
            .load_relationships(path)
            .with_context(|| format!("load relationships from {}", path.display()))?;
    }

    if let Some(dir) = vocab_dir {
        for path in collect_csv_files(dir)? {
            vocab
                .load_supplementary(&path)
                .with_context(|| format!("load supplementary vocabulary {}", path.display()))?;
        }
    }

    info!(concepts = vocab.concept_count(), "vocabulary ready");
    Ok(vocab)
}

fn collect_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("read vocabulary directory {}", dir.display()))?;
    for entry in entries {
        let path = entry
            .with_context(|| format!("read vocabulary directory {}", dir.display()))?
            .path();
        if path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn progress_bar(len: u64) -> ProgressBar {
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_collection_is_sorted_and_filtered() {
        let dir = std::env::temp_dir().join("pipeline-inputs");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("b.xml"), "<x/>").unwrap();
        std::fs::write(dir.join("a.XML"), "<x/>").unwrap();
        std::fs::write(dir.join("notes.txt"), "skip").unwrap();

        let files = collect_xml_files(&dir).unwrap();
        let names: Vec<_> = files.iter().map(|p| file_name(p)).collect();
        assert_eq!(names, ["a.XML", "b.xml"]);
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = std::env::temp_dir().join("pipeline-empty");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        assert!(collect_xml_files(&dir).is_err());
    }

    #[test]
    fn single_file_passes_through() {
        let dir = std::env::temp_dir().join("pipeline-single");
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("doc.xml");
        std::fs::write(&file, "<x/>").unwrap();
        assert_eq!(collect_xml_files(&file).unwrap(), vec![file]);
    }
}
