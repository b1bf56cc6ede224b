/// Ontology Linter — validates ontology packs and block batches against them.
///
/// Usage: ontology_linter [--core <file>] [--extensions <dir>] [--blocks <file>]...
///
/// Without `--core` the bundled core vocabulary is used.

use action_block_engine::core::ontology::{OntologyPack, OntologyRegistry};
use action_block_engine::schema::block::{ActionBlock, BlockRecord, BlockShape};
use action_block_engine::schema::concept::{ConceptId, Namespace};
use rustc_hash::FxHashSet;
use std::path::Path;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        process::exit(0);
    }

    let mut core_path = None;
    let mut extensions_dir = None;
    let mut block_files = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--core" if i + 1 < args.len() => {
                i += 1;
                core_path = Some(args[i].clone());
            }
            "--extensions" if i + 1 < args.len() => {
                i += 1;
                extensions_dir = Some(args[i].clone());
            }
            "--blocks" if i + 1 < args.len() => {
                i += 1;
                block_files.push(args[i].clone());
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                process::exit(1);
            }
        }
        i += 1;
    }

    let mut builder = OntologyRegistry::builder();
    builder = match core_path {
        Some(ref path) => {
            match OntologyPack::load_from_ron(Path::new(path)) {
                Ok(pack) => builder.core(pack),
                Err(e) => {
                    eprintln!("ERROR: Failed to load core pack '{}': {}", path, e);
                    process::exit(1);
                }
            }
        }
        None => builder.builtin_core(),
    };
    if let Some(ref dir) = extensions_dir {
        builder = builder.extensions_dir(dir);
    }

    let ontology = match builder.build() {
        Ok(ontology) => ontology,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
    };

    for pack in ontology.packs() {
        println!("Loaded pack '{}' v{}", pack.name, pack.version);
    }
    for ns in Namespace::ALL {
        if ns != Namespace::Custom {
            println!("  {:<10} {}", ns.prefix(), ontology.len(ns));
        }
    }

    let (mut errors, mut warnings) = lint_ontology(&ontology);
    for file in &block_files {
        let (e, w) = lint_blocks(Path::new(file), &ontology);
        errors.extend(e);
        warnings.extend(w);
    }

    println!("\n=== Ontology Lint Report ===\n");

    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        errors.len(),
        warnings.len()
    );

    if errors.is_empty() {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

fn print_usage() {
    println!("Usage: ontology_linter [--core <file>] [--extensions <dir>] [--blocks <file>]...");
}

fn lint_ontology(ontology: &OntologyRegistry) -> (Vec<String>, Vec<String>) {
    let errors = Vec::new();
    let mut warnings = Vec::new();

    for pose in ontology.poses() {
        if pose.category.is_empty() {
            warnings.push(format!(
                "Pose '{}' has no category (no same-category partial credit)",
                pose.id
            ));
        }
        if pose.label.is_empty() {
            warnings.push(format!("Pose '{}' has no label", pose.id));
        }
    }

    if ontology.len(Namespace::Intimacy) < 2 {
        warnings.push("Fewer than two intimacy levels; intimacy scoring is all-or-nothing".to_string());
    }
    if ontology.len(Namespace::Rating) == 0 {
        warnings.push("No content ratings; every rated block will be filtered out".to_string());
    }

    (errors, warnings)
}

fn lint_blocks(path: &Path, ontology: &OntologyRegistry) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            errors.push(format!("{}: {}", path.display(), e));
            return (errors, warnings);
        }
    };
    let records: Vec<BlockRecord> = match ron::from_str(&contents) {
        Ok(r) => r,
        Err(e) => {
            errors.push(format!("{}: {}", path.display(), e));
            return (errors, warnings);
        }
    };

    let mut blocks = Vec::new();
    for (position, record) in records.into_iter().enumerate() {
        match ActionBlock::from_record(record, ontology) {
            Ok(block) => blocks.push(block),
            Err(e) => errors.push(format!("{} record {}: {}", path.display(), position, e)),
        }
    }
    println!("  Loaded: {} ({} blocks)", path.display(), blocks.len());

    let ids: FxHashSet<&str> = blocks.iter().map(|b| b.id.as_str()).collect();
    let mut seen = FxHashSet::default();

    for block in &blocks {
        if !seen.insert(block.id.as_str()) {
            warnings.push(format!("Block '{}' is defined more than once; last wins", block.id));
        }

        for concept in block_concepts(block) {
            if !ontology.contains(concept) {
                warnings.push(format!(
                    "Block '{}' uses '{}' which is not in the vocabulary",
                    block.id, concept
                ));
            }
        }

        for next in &block.compatible_next {
            if !ids.contains(next.as_str()) {
                warnings.push(format!(
                    "Block '{}' lists unknown compatible_next '{}'",
                    block.id, next
                ));
            }
        }
        for prev in &block.compatible_prev {
            if !ids.contains(prev.as_str()) {
                warnings.push(format!(
                    "Block '{}' lists unknown compatible_prev '{}'",
                    block.id, prev
                ));
            }
        }

        if let BlockShape::Transition { from, to, .. } = &block.shape {
            if from.pose.is_some() && from.pose == to.pose {
                warnings.push(format!(
                    "Transition '{}' starts and ends on the same pose",
                    block.id
                ));
            }
        }

        if block.prompt_template.trim().is_empty() {
            warnings.push(format!("Block '{}' has an empty prompt template", block.id));
        }
    }

    (errors, warnings)
}

fn block_concepts(block: &ActionBlock) -> Vec<&ConceptId> {
    let tags = &block.tags;
    let mut concepts: Vec<&ConceptId> = [
        &tags.location,
        &tags.pose,
        &tags.intimacy,
        &tags.mood,
        &tags.branch,
        &tags.rating,
    ]
    .into_iter()
    .flatten()
    .collect();
    match &block.shape {
        BlockShape::SingleState {
            start_pose,
            end_pose,
            ..
        } => concepts.extend(start_pose.iter().chain(end_pose.iter())),
        BlockShape::Transition { from, to, via } => {
            concepts.extend(
                std::iter::once(from)
                    .chain(via.iter())
                    .chain(std::iter::once(to))
                    .filter_map(|e| e.pose.as_ref()),
            );
        }
    }
    concepts
}
