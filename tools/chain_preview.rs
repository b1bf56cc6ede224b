/// Chain Preview — interactive shell for trying selections against a block batch.
///
/// Usage: chain_preview --blocks <file> [--blocks <file>]... [--extensions <dir>]
///
/// Commands:
///   set <field> <value>     — set location, pose, intimacy, mood, branch, rating, world, previous or target
///   unset <field>           — clear a context field
///   actor <id>              — add an actor id
///   require <tag>           — require a custom tag
///   exclude <tag>           — exclude a custom tag
///   context                 — show the current context
///   clear                   — reset the context
///   select [n]              — rank the top n blocks
///   chain [seconds] [max]   — build a chain towards a duration
///   explain <block_id>      — show filter and scorer breakdown for one block
///   list                    — list loaded blocks
///   help                    — list commands
///   quit                    — exit

use action_block_engine::core::ontology::OntologyRegistry;
use action_block_engine::core::registry::BlockRegistry;
use action_block_engine::core::selector::BlockSelector;
use action_block_engine::schema::concept::{normalize_slug, ConceptId, Namespace};
use action_block_engine::schema::context::SelectionContext;
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let mut block_files = Vec::new();
    let mut extensions_dir = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--blocks" if i + 1 < args.len() => {
                i += 1;
                block_files.push(args[i].clone());
            }
            "--extensions" if i + 1 < args.len() => {
                i += 1;
                extensions_dir = Some(args[i].clone());
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let mut builder = OntologyRegistry::builder().builtin_core();
    if let Some(ref dir) = extensions_dir {
        builder = builder.extensions_dir(dir);
    }
    let ontology = match builder.build() {
        Ok(o) => o,
        Err(e) => {
            eprintln!("ERROR: Failed to load ontology: {}", e);
            std::process::exit(1);
        }
    };

    let mut registry = BlockRegistry::new();
    for file in &block_files {
        match registry.load_from_ron_file(Path::new(file), &ontology) {
            Ok(n) => println!("  Loaded: {} ({} blocks)", file, n),
            Err(e) => eprintln!("  ERROR loading {}: {}", file, e),
        }
    }

    println!("Loaded {} blocks", registry.count());
    println!("Type 'help' for commands.\n");

    let selector = BlockSelector::new(&ontology, &registry);
    let mut context = SelectionContext::default();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("chain> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let cmd = parts[0].to_lowercase();

        match cmd.as_str() {
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "help" | "h" | "?" => {
                print_help();
            }
            "set" => {
                if parts.len() < 3 {
                    println!("Usage: set <field> <value>");
                    println!("  fields: location, pose, intimacy, mood, branch, rating, world, previous, target");
                    continue;
                }
                let value = parts[2..].join(" ");
                if !set_field(&mut context, &ontology, parts[1], Some(&value)) {
                    println!("Unknown field: {}", parts[1]);
                    continue;
                }
                print_context(&context);
            }
            "unset" => {
                if parts.len() < 2 {
                    println!("Usage: unset <field>");
                    continue;
                }
                if !set_field(&mut context, &ontology, parts[1], None) {
                    println!("Unknown field: {}", parts[1]);
                }
            }
            "actor" => {
                if parts.len() < 2 {
                    println!("Usage: actor <id>");
                    continue;
                }
                context.actor_ids.push(parts[1].to_string());
            }
            "require" | "exclude" => {
                if parts.len() < 2 {
                    println!("Usage: {} <tag>", cmd);
                    continue;
                }
                let tag = normalize_slug(parts[1]);
                if cmd == "require" {
                    context.required_tags.push(tag);
                } else {
                    context.excluded_tags.push(tag);
                }
            }
            "context" => {
                print_context(&context);
            }
            "clear" => {
                context = SelectionContext::default();
                println!("Context cleared.");
            }
            "select" => {
                let limit = parts.get(1).and_then(|n| n.parse().ok()).unwrap_or(5);
                let ranked = selector.select(&context, limit, 0.0);
                if ranked.is_empty() {
                    println!("No blocks passed the filters.");
                }
                for (rank, scored) in ranked.iter().enumerate() {
                    println!(
                        "  {:>2}. {:<24} {:.3}  ({}, {:.1}s)",
                        rank + 1,
                        scored.block.id,
                        scored.score,
                        scored.block.kind(),
                        scored.block.duration
                    );
                }
            }
            "chain" => {
                let target: f64 = match parts
                    .get(1)
                    .and_then(|n| n.parse().ok())
                    .or(context.target_duration)
                {
                    Some(t) => t,
                    None => {
                        println!("Usage: chain [seconds] [max] (seconds default to the context target)");
                        continue;
                    }
                };
                let max = parts.get(2).and_then(|n| n.parse().ok()).unwrap_or(10);
                let result = selector.select_chain(&context, target, max);

                println!("\n--- Chain ---");
                for segment in &result.segments {
                    println!(
                        "  [{:>5.1}s] {:<24} {:.1}s  {}",
                        segment.start_offset,
                        segment.block_id,
                        segment.duration,
                        segment.tags.join(" ")
                    );
                }
                println!(
                    "Total: {:.1}s over {} block(s), score {:.3}",
                    result.total_duration,
                    result.blocks.len(),
                    result.score
                );
                if let Some(reason) = &result.fallback_reason {
                    println!("Note: {}", reason);
                }
                println!("--- End ---\n");
            }
            "explain" => {
                let Some(id) = parts.get(1) else {
                    println!("Usage: explain <block_id>");
                    continue;
                };
                let Some(block) = registry.get(id) else {
                    println!("Block '{}' not found.", id);
                    continue;
                };
                let explanation = selector.explain_selection(block, &context);
                println!("\n--- {} ---", explanation.block_id);
                for outcome in &explanation.filters {
                    println!(
                        "  filter {:<20} {}",
                        outcome.name,
                        if outcome.passed { "pass" } else { "FAIL" }
                    );
                }
                for component in &explanation.components {
                    println!(
                        "  score  {:<20} {:.3} x {:.2}",
                        component.name, component.score, component.weight
                    );
                }
                println!(
                    "  {} with composite {:.3}\n",
                    if explanation.passed { "eligible" } else { "rejected" },
                    explanation.score
                );
            }
            "list" => {
                for block in registry.all() {
                    println!("  {:<24} {:<12} {:.1}s", block.id, block.kind(), block.duration);
                }
            }
            _ => {
                println!("Unknown command: {}. Type 'help' for commands.", cmd);
            }
        }
    }
}

fn set_field(
    context: &mut SelectionContext,
    ontology: &OntologyRegistry,
    field: &str,
    value: Option<&str>,
) -> bool {
    let concept = |ns: Namespace| value.map(|v| ontology.canonicalize_in(ns, v));
    match field {
        "location" => context.location = concept(Namespace::Location),
        "pose" => context.pose = concept(Namespace::Pose),
        "intimacy" => context.intimacy = concept(Namespace::Intimacy),
        "mood" => context.mood = concept(Namespace::Mood),
        "branch" => context.branch_intent = concept(Namespace::Branch),
        "rating" => context.rating_ceiling = concept(Namespace::Rating),
        "world" => context.world_id = value.map(str::to_string),
        "previous" => context.previous_block_id = value.map(str::to_string),
        "target" => context.target_duration = value.and_then(|v| v.parse().ok()),
        _ => return false,
    }
    true
}

fn print_context(context: &SelectionContext) {
    let show = |v: &Option<ConceptId>| match v {
        Some(c) => format!("{}", c),
        None => "-".to_string(),
    };
    println!("  location: {}", show(&context.location));
    println!("  pose:     {}", show(&context.pose));
    println!("  intimacy: {}", show(&context.intimacy));
    println!("  mood:     {}", show(&context.mood));
    println!("  branch:   {}", show(&context.branch_intent));
    println!("  rating:   {}", show(&context.rating_ceiling));
    println!("  world:    {}", context.world_id.as_deref().unwrap_or("-"));
    println!("  previous: {}", context.previous_block_id.as_deref().unwrap_or("-"));
    match context.target_duration {
        Some(t) => println!("  target:   {:.1}s", t),
        None => println!("  target:   -"),
    }
    println!("  actors:   {:?}", context.actor_ids);
    println!("  require:  {:?}", context.required_tags);
    println!("  exclude:  {:?}", context.excluded_tags);
}

fn print_usage() {
    println!("Usage: chain_preview --blocks <file> [--blocks <file>]... [--extensions <dir>]");
}

fn print_help() {
    println!("Commands:");
    println!("  set <field> <value>     — set location, pose, intimacy, mood, branch, rating, world, previous or target");
    println!("  unset <field>           — clear a context field");
    println!("  actor <id>              — add an actor id");
    println!("  require <tag>           — require a custom tag");
    println!("  exclude <tag>           — exclude a custom tag");
    println!("  context                 — show the current context");
    println!("  clear                   — reset the context");
    println!("  select [n]              — rank the top n blocks");
    println!("  chain [seconds] [max]   — build a chain towards a duration");
    println!("  explain <block_id>      — show filter and scorer breakdown for one block");
    println!("  list                    — list loaded blocks");
    println!("  help                    — list commands");
    println!("  quit                    — exit");
}
