//! grounder CLI - command-line interface for the grounding engine

use std::fs;
use std::path::Path;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use grounder_core::{GrounderConfig, ProgramDescription};

#[derive(Parser)]
#[command(name = "grounder")]
#[command(about = "Semi-naive grounder for lifted planning programs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a program description file (predicates, functions, rules assemble cleanly)
    Validate {
        /// Program description file (.json or .toml)
        file: String,
    },

    /// Ground a program description to a fixpoint and report what was derived
    Ground {
        /// Program description file (.json or .toml)
        file: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Print every derived ground rule instead of just a summary
        #[arg(long)]
        list_rules: bool,

        /// Run rule dispatch sequentially instead of across a rayon thread pool
        #[arg(long)]
        sequential: bool,

        /// Soft iteration cap per run, to catch a runaway configuration
        #[arg(long, default_value = "10000")]
        max_iterations: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt().with_env_filter("grounder=debug").init();
    }

    match cli.command {
        Commands::Validate { file } => validate_command(file),
        Commands::Ground {
            file,
            format,
            list_rules,
            sequential,
            max_iterations,
        } => ground_command(file, format, list_rules, sequential, max_iterations),
    }
}

fn load_description(path: &str) -> Result<ProgramDescription> {
    let contents = fs::read_to_string(path).with_context(|| format!("failed to read file: {path}"))?;
    let extension = Path::new(path).extension().and_then(|e| e.to_str()).unwrap_or("");
    match extension {
        "json" => Ok(ProgramDescription::from_json(&contents)?),
        "toml" => Ok(ProgramDescription::from_toml(&contents)?),
        other => bail!("unrecognized program description extension '{other}' (expected .json or .toml)"),
    }
}

fn validate_command(file: String) -> Result<()> {
    println!("{} Validating {}...", "→".blue(), file);

    let description = load_description(&file)?;
    match description.assemble() {
        Ok((program, initial)) => {
            println!("{} Program is valid!", "✓".green());
            println!("  Predicates: {}", program.predicates().len());
            println!("  Functions: {}", program.functions().len());
            println!("  Rules: {}", program.rules().len());
            println!("  Initial facts: {}", initial.atoms.len());
        }
        Err(e) => {
            println!("{} Program is invalid:", "✗".red());
            println!("  {e}");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn ground_command(file: String, format: String, list_rules: bool, sequential: bool, max_iterations: usize) -> Result<()> {
    let description = load_description(&file)?;
    let (program, initial) = description.assemble().context("program failed to assemble")?;

    let handle = grounder_core::build(program, &initial)?;

    let config = GrounderConfig {
        parallel: !sequential,
        max_iterations_per_stratum: max_iterations,
        ..GrounderConfig::default()
    };

    let mut emitted = Vec::new();
    let start = Instant::now();
    let outcome = grounder_core::ground_with_listener(&handle, &initial, &config, |rule: &grounder_core::GroundRule| {
        emitted.push(rule.clone());
    })?;
    let elapsed = start.elapsed();

    let program = handle.program();

    match format.as_str() {
        "json" => {
            let facts: Vec<serde_json::Value> = program
                .predicates()
                .iter()
                .enumerate()
                .flat_map(|(idx, symbol)| {
                    let id = grounder_core::grounding::formalism::PredicateId(idx as u32);
                    outcome
                        .facts
                        .atoms_of(id)
                        .map(|args| {
                            serde_json::json!({
                                "predicate": symbol.name,
                                "args": args.iter().map(|a| program.objects().name(*a)).collect::<Vec<_>>(),
                            })
                        })
                        .collect::<Vec<_>>()
                })
                .collect();
            let payload = serde_json::json!({
                "complete": outcome.complete,
                "ground_rules_emitted": emitted.len(),
                "facts": facts,
            });
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        _ => {
            let status = if outcome.complete { "COMPLETE".green() } else { "INCOMPLETE".yellow() };
            let total_atoms: usize = program
                .predicates()
                .iter()
                .enumerate()
                .map(|(idx, _)| outcome.facts.atom_count(grounder_core::grounding::formalism::PredicateId(idx as u32)))
                .sum();
            println!("\n{} Grounding Result", "═".blue().bold());
            println!("{} Status: {}", "▸".blue(), status);
            println!("{} Ground rules emitted: {}", "▸".blue(), emitted.len());
            println!("{} Total ground atoms: {}", "▸".blue(), total_atoms);
            println!("{} Elapsed: {:.3}ms", "▸".blue(), elapsed.as_secs_f64() * 1000.0);

            if list_rules {
                println!("\n{} Derived ground rules", "═".blue().bold());
                for rule in &emitted {
                    let args: Vec<&str> = rule.head.args.iter().map(|a| program.objects().name(*a)).collect();
                    let predicate_name = &program.predicate(rule.head.predicate).name;
                    println!("  {}({})", predicate_name, args.join(", "));
                }
            }
        }
    }

    if !outcome.complete {
        std::process::exit(1);
    }

    Ok(())
}
