//! ViewText CLI - check, list and resolve input definitions

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::{Map, Value};
use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use viewtext::config::{self, Severity};
use viewtext::{
    scaffold, BasicEvaluator, FixSuggestion, InputTable, Node, Resolved, Resolver, ViewError,
};

#[derive(Parser)]
#[command(name = "viewtext")]
#[command(about = "ViewText - resolve named inputs against a context")]
#[command(version)]
struct Cli {
    /// Input config file(s), merged in order (.toml, .yaml, .yml)
    #[arg(short, long = "config", global = true, default_value = "inputs.toml")]
    config: Vec<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report configuration errors and warnings
    Check,

    /// List defined inputs
    Inputs,

    /// Resolve inputs against a JSON context (one render)
    Resolve {
        /// Inputs to resolve (default: all, in declaration order)
        names: Vec<String>,

        /// JSON context file (default: stdin, or {} when stdin is empty)
        #[arg(long)]
        context: Option<PathBuf>,

        /// Print a JSON object instead of text
        #[arg(long)]
        json: bool,
    },

    /// Resolve one input against key=value pairs
    Test {
        /// Input name
        name: String,

        /// Context entries; values parse as JSON, dotted keys nest
        pairs: Vec<String>,
    },

    /// Generate input definitions from a JSON sample on stdin
    GenerateInputs {
        /// Prefix for generated input names
        #[arg(long, default_value = "")]
        prefix: String,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    // Diagnostics go to stderr; default to warnings only
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check => check_config(&cli.config),
        Commands::Inputs => list_inputs(&cli.config),
        Commands::Resolve {
            names,
            context,
            json,
        } => resolve_inputs(&cli.config, &names, context.as_deref(), json),
        Commands::Test { name, pairs } => test_input(&cli.config, &name, &pairs),
        Commands::GenerateInputs { prefix, output } => generate_inputs(&prefix, output.as_deref()),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            if let Some(suggestion) = e.fix_suggestion() {
                eprintln!("  {} {}", "Fix:".yellow(), suggestion);
            }
            std::process::exit(1);
        }
    }
}

fn load_resolver(paths: &[PathBuf]) -> Result<Resolver, ViewError> {
    let config = config::load_files(paths)?;
    let evaluator = Arc::new(BasicEvaluator::new());
    let table = InputTable::from_config(&config, evaluator.as_ref())?;
    Ok(Resolver::with_evaluator(Arc::new(table), evaluator))
}

fn check_config(paths: &[PathBuf]) -> Result<bool, ViewError> {
    let config = config::load_files(paths)?;
    let issues = config::check(&config, &BasicEvaluator::new());

    let errors = issues.iter().filter(|i| i.severity == Severity::Error).count();
    let warnings = issues.len() - errors;

    for issue in &issues {
        let marker = match issue.severity {
            Severity::Error => "✗".red().bold(),
            Severity::Warning => "⚠".yellow(),
        };
        println!("{} {}: {}", marker, issue.input.bold(), issue.message);
        if let Some(fix) = &issue.fix {
            println!("    {} {}", "Fix:".yellow(), fix);
        }
    }

    if errors == 0 {
        println!(
            "{} {} inputs checked, {} warning(s)",
            "✓".green(),
            config.inputs.len(),
            warnings
        );
        Ok(true)
    } else {
        println!(
            "{} {} error(s), {} warning(s)",
            "✗".red().bold(),
            errors,
            warnings
        );
        Ok(false)
    }
}

fn list_inputs(paths: &[PathBuf]) -> Result<bool, ViewError> {
    let resolver = load_resolver(paths)?;

    for definition in resolver.table().iter() {
        println!(
            "{} {} {}",
            definition.name.bold(),
            format!("[{}]", definition.kind.as_str()).cyan(),
            definition.kind.describe()
        );
        if let Some(default) = &definition.default {
            println!("  default: {default}");
        }
        if let Some(transform) = definition.transform {
            println!("  transform: {transform}");
        }
        if let Some(spec) = &definition.validation {
            println!("  type: {}", spec.expected_type);
        }
    }
    println!("{} input(s)", resolver.table().len());
    Ok(true)
}

fn read_context(path: Option<&Path>) -> Result<Value, ViewError> {
    let text = match path {
        Some(p) => fs::read_to_string(p)?,
        None if io::stdin().is_terminal() => String::new(),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    if text.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    Ok(serde_json::from_str(&text)?)
}

fn display(resolved: &Resolved) -> String {
    match resolved {
        Resolved::Value(v) => v.to_string(),
        Resolved::Defaulted(v) => format!("{} {}", v, "(default)".dimmed()),
        Resolved::Absent => "(absent)".dimmed().to_string(),
    }
}

fn resolve_inputs(
    paths: &[PathBuf],
    names: &[String],
    context: Option<&Path>,
    json: bool,
) -> Result<bool, ViewError> {
    let resolver = load_resolver(paths)?;
    let context = Node::from(read_context(context)?);
    let mut render = resolver.render(&context);

    let results = if names.is_empty() {
        render.resolve_all()?
    } else {
        render.resolve_many(names.iter().map(String::as_str))?
    };

    if json {
        let object: Map<String, Value> = results
            .into_iter()
            .filter_map(|(name, resolved)| resolved.into_value().map(|v| (name, v)))
            .collect();
        println!("{}", serde_json::to_string_pretty(&Value::Object(object))?);
    } else {
        for (name, resolved) in &results {
            println!("{}: {}", name.bold(), display(resolved));
        }
    }
    Ok(true)
}

/// Build a context from `key=value` pairs; dotted keys create nested objects.
fn context_from_pairs(pairs: &[String]) -> Map<String, Value> {
    let mut root = Map::new();
    for pair in pairs {
        let (key, raw) = pair.split_once('=').unwrap_or((pair.as_str(), ""));
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        let parts: Vec<&str> = key.split('.').collect();
        insert_path(&mut root, &parts, value);
    }
    root
}

fn insert_path(map: &mut Map<String, Value>, parts: &[&str], value: Value) {
    match parts {
        [] => {}
        [leaf] => {
            map.insert(leaf.to_string(), value);
        }
        [head, rest @ ..] => {
            let slot = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(inner) = slot {
                insert_path(inner, rest, value);
            }
        }
    }
}

fn test_input(paths: &[PathBuf], name: &str, pairs: &[String]) -> Result<bool, ViewError> {
    let resolver = load_resolver(paths)?;
    let context = Node::from(Value::Object(context_from_pairs(pairs)));
    let resolved = resolver.resolve(name, &context)?;
    println!("{} = {}", name.bold(), display(&resolved));
    Ok(true)
}

fn generate_inputs(prefix: &str, output: Option<&Path>) -> Result<bool, ViewError> {
    let mut text = String::new();
    io::stdin().read_to_string(&mut text)?;
    let sample: Value = serde_json::from_str(&text)?;
    let generated = scaffold::generate_inputs(&sample, prefix)?;

    match output {
        Some(path) => {
            fs::write(path, &generated)?;
            eprintln!("{} Wrote {}", "✓".green(), path.display());
        }
        None => print!("{generated}"),
    }
    Ok(true)
}
