mod history;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use graft_core::config::Settings;
use graft_core::logging::init_logging;
use graft_core::{Dialect, Merger, Snippet};
use history::HistoryDir;
use similar::TextDiff;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "graft",
    about = "Merge regenerated JavaScript/TypeScript into hand-edited files"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to .graft data directory
    #[arg(long, default_value = ".graft")]
    data_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Write default settings into the data directory
    Init,
    /// Merge a generated file into a target file
    Merge {
        /// Freshly generated source
        incoming: PathBuf,
        /// File to merge into
        target: PathBuf,
        /// Earlier generated versions, oldest first (after recorded history)
        #[arg(long = "history")]
        history: Vec<PathBuf>,
        /// Write the result back to the target
        #[arg(long)]
        write: bool,
        /// Print a unified diff instead of the merged source
        #[arg(long)]
        diff: bool,
        /// Print the merge report as JSON
        #[arg(long)]
        json: bool,
        /// Override the dialect (javascript, typescript, tsx)
        #[arg(long)]
        dialect: Option<String>,
    },
    /// List the imports and top-level const bindings of a file
    Inspect {
        file: PathBuf,
    },
    /// Print the canonical form used to compare bindings
    Format {
        file: PathBuf,
    },
    /// List recorded history snapshots for a target
    History {
        target: PathBuf,
    },
}

fn settings_path(cli: &Cli) -> PathBuf {
    cli.data_dir.join("settings.json")
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(&cli.data_dir.join("logs"))?;

    match &cli.command {
        Commands::Init => cmd_init(&cli),
        Commands::Merge {
            incoming,
            target,
            history,
            write,
            diff,
            json,
            dialect,
        } => cmd_merge(
            &cli,
            MergeArgs {
                incoming,
                target,
                history,
                write: *write,
                diff: *diff,
                json: *json,
                dialect: dialect.as_deref(),
            },
        ),
        Commands::Inspect { file } => cmd_inspect(&cli, file),
        Commands::Format { file } => cmd_format(&cli, file),
        Commands::History { target } => cmd_history(&cli, target),
    }
}

fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let path = settings_path(cli);
    Settings::load_or_default(&path)
        .with_context(|| format!("Failed to read settings from {}", path.display()))
}

fn parse_dialect(name: &str) -> anyhow::Result<Dialect> {
    match name {
        "javascript" | "js" => Ok(Dialect::JavaScript),
        "typescript" | "ts" => Ok(Dialect::TypeScript),
        "tsx" => Ok(Dialect::Tsx),
        other => anyhow::bail!("Unknown dialect '{}'", other),
    }
}

fn read_snippet(
    settings: &Settings,
    path: &Path,
    dialect: Dialect,
    history: Vec<Arc<Snippet>>,
) -> anyhow::Result<Snippet> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Snippet::builder()
        .dialect(dialect)
        .quote_style(settings.format.quote_style)
        .history(history)
        .build(&text)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

fn build_history(
    settings: &Settings,
    dialect: Dialect,
    recorded: Vec<String>,
    explicit: &[PathBuf],
) -> anyhow::Result<Vec<Arc<Snippet>>> {
    let mut chain = Vec::new();
    for (i, text) in recorded.iter().enumerate() {
        match Snippet::builder()
            .dialect(dialect)
            .quote_style(settings.format.quote_style)
            .build(text)
        {
            Ok(snippet) => chain.push(Arc::new(snippet)),
            Err(e) => tracing::warn!(index = i, error = %e, "Skipping unparsable history snapshot"),
        }
    }
    for path in explicit {
        chain.push(Arc::new(read_snippet(settings, path, dialect, Vec::new())?));
    }
    Ok(chain)
}

struct MergeArgs<'a> {
    incoming: &'a Path,
    target: &'a Path,
    history: &'a [PathBuf],
    write: bool,
    diff: bool,
    json: bool,
    dialect: Option<&'a str>,
}

fn cmd_merge(cli: &Cli, args: MergeArgs<'_>) -> anyhow::Result<()> {
    let settings = load_settings(cli)?;
    let dialect = match args.dialect {
        Some(name) => parse_dialect(name)?,
        None => settings.dialect_for(args.target),
    };

    let store = HistoryDir::new(&cli.data_dir)?;
    let recorded = if settings.history.enabled {
        store.load(args.target)?
    } else {
        Vec::new()
    };
    let chain = build_history(&settings, dialect, recorded, args.history)?;
    tracing::info!(
        incoming = %args.incoming.display(),
        file = %args.target.display(),
        history = chain.len(),
        "Merging"
    );

    let incoming = read_snippet(&settings, args.incoming, dialect, chain)?;
    let mut target = read_snippet(&settings, args.target, dialect, Vec::new())?;
    let before = target.source();

    let report = Merger::new(settings.merge.clone())
        .merge(&incoming, &mut target)
        .context("Merge failed")?;
    let after = target.source();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if args.diff {
        let diff = TextDiff::from_lines(&before, &after);
        print!(
            "{}",
            diff.unified_diff()
                .header(&args.target.display().to_string(), "merged")
        );
    } else if !args.write {
        print!("{}", after);
    }

    for conflict in &report.conflicts {
        eprintln!("Preserved manual edit of '{}'", conflict.name);
    }

    if args.write {
        std::fs::write(args.target, &after)
            .with_context(|| format!("Failed to write {}", args.target.display()))?;
        if settings.history.enabled {
            let generated = std::fs::read_to_string(args.incoming)?;
            store.record(args.target, &generated, settings.history.keep)?;
        }
        tracing::info!(file = %args.target.display(), "Target updated");
    }

    Ok(())
}

fn cmd_init(cli: &Cli) -> anyhow::Result<()> {
    let path = settings_path(cli);
    if path.exists() {
        println!("Settings already exist at {}", path.display());
        return Ok(());
    }
    Settings::default().save(&path)?;
    println!("Wrote default settings to {}", path.display());
    Ok(())
}

fn cmd_inspect(cli: &Cli, file: &Path) -> anyhow::Result<()> {
    let settings = load_settings(cli)?;
    let snippet = read_snippet(&settings, file, settings.dialect_for(file), Vec::new())?;

    println!("Dialect: {}", snippet.dialect());
    println!("Imports:");
    for id in snippet.imports() {
        if let Some(decl) = snippet.import(*id) {
            println!("  {}", decl.to_source());
        }
    }
    println!("Definitions:");
    for stmt in snippet.definitions() {
        for declarator in snippet.bindings(*stmt) {
            println!("  {}", snippet.binding_label(*declarator));
        }
    }
    match snippet.anchor() {
        Some(_) => println!("Default export: yes"),
        None => println!("Default export: no"),
    }
    Ok(())
}

fn cmd_format(cli: &Cli, file: &Path) -> anyhow::Result<()> {
    let settings = load_settings(cli)?;
    let snippet = read_snippet(&settings, file, settings.dialect_for(file), Vec::new())?;
    for stmt in snippet.tree().statements() {
        println!("{}", snippet.render(*stmt, true));
    }
    Ok(())
}

fn cmd_history(cli: &Cli, target: &Path) -> anyhow::Result<()> {
    let store = HistoryDir::new(&cli.data_dir)?;
    let entries = store.list(target)?;
    if entries.is_empty() {
        println!("No history recorded for {}", target.display());
        return Ok(());
    }
    for path in entries {
        let stamp = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse::<i64>().ok())
            .and_then(DateTime::<Utc>::from_timestamp_millis);
        match stamp {
            Some(at) => println!("{}  {}", at.format("%Y-%m-%d %H:%M:%S%.3f"), path.display()),
            None => println!("{}", path.display()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dialect_names() {
        assert_eq!(parse_dialect("js").unwrap(), Dialect::JavaScript);
        assert_eq!(parse_dialect("typescript").unwrap(), Dialect::TypeScript);
        assert_eq!(parse_dialect("tsx").unwrap(), Dialect::Tsx);
        assert!(parse_dialect("python").is_err());
    }

    #[test]
    fn test_recorded_history_precedes_explicit_files() {
        let tmp = tempfile::tempdir().unwrap();
        let explicit = tmp.path().join("prev.ts");
        std::fs::write(&explicit, "const a = 3;\n").unwrap();
        let settings = Settings::default();

        let chain = build_history(
            &settings,
            Dialect::TypeScript,
            vec!["const a = 1;\n".into(), "const a = = ;\n".into()],
            &[explicit],
        )
        .unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[1].source(), "const a = 3;\n");
    }

    #[test]
    fn test_cli_parses_merge_flags() {
        let cli = Cli::try_parse_from([
            "graft", "merge", "gen.tsx", "App.tsx", "--history", "v1.tsx", "--history", "v2.tsx",
            "--diff",
        ])
        .unwrap();
        match cli.command {
            Commands::Merge { history, diff, write, .. } => {
                assert_eq!(history.len(), 2);
                assert!(diff);
                assert!(!write);
            }
            _ => panic!("expected merge"),
        }
    }
}
