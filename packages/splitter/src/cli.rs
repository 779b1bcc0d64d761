//! Command-line interface for the splitter.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::{EmitMode, SplitterConfig, DEFAULT_INPUT_FIELD};
use crate::deletion::{pending_folders, read_delete_log};
use crate::document::{FieldValue, IngestDocument};
use crate::error::{Result, SplitError};
use crate::query::PathQueryEngine;
use crate::sink::JsonLinesSink;
use crate::splitting::{generate_lineage, RuleSet};

/// Field that receives the file name of XML inputs.
pub const FILE_NAME_FIELD: &str = "file_name";

/// Lineage Splitter - Split XML payloads into derived documents with lineage.
#[derive(Parser)]
#[command(name = "lineage-splitter")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Split input documents and write derived documents as JSON lines.
    Split {
        /// Splitter configuration (YAML)
        #[arg(short, long)]
        config: PathBuf,

        /// Input files: `.jsonl` documents or raw XML files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Delete log path, overriding the configuration
        #[arg(long)]
        delete_log: Option<PathBuf>,

        /// Reopen the delete log for every entry instead of keeping it open
        #[arg(long)]
        close_log_after_write: bool,

        /// Emit a document's output only when the whole document succeeds
        #[arg(long)]
        atomic: bool,
    },

    /// Validate a configuration and compile its rules.
    Check {
        /// Splitter configuration (YAML)
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Print the lineage values of an identifier.
    Lineage {
        /// Slash-separated identifier (e.g., root/a/b)
        id: String,
    },

    /// List the folders pending deletion in a delete log.
    Deletions {
        /// Delete log written by `split`
        log: PathBuf,
    },
}

/// Run the CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Split {
            config,
            inputs,
            output,
            delete_log,
            close_log_after_write,
            atomic,
        } => {
            let mut config = SplitterConfig::from_file(&config)?;
            if delete_log.is_some() {
                config.delete_log = delete_log;
            }
            if close_log_after_write {
                config.close_log_after_write = true;
            }
            if atomic {
                config.emit_mode = EmitMode::Atomic;
            }
            split_command(config, &inputs, output.as_deref())
        }
        Commands::Check { config } => check_command(&config),
        Commands::Lineage { id } => {
            lineage_command(&id);
            Ok(())
        }
        Commands::Deletions { log } => deletions_command(&log),
    }
}

/// Read input documents from `.jsonl` files and raw XML files.
///
/// An XML file becomes one document with the file path as id and the file
/// content in `input_field`.
pub fn load_inputs(paths: &[PathBuf], input_field: &str) -> Result<Vec<IngestDocument>> {
    let mut documents = Vec::new();

    for path in paths {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SplitError::Io(io::Error::new(
                e.kind(),
                format!("Failed to read input {}: {e}", path.display()),
            ))
        })?;

        if path.extension().is_some_and(|ext| ext == "jsonl") {
            for line in content.lines().filter(|l| !l.trim().is_empty()) {
                documents.push(IngestDocument::from_json(line)?);
            }
        } else {
            let mut doc = IngestDocument::new(path.display().to_string())
                .with_value(input_field, FieldValue::xml(content));
            if let Some(name) = path.file_name() {
                doc.add_value(FILE_NAME_FIELD, FieldValue::text(name.to_string_lossy()));
            }
            documents.push(doc);
        }
    }

    Ok(documents)
}

/// Execute the split command.
fn split_command(config: SplitterConfig, inputs: &[PathBuf], output: Option<&Path>) -> Result<()> {
    let input_field = config
        .input_fields
        .first()
        .cloned()
        .unwrap_or_else(|| DEFAULT_INPUT_FIELD.to_string());
    let documents = load_inputs(inputs, &input_field)?;

    let mut splitter = config.start()?;

    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };
    let mut sink = JsonLinesSink::new(writer);

    // Status goes to stderr; stdout may carry the documents.
    let pb = ProgressBar::new_spinner();
    #[allow(clippy::expect_used)] // Static template string that is guaranteed to be valid
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("valid template"),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let mut failed = 0;
    let mut skipped = 0;
    let mut deletions = 0;

    for doc in &documents {
        pb.set_message(format!("Splitting {}...", doc.id()));
        match splitter.process(doc, &mut sink) {
            Ok(outcome) => {
                deletions += outcome.deletions;
                if outcome.skipped {
                    skipped += 1;
                }
            }
            Err(e) => {
                failed += 1;
                tracing::error!(doc_id = %doc.id(), error = %e, "Document failed");
                pb.suspend(|| {
                    eprintln!("{} {}: {e}", style("Failed").red().bold(), doc.id());
                });
            }
        }
    }

    pb.finish_and_clear();

    let stop_result = splitter.stop();
    let written = sink.written();
    sink.into_inner()?;
    stop_result?;

    eprintln!(
        "{} {} documents into {} outputs",
        style("Split").green().bold(),
        documents.len() - failed,
        written
    );
    if skipped > 0 {
        eprintln!("  Skipped: {}", style(skipped).yellow());
    }
    if deletions > 0 {
        eprintln!("  Folders logged for deletion: {}", style(deletions).cyan());
    }

    if failed > 0 {
        return Err(SplitError::BatchFailed {
            failed,
            total: documents.len(),
        });
    }

    Ok(())
}

/// Execute the check command.
fn check_command(path: &Path) -> Result<()> {
    let config = SplitterConfig::from_file(path)?;
    config.validate()?;

    let rules = RuleSet::compile(
        &config.rules,
        &config.delete_flags,
        &config.namespace_table()?,
        &PathQueryEngine::new(),
    )?;
    if rules.split_rules().is_empty() {
        return Err(SplitError::Config(
            "at least one split rule is required".to_string(),
        ));
    }

    println!(
        "{} {}",
        style("Configuration OK:").green().bold(),
        path.display()
    );
    for rule in rules.split_rules() {
        println!(
            "  split  {} -> {}",
            style(rule.node_query().source()).cyan(),
            rule.id_query().source()
        );
    }
    for rule in rules.delete_rules() {
        println!(
            "  delete {} if {}",
            style(rule.node_query().source()).cyan(),
            rule.flag_query().source()
        );
    }
    if !rules.delete_rules().is_empty() && config.delete_log.is_none() {
        println!(
            "  {} delete_log is not set; pass --delete-log to split",
            style("note:").yellow()
        );
    }

    Ok(())
}

/// Execute the lineage command.
fn lineage_command(id: &str) {
    for entry in generate_lineage(id) {
        println!("{entry}");
    }
}

/// Execute the deletions command.
fn deletions_command(log: &Path) -> Result<()> {
    let folders = pending_folders(&read_delete_log(log)?);

    if folders.is_empty() {
        println!("{}", style("No folders pending deletion").dim());
        return Ok(());
    }

    for folder in &folders {
        let lineage = generate_lineage(folder).pop().unwrap_or_default();
        println!("{folder}\t{}", style(lineage).cyan());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_cli_parse_split() {
        let cli = Cli::parse_from([
            "lineage-splitter",
            "split",
            "--config",
            "splitter.yaml",
            "a.xml",
            "b.jsonl",
            "--atomic",
        ]);

        let Commands::Split {
            config,
            inputs,
            output,
            delete_log,
            close_log_after_write,
            atomic,
        } = cli.command
        else {
            panic!("expected split command");
        };
        assert_eq!(config, PathBuf::from("splitter.yaml"));
        assert_eq!(inputs, vec![PathBuf::from("a.xml"), PathBuf::from("b.jsonl")]);
        assert!(output.is_none());
        assert!(delete_log.is_none());
        assert!(!close_log_after_write);
        assert!(atomic);
    }

    #[test]
    fn test_cli_parse_split_requires_inputs() {
        let result = Cli::try_parse_from(["lineage-splitter", "split", "--config", "s.yaml"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parse_lineage() {
        let cli = Cli::parse_from(["lineage-splitter", "lineage", "root/a"]);
        let Commands::Lineage { id } = cli.command else {
            panic!("expected lineage command");
        };
        assert_eq!(id, "root/a");
    }

    #[test]
    fn test_load_inputs_reads_xml_and_json_lines() {
        let dir = TempDir::new().unwrap();
        let xml = dir.path().join("feed.xml");
        std::fs::write(&xml, "<docs/>").unwrap();
        let jsonl = dir.path().join("docs.jsonl");
        let doc = IngestDocument::new("j1").with_value("xmldom", FieldValue::xml("<a/>"));
        std::fs::write(&jsonl, format!("{}\n\n", doc.to_json().unwrap())).unwrap();

        let docs = load_inputs(&[xml.clone(), jsonl], "xmldom").unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id(), xml.display().to_string());
        assert_eq!(
            docs[0].field("xmldom").unwrap().first().unwrap().as_xml(),
            Some("<docs/>")
        );
        assert_eq!(docs[0].first_text(FILE_NAME_FIELD), Some("feed.xml"));
        assert_eq!(docs[1], doc);
    }

    #[test]
    fn test_load_inputs_missing_file_names_path() {
        let err = load_inputs(&[PathBuf::from("/nonexistent/in.xml")], "xmldom").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/in.xml"));
    }
}
