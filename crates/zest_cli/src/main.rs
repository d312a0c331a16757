//! Zest command-line entry point.
//!
//! # Responsibility
//! - Open a knowledge base file and run record migrations or the integrity
//!   check against it.
//! - Map outcomes to stable exit codes: 0 ok, 1 violations found, 2 error.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::error;
use std::path::PathBuf;
use std::process::ExitCode;
use zest_core::{
    core_version, default_log_level, init_logging, open_db, KnowledgeBase, MigrationReport,
    SqliteDocumentRepository,
};

#[derive(Parser)]
#[command(name = "zest", version, about = "Zest knowledge base maintenance")]
struct Cli {
    /// Knowledge base file.
    #[arg(long, global = true, default_value = "zest.db")]
    db: PathBuf,
    /// Absolute directory for rolling log files. Logging is off when omitted.
    #[arg(long, global = true)]
    log_dir: Option<String>,
    /// trace|debug|info|warn|error
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the core version.
    Version,
    /// Run one record migration and print its audit log.
    Migrate {
        #[command(subcommand)]
        migration: MigrateCommands,
    },
    /// Report relationship invariant violations.
    Check,
}

#[derive(Subcommand)]
enum MigrateCommands {
    /// Move legacy category content into the name field.
    CategoryNames,
    /// Split inline statement lists into statement documents.
    StatementDocuments,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        if let Err(err) = init_logging(level, log_dir) {
            eprintln!("error: {err}");
            return ExitCode::from(2);
        }
    }

    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            error!("event=cli_run module=cli status=error error=\"{err:#}\"");
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    if let Commands::Version = cli.command {
        println!("zest_core version={}", core_version());
        return Ok(ExitCode::SUCCESS);
    }

    let conn = open_db(&cli.db)
        .with_context(|| format!("opening knowledge base {}", cli.db.display()))?;
    let repo = SqliteDocumentRepository::try_new(&conn)
        .with_context(|| format!("reading knowledge base {}", cli.db.display()))?;
    let mut kb = KnowledgeBase::new(repo);

    match &cli.command {
        Commands::Version => Ok(ExitCode::SUCCESS),
        Commands::Migrate { migration } => {
            let report = match migration {
                MigrateCommands::CategoryNames => kb
                    .migrate_category_names()
                    .context("running category-names migration")?,
                MigrateCommands::StatementDocuments => kb
                    .migrate_statement_documents()
                    .context("running statement-documents migration")?,
            };
            print_report(&report)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check => {
            let report = kb.check_integrity().context("checking integrity")?;
            if report.is_clean() {
                println!("no violations");
                return Ok(ExitCode::SUCCESS);
            }
            for violation in &report.violations {
                println!("{violation}");
            }
            println!("{} violation(s)", report.violations.len());
            Ok(ExitCode::from(1))
        }
    }
}

fn print_report(report: &MigrationReport) -> Result<()> {
    let body = report.render().context("rendering migration log")?;
    print!("{body}");
    println!("Log document: {}", report.log_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{run, Cli, Commands, MigrateCommands};
    use clap::Parser;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "zest",
            "migrate",
            "statement-documents",
            "--db",
            "/tmp/kb.db",
            "--log-level",
            "warn",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Migrate {
                migration: MigrateCommands::StatementDocuments
            }
        ));
        assert_eq!(cli.db.to_str(), Some("/tmp/kb.db"));
        assert_eq!(cli.log_level.as_deref(), Some("warn"));
    }

    #[test]
    fn db_defaults_to_local_file() {
        let cli = Cli::try_parse_from(["zest", "check"]).unwrap();
        assert!(matches!(cli.command, Commands::Check));
        assert_eq!(cli.db.to_str(), Some("zest.db"));
        assert!(cli.log_dir.is_none());
    }

    #[test]
    fn unreadable_database_reports_context_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.db");
        std::fs::write(&path, vec![0x5a_u8; 4096]).unwrap();
        let cli = Cli::try_parse_from(["zest", "check", "--db", path.to_str().unwrap()]).unwrap();

        let err = run(&cli).unwrap_err();
        let rendered = format!("{err:#}");
        assert!(rendered.starts_with("opening knowledge base"));
        assert!(err.chain().count() >= 2);
    }

    #[test]
    fn check_on_fresh_database_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zest.db");
        let cli = Cli::try_parse_from(["zest", "check", "--db", path.to_str().unwrap()]).unwrap();

        assert!(run(&cli).is_ok());
        assert!(path.exists());
    }
}
