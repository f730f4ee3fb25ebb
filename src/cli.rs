use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::archive::{self, ArchiveOptions};
use crate::commands::catalog::{self, CatalogOptions};
use crate::commands::{self, CommandReport};

#[derive(Debug, Parser)]
#[command(name = "transcript-archive")]
#[command(about = "Archive Claude Code session transcripts")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    archive: ArchiveArgs,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Archive one session (the default when no subcommand is given).
    Archive(ArchiveArgs),
    /// Show the catalog of an archive root.
    Catalog(CatalogArgs),
    /// Show resolved directories, config and external tools.
    Paths(PathsArgs),
}

#[derive(Debug, Clone, Default, Args)]
struct ArchiveArgs {
    /// Path to the session JSONL transcript.
    #[arg(long)]
    transcript: Option<PathBuf>,

    /// Session id; required together with --transcript.
    #[arg(long = "session-id")]
    session_id: Option<String>,

    /// Use this title instead of generating one.
    #[arg(long)]
    title: Option<String>,

    /// Regenerate the title and rename the archive directory.
    #[arg(long)]
    retitle: bool,

    /// Re-archive even when the transcript is unchanged.
    #[arg(long)]
    force: bool,

    /// Archive into ./ai_transcripts instead of the global archive.
    #[arg(long, conflicts_with = "output")]
    local: bool,

    /// Archive into this directory.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Suppress all console output.
    #[arg(long, short)]
    quiet: bool,

    /// Summary of what was asked; marks the session as reviewed.
    #[arg(long)]
    prompt: Option<String>,

    /// Summary of how the work was done.
    #[arg(long)]
    process: Option<String>,

    /// Summary of where the inputs came from.
    #[arg(long)]
    provenance: Option<String>,

    /// Session id this session continues.
    #[arg(long)]
    continues: Option<String>,
}

impl From<ArchiveArgs> for ArchiveOptions {
    fn from(args: ArchiveArgs) -> Self {
        Self {
            transcript: args.transcript,
            session_id: args.session_id,
            title: args.title,
            retitle: args.retitle,
            force: args.force,
            local: args.local,
            output: args.output,
            quiet: args.quiet,
            prompt: args.prompt,
            process: args.process,
            provenance: args.provenance,
            continues: args.continues,
        }
    }
}

#[derive(Debug, Clone, Args)]
struct CatalogArgs {
    /// Read ./ai_transcripts instead of the global archive.
    #[arg(long, conflicts_with = "output")]
    local: bool,

    /// Read the catalog in this directory.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print the raw catalog JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Args)]
struct PathsArgs {
    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    for detail in &report.details {
        println!("{detail}");
    }
    for issue in &report.issues {
        eprintln!("issue: {issue}");
    }
    Ok(())
}

fn exit_on_issues(report: &CommandReport) {
    if !report.ok {
        std::process::exit(1);
    }
}

impl Cli {
    /// `--quiet` also covers the final error line.
    pub fn quiet(&self) -> bool {
        match &self.command {
            None => self.archive.quiet,
            Some(Command::Archive(args)) => args.quiet,
            Some(Command::Catalog(_) | Command::Paths(_)) => false,
        }
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        None => exit_on_issues(&archive::run(&cli.archive.into())?),
        Some(Command::Archive(args)) => exit_on_issues(&archive::run(&args.into())?),
        Some(Command::Catalog(args)) => {
            let opts = CatalogOptions {
                local: args.local,
                output: args.output,
                json: args.json,
            };
            if opts.json {
                let catalog = catalog::load(&opts)?;
                println!("{}", serde_json::to_string_pretty(&catalog)?);
            } else {
                print_report(&catalog::run(&opts)?, false)?;
            }
        }
        Some(Command::Paths(args)) => {
            let report = commands::paths::run()?;
            print_report(&report, args.json)?;
            exit_on_issues(&report);
        }
    }
    Ok(())
}
