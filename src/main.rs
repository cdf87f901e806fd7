use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use composync::{diff, render, Range, Selection, SyncEvent, SyncSession};
use serde::Deserialize;
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "composync")]
#[command(about = "Query composition synchronizer for embedded code editors", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a builder selection to query text
    Render {
        /// Path to a selection JSON file
        #[arg(short, long)]
        selection: PathBuf,

        /// Also print the rendered extents (lines, last-line length)
        #[arg(short, long)]
        extents: bool,
    },

    /// Replay a scripted editing session and report sync state
    Simulate {
        /// Path to a JSON array of session steps
        #[arg(short, long)]
        script: PathBuf,

        /// Show a unified diff of the buffer after each step
        #[arg(short, long)]
        diff: bool,
    },
}

/// One scripted session step: a builder selection change or a direct edit.
#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum Step {
    Select(Selection),
    Edit { range: Range, text: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Render { selection, extents } => cmd_render(&selection, extents),
        Commands::Simulate { script, diff } => cmd_simulate(&script, diff),
    }
}

fn load_selection(path: &Path) -> Result<Selection> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read selection file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("invalid selection JSON in {}", path.display()))
}

fn cmd_render(path: &Path, extents: bool) -> Result<()> {
    let selection = load_selection(path)?;
    let composition = render(&selection);
    println!("{}", composition.text);
    if extents {
        println!(
            "{}",
            format!(
                "-- {} lines, last line {} chars",
                composition.lines, composition.last_line_len
            )
            .dimmed()
        );
    }
    Ok(())
}

fn cmd_simulate(path: &Path, show_diff: bool) -> Result<()> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read script file {}", path.display()))?;
    let steps: Vec<Step> = serde_json::from_str(&raw)
        .with_context(|| format!("invalid script JSON in {}", path.display()))?;

    let mut session = SyncSession::new();
    let mut previous_selection = Selection::default();

    for (index, step) in steps.into_iter().enumerate() {
        let before = session.text();
        match step {
            Step::Select(selection) => {
                println!("{}", format!("step {index}: select").bold());
                let selection_diff = diff(&previous_selection, &selection);
                if !session.should_apply(&selection_diff, &selection.time_range) {
                    println!("  {}", "no-op (selection unchanged)".dimmed());
                    previous_selection = selection;
                    continue;
                }
                if !session.is_synced() {
                    println!("  {}", "skipped: sync has ended".yellow());
                    previous_selection = selection;
                    continue;
                }
                session.apply(&selection)?;
                previous_selection = selection;
            }
            Step::Edit { range, text } => {
                println!("{}", format!("step {index}: edit {range}").bold());
                session.edit(range, &text)?;
            }
        }

        if show_diff {
            print_diff(&before, &session.text());
        }
        for event in session.take_events() {
            match event {
                SyncEvent::SyncEnded => {
                    println!("  {}", "sync ended: composition edited directly".red())
                }
            }
        }
    }

    println!();
    if session.is_synced() {
        println!("{}", "session still synced".green());
    } else {
        println!("{}", "session ended".red());
    }
    println!("final buffer:\n{}", session.text());
    Ok(())
}

fn print_diff(before: &str, after: &str) {
    let diff = TextDiff::from_lines(before, after);
    for change in diff.iter_all_changes() {
        let line = change.to_string_lossy();
        let line = line.trim_end_matches('\n');
        match change.tag() {
            ChangeTag::Delete => println!("  {}", format!("-{line}").red()),
            ChangeTag::Insert => println!("  {}", format!("+{line}").green()),
            ChangeTag::Equal => println!("   {line}"),
        }
    }
}
