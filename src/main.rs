use std::path::Path;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use stardict_reader::open_all;

#[derive(Parser)]
#[command(name = "sdutil", about = "Utilities for StarDict dictionaries", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List all dictionaries under a directory
    List { dir: String },
    /// Query all dictionaries under a directory
    Query { dir: String, query: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::List { dir } => list(Path::new(&dir)),
        Command::Query { dir, query } => query_all(Path::new(&dir), &query),
    }
}

fn list(dir: &Path) -> ExitCode {
    let (dicts, errors) = open_all(dir);
    for e in &errors {
        eprintln!("{e}");
    }
    for dict in &dicts {
        println!(
            "{}\t{}\t{} words",
            dict.bookname(),
            dict.version(),
            dict.word_count()
        );
    }
    if errors.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn query_all(dir: &Path, query: &str) -> ExitCode {
    let (dicts, errors) = open_all(dir);
    for e in &errors {
        eprintln!("{e}");
    }
    let mut failed = !errors.is_empty();

    let mut dicts_with_results = 0;
    for dict in &dicts {
        let entries = match dict.search(query) {
            Ok(entries) => entries,
            Err(e) => {
                eprintln!("{}: {e}", dict.bookname());
                failed = true;
                continue;
            }
        };
        if entries.is_empty() {
            continue;
        }

        if dicts_with_results > 0 {
            println!();
        }
        dicts_with_results += 1;

        println!("{}\n", dict.bookname());
        for entry in entries {
            println!("{}\n", entry.render().trim());
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
