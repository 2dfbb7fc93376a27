use clap::{Parser, Subcommand};
use env_logger::Env;
use miette::{IntoDiagnostic, WrapErr};
use pcalc::*;
use std::path::{Path, PathBuf};
use std::{fs, io::{self, BufRead, Write}};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log parse and evaluation details to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive prompt (the default).
    Repl,
    /// Run every line of a file through one session.
    Run { filename: PathBuf },
    Tokenize { filename: PathBuf },
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(filter))
        .format_timestamp(None)
        .init();

    match cli.command.unwrap_or(Commands::Repl) {
        Commands::Tokenize { filename } => {
            let file_contents = read(&filename)?;
            for token in Lexer::new(&file_contents) {
                println!("{:?}", token);
            }
        }
        Commands::Run { filename } => {
            let file_contents = read(&filename)?;
            let mut session = Session::new();
            for line in file_contents.lines() {
                if !step(&mut session, line) {
                    break;
                }
            }
        }
        Commands::Repl => {
            let mut session = Session::new();
            let stdin = io::stdin();
            let mut lines = stdin.lock().lines();
            loop {
                print!("pcalc> ");
                io::stdout().flush().into_diagnostic()?;

                let Some(line) = lines.next() else {
                    break;
                };
                let line = line.into_diagnostic().wrap_err("reading stdin failed")?;
                if !step(&mut session, &line) {
                    break;
                }
            }
        }
    }

    Ok(())
}

fn read(filename: &Path) -> miette::Result<String> {
    fs::read_to_string(filename)
        .into_diagnostic()
        .wrap_err_with(|| format!("reading '{}' failed", filename.display()))
}

/// Runs one line and prints the outcome. Returns `false` once the session ends.
fn step(session: &mut Session, line: &str) -> bool {
    match session.execute(line) {
        Ok(Reply::Exit) => return false,
        Ok(Reply::Empty) => {}
        Ok(reply) => println!("{reply}"),
        Err(err) => {
            let report = miette::Report::new(err).with_source_code(line.to_string());
            eprintln!("{report:?}");
        }
    }
    true
}
