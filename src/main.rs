//! fy Compiler CLI
//!
//! The `fyc` command is the entry point for the fy compiler. The
//! parser and the machine-code backend live in sibling crates; this
//! binary exposes the stages the core owns.

use clap::{Parser, Subcommand};
use fy::lexer;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fyc")]
#[command(version = fy::VERSION)]
#[command(about = "The fy compiler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tokenize a file and print tokens
    Tokenize {
        /// Input file to tokenize
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Print canonical token text instead of debug payloads
        #[arg(long)]
        canonical: bool,
    },

    /// Lex a file and report errors without compiling
    Check {
        /// Input file to check
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Tokenize { input, canonical } => {
            let source = fs::read_to_string(&input)
                .map_err(|e| miette::miette!("Failed to read file: {}", e))?;

            let tokens = match lexer::lex(&source) {
                Ok(tokens) => tokens,
                Err(err) => return Err(miette::miette!("Lex error: {}", err)),
            };

            for token in &tokens {
                if canonical {
                    println!("{}", token.kind);
                } else {
                    println!(
                        "{:>4}..{:<4} {:?}",
                        token.span.start, token.span.end, token.kind
                    );
                }
            }

            Ok(())
        }

        Commands::Check { input } => {
            let source = fs::read_to_string(&input)
                .map_err(|e| miette::miette!("Failed to read file: {}", e))?;

            println!("Checking {}...", input.display());

            match lexer::lex(&source) {
                Ok(tokens) => {
                    println!("No errors found! ({} tokens)", tokens.len());
                    Ok(())
                }
                Err(err) => Err(miette::miette!("Lex error: {}", err)),
            }
        }
    }
}
