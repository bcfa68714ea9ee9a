use anyhow::Context;
use clap::Parser;
use radsimp::{Simplifier, SimplifyOptions};
use std::io::{BufRead, BufReader, Write};
use tracing_subscriber::EnvFilter;

/// Simplify algebraic expressions involving square roots.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Expressions to simplify. Read from stdin, one per line, when none
    /// are given.
    expressions: Vec<String>,
    /// How deeply nested an expression may be.
    #[arg(long, default_value_t = SimplifyOptions::default().max_depth)]
    max_depth: usize,
    /// The largest power a compound base will be expanded to.
    #[arg(long, default_value_t = SimplifyOptions::default().max_expansion)]
    max_expansion: u64,
}

impl Args {
    fn options(&self) -> SimplifyOptions {
        SimplifyOptions::default()
            .with_max_depth(self.max_depth)
            .with_max_expansion(self.max_expansion)
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut simplifier = Simplifier::new(args.options());

    let all_succeeded = if args.expressions.is_empty() {
        interactive(&mut simplifier)?
    } else {
        let mut all_succeeded = true;

        for expression in &args.expressions {
            all_succeeded &= run(&mut simplifier, expression);
        }

        all_succeeded
    };

    if !all_succeeded {
        std::process::exit(1);
    }

    Ok(())
}

fn interactive(simplifier: &mut Simplifier) -> anyhow::Result<bool> {
    let stdin = std::io::stdin();
    let mut all_succeeded = true;

    for line in BufReader::new(stdin.lock()).lines() {
        let line = line.context("Unable to read from stdin")?;
        let line = line.trim();

        match line {
            "quit" => break,
            "" => println!("Did not enter an expression."),
            _ => {
                all_succeeded &= run(simplifier, &with_root_symbols(line));
            },
        }

        std::io::stdout().flush().context("Unable to flush stdout")?;
    }

    Ok(all_succeeded)
}

/// Simplify a single expression, reporting the outcome. Returns `false` on
/// failure.
fn run(simplifier: &mut Simplifier, src: &str) -> bool {
    match simplifier.simplify_str(src) {
        Ok(Some(simplified)) => {
            println!("{} => {}", src, simplified);
            true
        },
        Ok(None) => {
            println!("Did not enter an expression.");
            true
        },
        Err(e) => {
            eprintln!("Unable to simplify \"{}\": {}", src, e);
            false
        },
    }
}

/// Let people type "sqrt" or "rad" instead of "√".
fn with_root_symbols(line: &str) -> String {
    line.replace("sqrt", "√").replace("rad", "√")
}
