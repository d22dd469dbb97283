//! Scans text for lines containing any of the given words.
//!
//! The pattern `.*(\bw1\b|\bw2\b|...).*` is built over BDDs, moved to the bitvector
//! algebra over its own minterms, and matched line by line with cached DFA states.
//!
//! Run with:
//! ```bash
//! cargo run --example scan -- foo bar --file input.txt
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use log::info;
use symbolic_regex::algebra::CharAlgebra;
use symbolic_regex::ast::{Anchor, Regex};
use symbolic_regex::bitvector::BitVectorAlgebra;
use symbolic_regex::builder::{BuilderConfig, SymbolicRegexBuilder};
use symbolic_regex::charset::CharSetSolver;
use symbolic_regex::node::Node;

#[derive(Debug, Parser)]
#[command(author, version, about = "Print lines containing any of the given words")]
struct Cli {
    /// Words to search for
    #[arg(required = true)]
    words: Vec<String>,

    /// Input file (stdin if omitted)
    #[arg(long)]
    file: Option<PathBuf>,

    /// Use Antimirov derivatives
    #[arg(long)]
    antimirov: bool,

    /// Stay in the BDD algebra instead of switching to bitvectors
    #[arg(long)]
    bdd: bool,

    /// Print the regex and state statistics
    #[arg(short, long)]
    verbose: bool,
}

fn search_regex(words: &[String]) -> Regex {
    let any = Regex::star(Regex::Any { newline: true });
    let words = Regex::alternate(words.iter().map(|w| {
        Regex::concat([
            Regex::anchor(Anchor::WordBoundary),
            Regex::literal(w),
            Regex::anchor(Anchor::WordBoundary),
        ])
    }));
    Regex::concat([any.clone(), Regex::group(words), any])
}

fn scan<A: CharAlgebra>(builder: &SymbolicRegexBuilder<A>, root: Node<A::Set>, lines: &[String]) -> usize {
    let matcher = builder.matcher(root);
    let mut count = 0;
    for (i, line) in lines.iter().enumerate() {
        if matcher.accepts(line) {
            println!("{}: {}", i + 1, line);
            count += 1;
        }
    }
    count
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    simplelog::TermLogger::init(
        if cli.verbose {
            simplelog::LevelFilter::Info
        } else {
            simplelog::LevelFilter::Warn
        },
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let lines: Vec<String> = match &cli.file {
        Some(path) => BufReader::new(File::open(path)?).lines().collect::<Result<_, _>>()?,
        None => std::io::stdin().lock().lines().collect::<Result<_, _>>()?,
    };

    let config = BuilderConfig::default().with_antimirov(cli.antimirov);
    let solver = Arc::new(CharSetSolver::new());
    let cb = SymbolicRegexBuilder::with_config(solver.clone(), config);
    let root = cb.compile(&search_regex(&cli.words))?;
    info!("regex = {}", cb.pretty_print(&root));

    let time_scan = Instant::now();
    let count = if cli.bdd {
        let count = scan(&cb, root, &lines);
        info!("states = {}", cb.state_count());
        count
    } else {
        let minterms = cb.minterms(&root);
        info!("minterms = {}", minterms.len());
        let bv = BitVectorAlgebra::new(solver, &minterms)?;
        let b = SymbolicRegexBuilder::with_config(Arc::new(bv), config);
        let root = cb.transform(&root, &b, &|set| b.solver().from_char_set(set));
        let count = scan(&b, root, &lines);
        info!("states = {}", b.state_count());
        count
    };
    let time_scan = time_scan.elapsed();

    println!("{} of {} lines matched in {:.2} ms", count, lines.len(), time_scan.as_secs_f64() * 1000.0);

    Ok(())
}
