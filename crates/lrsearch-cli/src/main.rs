use anyhow::Context as _;
use clap::Parser as _;
use lrsearch::{
    grammar::{Grammar, GrammarDefError},
    lr0::Automaton,
    parser::{Parser, SearchConfig, SearchError},
};
use std::{fs, path::PathBuf};
use tracing_subscriber::EnvFilter;

const DEFAULT_MAX_STEPS: u64 = 10_000_000;

#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The path of grammar definition file.
    #[arg(short, long)]
    grammar: Option<PathBuf>,

    /// An additional rule line, e.g. `S -> aSb | c`.
    #[arg(short, long = "rule")]
    rules: Vec<String>,

    /// Print the augmented grammar.
    #[arg(long)]
    dump_grammar: bool,

    /// Print the LR(0) automaton.
    #[arg(long)]
    dump_automaton: bool,

    /// Give up on an input after exploring this many transitions.
    #[arg(long, default_value_t = DEFAULT_MAX_STEPS)]
    max_steps: u64,

    /// Search without a step limit. The search may take exponential time.
    #[arg(long, conflicts_with = "max_steps")]
    unbounded: bool,

    /// The strings to recognize.
    inputs: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::trace!("CLI args = {:?}", args);

    let grammar = load_grammar(&args)?;
    if args.dump_grammar {
        println!("{}", grammar);
    }

    let automaton = Automaton::construct(grammar);
    if args.dump_automaton {
        println!("{}", automaton);
    }

    let mut config = SearchConfig::new();
    config.max_steps(args.max_steps);
    if args.unbounded {
        config.unbounded();
    }
    let parser = Parser::with_config(&automaton, config);

    for input in &args.inputs {
        let verdict = match parser.search(input) {
            Ok(true) => "accept",
            Ok(false) => "reject",
            Err(SearchError::StepLimitExceeded { .. }) => "exhausted",
        };
        println!("{:?}: {}", input, verdict);
    }

    Ok(())
}

fn load_grammar(args: &Args) -> anyhow::Result<Grammar> {
    let mut source = String::new();
    if let Some(path) = &args.grammar {
        source = fs::read_to_string(path)
            .with_context(|| format!("failed to read the grammar file `{}'", path.display()))?;
        source.push('\n');
    }
    for rule in &args.rules {
        source.push_str(rule);
        source.push('\n');
    }

    match Grammar::from_str(&source) {
        Err(GrammarDefError::EmptyGrammar) => {
            anyhow::bail!("no production rules are given (use --grammar or --rule)")
        }
        res => res.context("invalid grammar definition"),
    }
}
