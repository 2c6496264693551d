//! Dumps the AST, NFA, or direct-built DFA for a single pattern as a
//! Graphviz `dot` graph.
use std::fs::File;
use std::io::{self, Write};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use refa::ast::annotate;
use refa::error::Limits;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Stage {
    Ast,
    Nfa,
    Dfa,
}

/// Compile a byte regex and emit a dot graph for one stage of the pipeline.
#[derive(Parser, Debug)]
#[command(name = "dotgen", version)]
struct Args {
    /// The pattern to compile.
    #[arg(long)]
    regex: String,

    /// Which stage of the pipeline to dump.
    #[arg(long, value_enum, default_value_t = Stage::Dfa)]
    r#type: Stage,

    /// Where to write the dot file; stdout if omitted.
    #[arg(long)]
    output: Option<String>,

    /// Annotate AST nodes with nullable/firstpos/lastpos/followpos.
    #[arg(long)]
    verbose: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    if let Err(err) = run(&args) {
        eprintln!("dotgen: {err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let pattern = args.regex.as_bytes();
    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout()),
    };

    match args.r#type {
        Stage::Ast => {
            let mut re = refa::parse(pattern)?;
            let tables = annotate(&mut re);
            re.write_dot(&mut out, args.verbose, Some(&tables))?;
        }
        Stage::Nfa => {
            let re = refa::parse(pattern)?;
            let nfa = refa::nfa_from_ast(&re, 0);
            nfa.write_dot(&mut out)?;
        }
        Stage::Dfa => {
            let dfa = refa::Dfa::from_pattern(pattern, 0, &Limits::default())?;
            dfa.write_dot(&mut out)?;
        }
    }

    Ok(())
}
