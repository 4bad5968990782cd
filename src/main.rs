use std::fs;
use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{bail, WrapErr};
use simplelog::LevelFilter;

use leak_sat::cnf::Cnf;
use leak_sat::dot::to_dot;
use leak_sat::processor::StatementProcessor;
use leak_sat::source::Program;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// Program to analyze (JSON statement source).
    #[arg(value_name = "FILE")]
    path: PathBuf,

    /// Increase log verbosity (-v: info, -vv: debug, -vvv: trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Write one DOT file per final graph into this directory.
    #[arg(long, value_name = "DIR")]
    dot: Option<PathBuf>,

    /// Print the final CNF of every graph in DIMACS format.
    #[arg(long)]
    dimacs: bool,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Cli::parse();

    let level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    simplelog::TermLogger::init(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let program = Program::load(&args.path).wrap_err_with(|| format!("failed to load {}", args.path.display()))?;
    println!("Loaded {} statement(s) from {}", program.len(), args.path.display());

    let mut processor = StatementProcessor::new();
    let summary = processor.run(&program);
    println!("{}", summary);

    if args.dimacs {
        for graph in processor.registry().iter() {
            println!("c graph {}", graph.name());
            for node in graph.nodes() {
                println!("c {} = {}", node.position().var(), node.name());
            }
            print!("{}", Cnf::from_graph(graph).to_dimacs());
        }
    }

    if let Some(dir) = &args.dot {
        fs::create_dir_all(dir).wrap_err_with(|| format!("failed to create {}", dir.display()))?;
        for graph in processor.registry().iter() {
            let path = dir.join(format!("{}.dot", graph.name()));
            fs::write(&path, to_dot(graph)?).wrap_err_with(|| format!("failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
    }

    let time_total = time_total.elapsed();
    println!("\nAll done in {:.3} s", time_total.as_secs_f64());

    if summary.has_error {
        match summary.first_error() {
            Some(error) => bail!("analysis stopped: {}", error),
            None => bail!("analysis stopped"),
        }
    }
    Ok(())
}
