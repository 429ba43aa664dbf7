//! Thin CLI driver: parse arguments, load an AAG file, run the selected
//! engine, print the verdict. Grounded in `chalk-repl/src/main.rs`'s
//! `run() -> Fallible<()>` plus exit-code-converting `main()` shape, with
//! `clap` derive in place of `docopt` (not otherwise present in this
//! corpus) and `anyhow` in place of `failure`.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use aigc_bmc::Bmc;
use aigc_ir::FormulaManager;
use aigc_pdr::Pdr;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Engine {
    Bmc,
    KInd,
    Pdr,
}

/// Safety property model checker for AIG/AAG sequential circuits.
#[derive(Parser, Debug)]
#[command(name = "aigc", version, about)]
struct Cli {
    /// Path to the AAG (ASCII AIGER) input file.
    #[arg(long)]
    aag: PathBuf,

    /// Verification engine to use.
    #[arg(long, value_enum, default_value = "bmc")]
    engine: Engine,

    /// Unrolling bound for plain BMC (ignored by k-induction and PDR).
    #[arg(long, default_value_t = 10)]
    k: usize,

    /// Maximum number of frames PDR may build before giving up.
    #[arg(long, default_value_t = 1000)]
    max_frames: usize,

    /// Increase log verbosity; repeatable (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit the structured result as JSON on stdout instead of plain text.
    #[arg(long)]
    json: bool,
}

fn init_logging(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(cli: &Cli) -> Result<aigc_ir::VerificationResult> {
    let cfg = z3::Config::new();
    let ctx = z3::Context::new(&cfg);
    let fm = FormulaManager::new(&ctx);

    let ts = aigc_frontend::load(&fm, &cli.aag)
        .with_context(|| format!("failed to load {}", cli.aag.display()))?;

    let result = match cli.engine {
        Engine::Bmc => Bmc::new(&ts, &fm).run(false, cli.k),
        Engine::KInd => Bmc::new(&ts, &fm).run(true, cli.k),
        Engine::Pdr => Pdr::new(&ts, &fm).run(cli.max_frames),
    };
    Ok(result)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match run(&cli) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::from(2);
        }
    };

    if cli.json {
        match serde_json::to_string_pretty(&result) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("error: failed to serialize result: {e}");
                return ExitCode::from(2);
            }
        }
    } else {
        println!("{}", result.headline());
        println!("{}", result.message);
        if !result.trace.is_empty() {
            for (step, state) in result.trace.iter().enumerate() {
                let assignment: Vec<String> = state
                    .values
                    .iter()
                    .map(|(name, value)| format!("{name}={value}"))
                    .collect();
                println!("  step {step}: {}", assignment.join(", "));
            }
        }
    }

    ExitCode::from(result.exit_code() as u8)
}
