use clap::{Parser, Subcommand, ValueEnum};
use hpcbench::batch::{self, BatchArgs};
use hpcbench::collate;
use hpcbench::schema::{normalize_artifact, EnergyArtifact, LogArtifact};
use hpcbench::{Engine, Error, Tables};
use std::fs;
use std::path::PathBuf;

const LOG_TARGET: &str = "hpcbench";

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    /// No logging output
    None,
    /// Only error messages
    Error,
    /// Warning and error messages
    Warn,
    /// Info, warning, and error messages
    Info,
    /// Debug and above messages
    Debug,
    /// All messages including trace
    Trace,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse one engine log into a JSON artifact with normalized totals.
    Parse {
        #[arg(value_enum)]
        engine: Engine,

        #[arg(value_name = "LOG")]
        log: PathBuf,

        /// Write the parser's raw totals instead of normalizing them.
        #[arg(long, default_value_t = false)]
        keep: bool,
    },

    /// Dump the per-step energy terms of an AMBER or NAMD log.
    Energies {
        #[arg(value_enum)]
        engine: Engine,

        #[arg(value_name = "LOG")]
        log: PathBuf,
    },

    /// Normalize the totals of an existing artifact (or a bare totals object).
    Normalize {
        #[arg(value_name = "JSON")]
        input: PathBuf,
    },

    /// Parse every log of one engine under a directory, in parallel.
    ///
    /// Each log gets a `<log>.json` artifact beside it; logs that fail are
    /// reported and skipped. The JSON summary goes to `--out` or stdout.
    Batch {
        #[arg(value_enum)]
        engine: Engine,

        #[arg(value_name = "DIR")]
        root: PathBuf,

        /// Log file name to look for (defaults to the engine's usual name).
        #[arg(long, value_name = "FILE_NAME")]
        name: Option<String>,

        #[arg(long, default_value_t = false)]
        keep: bool,
    },

    /// Merge JSON files into one object keyed by path.
    Collate {
        #[arg(value_name = "FILE", num_args = 1.., required = true)]
        inputs: Vec<PathBuf>,

        /// Keep the input files (normally deleted once merged).
        #[arg(short, long, default_value_t = false)]
        save: bool,
    },

    /// Write `key:value` pairs as a JSON object.
    Extra {
        #[arg(short, long = "extra", value_name = "KEY:VALUE", action = clap::ArgAction::Append)]
        extra: Vec<String>,
    },

    /// Print the active unit, crosswalk and canonical tables.
    Tables,
}

#[derive(Parser, Debug)]
#[command(name = "hpcbench")]
#[command(about = "Parse and normalize molecular dynamics benchmark logs (JSON output)")]
#[command(version)]
struct Args {
    /// Where to write the JSON output. If omitted, prints to stdout.
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    /// Unit/crosswalk/canonical tables to use instead of the built-in ones.
    #[arg(long, value_name = "FILE", global = true)]
    tables: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogLevel::Warn, global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    cmd: Command,
}

fn init_logging(log_level: LogLevel) {
    let level = match log_level {
        LogLevel::None => return,
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);

    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(matches!(log_level, LogLevel::Debug | LogLevel::Trace))
        .init();
}

fn main() -> Result<(), Error> {
    let args = Args::parse();
    init_logging(args.log_level);

    let tables = match &args.tables {
        Some(path) => Tables::from_json_file(path)?,
        None => Tables::builtin(),
    };

    let output = match &args.cmd {
        Command::Parse { engine, log, keep } => LogArtifact::from_log_file(*engine, log, &tables, *keep)?.to_json()?,
        Command::Energies { engine, log } => serde_json::to_value(EnergyArtifact::from_log_file(*engine, log)?)?,
        Command::Normalize { input } => {
            let artifact = serde_json::from_str(&fs::read_to_string(input)?)?;
            normalize_artifact(artifact, &tables)?
        }
        Command::Batch {
            engine,
            root,
            name,
            keep,
        } => {
            let batch_args = BatchArgs {
                engine: *engine,
                root: root.clone(),
                log_name: name.clone(),
                keep: *keep,
            };
            let summary = batch::run(&batch_args, &tables)?;
            log::info!(target: LOG_TARGET, "{} written, {} failed", summary.written, summary.failed);
            serde_json::to_value(summary)?
        }
        Command::Collate { inputs, .. } => collate::collate(inputs)?,
        Command::Extra { extra } => collate::extra(extra)?,
        Command::Tables => serde_json::to_value(&tables)?,
    };

    let json = serde_json::to_string_pretty(&output)?;
    if let Some(out) = &args.out {
        fs::write(out, json)?;
    } else {
        println!("{json}");
    }

    // Inputs are only removed once the merged output exists.
    if let Command::Collate { inputs, save: false } = &args.cmd {
        let inputs: Vec<&PathBuf> = inputs.iter().filter(|p| Some(*p) != args.out.as_ref()).collect();
        collate::remove_inputs(&inputs)?;
    }

    Ok(())
}
