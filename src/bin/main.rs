//! querybridge CLI - run engine operations from the command line
//!
//! Usage:
//!   querybridge <parse|deparse|fingerprint|normalize|plpgsql|scan|split> [FILE]
//!
//! Examples:
//!   querybridge parse query.sql
//!   echo "select * from users where id = 7" | querybridge normalize
//!   querybridge parse query.sql > tree.json && querybridge deparse tree.json
//!   querybridge --async scan query.sql

use std::cell::RefCell;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;

use clap::{ArgAction, Parser, Subcommand};
use querybridge::bridge::{BridgeError, BridgeResult, ControlContext};
use querybridge::config::{Settings, SettingsError};
use querybridge::engine::StatementRange;
use querybridge::envelope::{format_sql_error, ErrorEnvelope, ErrorKind, FormatOptions};

#[derive(Parser)]
#[command(name = "querybridge")]
#[command(about = "Parse, deparse, fingerprint, normalize, split and scan PostgreSQL")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Run the job on the background pool and deliver it through the control context
    #[arg(long = "async", global = true)]
    use_async: bool,

    /// Settings file (defaults to $QUERYBRIDGE_CONFIG or the standard locations)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Colorize error reports
    #[arg(long, global = true)]
    color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse SQL into a JSON parse tree
    Parse {
        /// Input file (stdin when omitted)
        file: Option<PathBuf>,
    },

    /// Turn a JSON parse tree back into SQL
    Deparse {
        /// Parse tree JSON file (stdin when omitted)
        file: Option<PathBuf>,
    },

    /// Print the query fingerprint
    Fingerprint { file: Option<PathBuf> },

    /// Replace constants with $n parameters
    Normalize { file: Option<PathBuf> },

    /// Extract PL/pgSQL function definitions
    Plpgsql { file: Option<PathBuf> },

    /// Print the token document
    Scan { file: Option<PathBuf> },

    /// Print statement locations
    Split { file: Option<PathBuf> },
}

#[derive(Clone, Copy)]
enum Operation {
    Parse,
    Deparse,
    Fingerprint,
    Normalize,
    Plpgsql,
    Scan,
    Split,
}

impl Commands {
    fn into_parts(self) -> (Operation, Option<PathBuf>) {
        match self {
            Commands::Parse { file } => (Operation::Parse, file),
            Commands::Deparse { file } => (Operation::Deparse, file),
            Commands::Fingerprint { file } => (Operation::Fingerprint, file),
            Commands::Normalize { file } => (Operation::Normalize, file),
            Commands::Plpgsql { file } => (Operation::Plpgsql, file),
            Commands::Scan { file } => (Operation::Scan, file),
            Commands::Split { file } => (Operation::Split, file),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match load_settings(cli.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            return ExitCode::from(BridgeError::from(e).exit_code());
        }
    };

    let mut logging = settings.logging.clone();
    logging.json |= cli.log_json;
    if let Err(e) = querybridge::logging::init(&logging, cli.verbose) {
        eprintln!("Warning: logging unavailable: {}", e);
    }

    let (operation, file) = cli.command.into_parts();
    let input = match read_input(file.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(e.exit_code());
        }
    };

    let mut ctx = match ControlContext::from_settings(&settings) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(e.exit_code());
        }
    };

    let result = if cli.use_async {
        run_async(&mut ctx, operation, &input)
    } else {
        run_sync(&ctx, operation, &input)
    };

    match result {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(err) => {
            let options = FormatOptions {
                color: cli.color,
                ..FormatOptions::default()
            };
            eprintln!("{}", format_sql_error(&err, &input, &options));
            ExitCode::FAILURE
        }
    }
}

fn load_settings(path: Option<&Path>) -> Result<Settings, SettingsError> {
    match path {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    }
}

fn read_input(file: Option<&Path>) -> BridgeResult<String> {
    let mut input = match file {
        Some(path) => fs::read_to_string(path).map_err(BridgeError::ReadInput)?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .map_err(BridgeError::ReadInput)?;
            buf
        }
    };
    input.truncate(input.trim_end_matches(['\n', '\r']).len());
    Ok(input)
}

fn run_sync(ctx: &ControlContext, operation: Operation, input: &str) -> Result<String, ErrorEnvelope> {
    match operation {
        Operation::Parse => ctx.parse_sync(input).into_result(),
        Operation::Deparse => ctx.deparse_json_sync(input).into_result(),
        Operation::Fingerprint => ctx.fingerprint_sync(input).into_result(),
        Operation::Normalize => ctx.normalize_sync(input).into_result(),
        Operation::Plpgsql => ctx.parse_plpgsql_sync(input).into_result(),
        Operation::Scan => ctx.scan_sync(input).into_result(),
        Operation::Split => ctx.split_sync(input).into_result().and_then(render_ranges),
    }
}

fn run_async(
    ctx: &mut ControlContext,
    operation: Operation,
    input: &str,
) -> Result<String, ErrorEnvelope> {
    let slot: Rc<RefCell<Option<Result<String, ErrorEnvelope>>>> = Rc::default();
    let out = Rc::clone(&slot);
    let store = move |result| *out.borrow_mut() = Some(result);

    match operation {
        Operation::Parse => ctx.parse_async(input, move |env| store(env.into_result())),
        Operation::Deparse => ctx.deparse_json_async(input, move |env| store(env.into_result())),
        Operation::Fingerprint => ctx.fingerprint_async(input, move |env| store(env.into_result())),
        Operation::Normalize => ctx.normalize_async(input, move |env| store(env.into_result())),
        Operation::Plpgsql => ctx.parse_plpgsql_async(input, move |env| store(env.into_result())),
        Operation::Scan => ctx.scan_async(input, move |env| store(env.into_result())),
        Operation::Split => ctx.split_async(input, move |env| {
            store(env.into_result().and_then(render_ranges))
        }),
    };
    ctx.block_until_idle();

    let result = slot.borrow_mut().take();
    result.unwrap_or_else(|| Err(ErrorEnvelope::execution_aborted()))
}

fn render_ranges(ranges: Vec<StatementRange>) -> Result<String, ErrorEnvelope> {
    serde_json::to_string_pretty(&serde_json::json!({ "stmts": ranges }))
        .map_err(|e| ErrorEnvelope::new(ErrorKind::Internal, e.to_string()))
}
