//! # Mill Host
//!
//! Command-line front end for the mill firmware core. Two modes:
//!
//! * `run` — an interactive serial-style session: type G-code on stdin,
//!   status frames come back on stdout, exactly as a host program would
//!   see them over the wire.
//! * `batch` — process a G-code file against the simulated machine and
//!   print the resulting step counts and final position, optionally
//!   dumping a JSON trace of every pulse and frame.
//!
//! Both modes drive the same motion core the firmware build uses; only the
//! board behind it is simulated.

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use mill_gcode::{Interpreter, LineReader};
use mill_motion::MachineModel;
use mill_persist::{MemoryStorage, PersistentStore};
use mill_sim::{MillHarness, SimBoard};

mod console;

use console::{ConsoleLink, LoggingPanel};

/// Motion-core host for a small five-axis CNC mill.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run an interactive G-code session against the simulated machine.
    Run(RunArgs),
    /// Process a G-code file in a batch and report what the machine did.
    Batch(BatchArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Home all axes before accepting commands.
    #[arg(long)]
    home: bool,
}

#[derive(Parser, Debug)]
struct BatchArgs {
    /// Path to the G-code file to process.
    #[arg(required = true)]
    gcode_file: PathBuf,

    /// Write a JSON trace of every step pulse and status frame here.
    #[arg(long)]
    trace: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run_session(args),
        Commands::Batch(args) => run_batch(args),
    }
}

/// The interactive loop: bytes from stdin through the line reader and
/// interpreter, frames to stdout.
fn run_session(args: RunArgs) -> Result<()> {
    let mut machine = MachineModel::new(SimBoard::new(), LoggingPanel);
    machine.startup();

    let (store, defaulted) = PersistentStore::open(MemoryStorage::blank());
    if defaulted {
        info!("persistent settings initialized with factory defaults");
    }
    machine.load_tables(store.wcs_table(), store.tool_table());

    let mut interp = Interpreter::new();
    let mut link = ConsoleLink::default();
    let mut reader = LineReader::new();

    let mut execute = |text: &str,
                       machine: &mut MachineModel<SimBoard, LoggingPanel>,
                       interp: &mut Interpreter,
                       link: &mut ConsoleLink,
                       reader: &mut LineReader| {
        for byte in text.bytes() {
            if let Some(command) = reader.feed(byte) {
                interp.process_line(command.as_str(), machine, link);
            }
        }
    };

    if args.home {
        info!("homing all axes");
        execute("G28\n", &mut machine, &mut interp, &mut link, &mut reader);
    }

    info!("session ready; type G-code, Ctrl-D ends");
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let mut line = line?;
        line.push('\n');
        execute(&line, &mut machine, &mut interp, &mut link, &mut reader);
        if machine.is_halted() {
            info!("machine halted; session over");
            break;
        }
    }

    Ok(())
}

/// Feed a whole file through the harness and summarize the run.
fn run_batch(args: BatchArgs) -> Result<()> {
    let text = std::fs::read_to_string(&args.gcode_file)
        .with_context(|| format!("failed to read G-code file {:?}", args.gcode_file))?;

    let mut mill = MillHarness::new();
    if args.trace.is_some() {
        mill.machine.board_mut().record_pulses = true;
    }

    info!(file = ?args.gcode_file, "processing");
    mill.feed(&text);
    if !text.ends_with('\n') {
        mill.feed("\n");
    }
    mill.run_until_idle();

    let position = mill.machine.local_position;
    println!(
        "final position: X{:.3} Y{:.3} Z{:.3} A{:.3} B{:.3} F{:.1}",
        position.x, position.y, position.z, position.a, position.b, position.f
    );
    let steps = mill.step_counts();
    println!(
        "step pulses:    X{} Y{} Z{} A{} B{}",
        steps[0], steps[1], steps[2], steps[3], steps[4]
    );

    let resends = mill.link.resends();
    if !resends.is_empty() {
        println!("resend requests: {:?}", resends);
    }
    if mill.link.has_fatal() {
        println!("fatal fault raised during the run");
    }

    if let Some(path) = args.trace {
        mill.dump_trace(&path)?;
        info!(path = %path.display(), "trace written");
    }

    Ok(())
}
