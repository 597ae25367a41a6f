use std::convert::TryFrom;
use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};

use mpcirc::{
    builder::Role,
    clear::ClearBuilder,
    definitions::net,
    program::{self, ProgramDir},
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Interpret a compiled two-party program.
    Mpc,
}

/// Interpreter turning compiled mixed-sharing bytecode into an executed
/// circuit.
#[derive(Parser, Debug)]
#[command(name = "mpcirc")]
struct Args {
    /// Mode for parsing test inputs
    #[arg(short, long, value_enum)]
    mode: Mode,

    /// Role: 0 = server, 1 = client
    #[arg(short, long)]
    role: u8,

    /// Program directory holding the bytecode files and the share map
    #[arg(short = 'f', long = "file")]
    file: PathBuf,

    /// Test inputs
    #[arg(short, long)]
    test: PathBuf,

    /// Counterparty address
    #[arg(short, long, default_value = net::DEFAULT_ADDRESS)]
    address: String,

    /// Port both parties rendezvous on
    #[arg(short, long, default_value_t = net::DEFAULT_PORT)]
    port: u16,
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(err) = try_main(args) {
        eprintln!("{}", err);
        process::exit(1);
    }
}

fn try_main(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    log::debug!("running in {:?} mode", args.mode);
    log::info!(
        "transport endpoint {}:{} (gates run on the local cleartext backend)",
        args.address,
        args.port
    );

    let role = Role::try_from(args.role)?;
    let params = program::load_test_inputs(&args.test)?;
    let dir = ProgramDir::open(&args.file)?;

    mpcirc::run(ClearBuilder::new(), dir, params, role)?;
    Ok(())
}
