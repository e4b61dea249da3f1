use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;
use log::info;
use mptrigger::client;
use mptrigger::config::Config;
use mptrigger::subscriber::LoopbackService;

#[derive(Parser)]
#[command(name = "notification-client", version, about = "Print notifications of a trigger")]
struct Cli {
    /// Name of the trigger to subscribe to (may start with '-')
    #[arg(allow_hyphen_values = true)]
    trigger_name: String,
}

/// Parses `args`; on a usage error writes the usage to `diag` and returns
/// `None`.
fn parse_cli<I, T, W>(args: I, diag: &mut W) -> Option<Cli>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    W: Write,
{
    match Cli::try_parse_from(args) {
        Ok(cli) => Some(cli),
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(_) => {
            let _ = writeln!(diag, "Missing trigger name");
            let _ = writeln!(diag, "Usage: notification-client TRIGGER_NAME");
            None
        }
    }
}

fn main() -> ExitCode {
    let Some(cli) = parse_cli(std::env::args_os(), &mut std::io::stderr()) else {
        return ExitCode::FAILURE;
    };

    let _logger = match mptrigger::logging::init() {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let interrupt = mptrigger::signal::install();
    let mut service = LoopbackService::new(config).with_interrupt(interrupt);
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let result = client::run(&mut service, &cli.trigger_name, &mut stdout, &mut stderr);
    match &result {
        Ok(outcome) => info!("Client finished: {:?}", outcome),
        Err(e) => eprintln!("{e}"),
    }
    ExitCode::from(client::exit_code(&result))
}
