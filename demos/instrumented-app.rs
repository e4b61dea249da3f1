use std::process::ExitCode;

use log::error;
use mptrigger::config::Config;
use mptrigger::emitter::Emitter;
use mptrigger::sink::LoopbackSink;

fn main() -> ExitCode {
    let _logger = match mptrigger::logging::init() {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let sink = match Config::from_env().and_then(|config| LoopbackSink::new(&config)) {
        Ok(sink) => sink,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let mut emitter = Emitter::new(sink);
    let mut stdout = std::io::stdout();
    if let Err(e) = emitter.run(None, &mut stdout) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
