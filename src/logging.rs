use crate::error::Result;
use flexi_logger::{Logger, LoggerHandle};

/// Starts logging to stderr. `RUST_LOG` overrides the default `warn` level.
pub fn init() -> Result<LoggerHandle> {
    let handle = Logger::try_with_env_or_str("warn")?
        .log_to_stderr()
        .format(flexi_logger::detailed_format)
        .start()?;
    Ok(handle)
}
