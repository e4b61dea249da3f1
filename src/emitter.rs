use crate::service::{EventSink, Tracepoint};
use crate::timestamp;
use log::trace;
use std::io::{self, Write};
use std::time::Duration;

pub const MY_EVENT: Tracepoint = Tracepoint {
    provider: "trigger_exemple",
    name: "my_event",
};

pub const EMIT_INTERVAL: Duration = Duration::from_secs(2);

/// Raises one tracepoint per interval and logs each raise.
pub struct Emitter<S: EventSink> {
    sink: S,
    tracepoint: Tracepoint,
    interval: Duration,
}

impl<S: EventSink> Emitter<S> {
    pub fn new(sink: S) -> Self {
        Emitter {
            sink,
            tracepoint: MY_EVENT,
            interval: EMIT_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn get_sink(&self) -> &S {
        &self.sink
    }

    pub fn emit_once<W: Write>(&mut self, iteration: u64, out: &mut W) -> io::Result<()> {
        writeln!(
            out,
            "{} - Tracing event \"{}\" (iteration {})",
            timestamp::now(),
            self.tracepoint,
            iteration
        )?;
        out.flush()?;
        trace!("Raising {} #{}", self.tracepoint, iteration);
        self.sink.raise(&self.tracepoint, iteration);
        Ok(())
    }

    /// Runs `iterations` rounds, or until the counter wraps when `None`.
    pub fn run<W: Write>(&mut self, iterations: Option<u64>, out: &mut W) -> io::Result<u64> {
        let end = iterations.unwrap_or(u64::MAX);
        let mut i = 0;
        while i < end {
            self.emit_once(i, out)?;
            std::thread::sleep(self.interval);
            i += 1;
        }
        Ok(i)
    }
}
