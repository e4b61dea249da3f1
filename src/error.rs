//! Error types shared by the client, the emitter and the loopback backend.

/// Failures reported by a notification channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("unknown condition {0}")]
    UnknownCondition(u64),

    #[error("corrupt notification record at sequence {0}")]
    CorruptRecord(u64),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to create notification channel: {message}")]
    ChannelCreate { message: String },

    #[error("Failed to list triggers: {message}")]
    ListTriggers { message: String },

    #[error("Failed to get action count from action group")]
    ActionGroupCount,

    #[error("Failed to get type of action #{index} of action group")]
    ActionGroupMember { index: usize },

    #[error("Failed to subscribe to notifications of trigger \"{trigger}\": {source}")]
    Subscribe {
        trigger: String,
        #[source]
        source: ChannelError,
    },

    #[error("A communication error occurred on the notification channel: {source}")]
    Communication {
        #[from]
        source: ChannelError,
    },

    #[error("Failed to get trigger name of event rule notification")]
    TriggerName,

    #[error("Shared memory error: {message}")]
    SharedMemory { message: String },

    #[error("Trigger registry error: {message}")]
    Registry { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Logger error: {source}")]
    Logger {
        #[from]
        source: flexi_logger::FlexiLoggerError,
    },

    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn shared_memory<S: Into<String>>(message: S) -> Self {
        Self::SharedMemory {
            message: message.into(),
        }
    }

    pub fn registry<S: Into<String>>(message: S) -> Self {
        Self::Registry {
            message: message.into(),
        }
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
