const MAX_TRIGGERS: usize = 32;
const MAX_NAME_SIZE: usize = 64;
const MAX_GROUP_ACTIONS: usize = 8;
const RING_CAPACITY: usize = 64;

pub mod client;
pub mod config;
pub mod coordinator;
pub mod directory;
pub mod doorbell;
pub mod emitter;
pub mod error;
pub mod logging;
pub mod model;
pub mod selector;
pub mod service;
pub mod signal;
pub mod sink;
pub mod subscriber;
pub mod timestamp;

pub use error::{ChannelError, Error, Result};
