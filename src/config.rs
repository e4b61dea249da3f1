use crate::error::{Error, Result};
use std::time::Duration;

pub const DEFAULT_SESSION: &str = "mptrigger_sessiond";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

const SESSION_VAR: &str = "MPTRIGGER_SESSION";
const POLL_VAR: &str = "MPTRIGGER_POLL_MS";

/// Where the loopback daemon lives and how often channels re-check it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub session: String,
    pub poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            session: DEFAULT_SESSION.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();
        if let Some(session) = lookup(SESSION_VAR) {
            if session.is_empty() || session.contains('/') {
                return Err(Error::config(format!(
                    "{SESSION_VAR} must be a non-empty name without '/'"
                )));
            }
            config.session = session;
        }
        if let Some(poll) = lookup(POLL_VAR) {
            let millis: u64 = poll
                .parse()
                .map_err(|e| Error::config(format!("{POLL_VAR}={poll}: {e}")))?;
            if millis == 0 {
                return Err(Error::config(format!("{POLL_VAR} must be positive")));
            }
            config.poll_interval = Duration::from_millis(millis);
        }
        Ok(config)
    }

    pub fn with_session(mut self, session: Option<String>) -> Self {
        if let Some(session) = session {
            self.session = session;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        assert_eq!(lookup(&[]).unwrap(), Config::default());
    }

    #[test]
    fn test_overrides() {
        let config = lookup(&[(SESSION_VAR, "other"), (POLL_VAR, "20")]).unwrap();
        assert_eq!(config.session, "other");
        assert_eq!(config.poll_interval, Duration::from_millis(20));
        assert_eq!(
            config.with_session(Some("cli".to_string())).session,
            "cli"
        );
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(lookup(&[(POLL_VAR, "soon")]), Err(Error::Config { .. })));
        assert!(lookup(&[(POLL_VAR, "0")]).is_err());
        assert!(lookup(&[(SESSION_VAR, "a/b")]).is_err());
    }
}
