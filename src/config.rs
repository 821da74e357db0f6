use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::relay::RelaySettings;

#[derive(Parser, Debug, Clone)]
#[command(name = "webrelay")]
#[command(about = "HTTP polling gateway for a line-oriented TCP chat server")]
#[command(version)]
pub struct Config {
    /// Remote chat server host
    #[arg(long, env = "WEBRELAY_REMOTE_HOST", default_value = "127.0.0.1")]
    pub remote_host: String,

    /// Remote chat server port
    #[arg(long, env = "WEBRELAY_REMOTE_PORT", default_value_t = 42439)]
    pub remote_port: u16,

    /// HTTP listen address
    #[arg(long, env = "WEBRELAY_LISTEN", default_value = "0.0.0.0:8030")]
    pub listen: String,

    /// Seconds without a chat poll before a session's connection is dropped
    #[arg(long, env = "WEBRELAY_IDLE_TIMEOUT_SECS", default_value_t = 180)]
    pub idle_timeout_secs: u64,

    /// Seconds between keep-alive lines
    #[arg(long, env = "WEBRELAY_HEARTBEAT_SECS", default_value_t = 5)]
    pub heartbeat_secs: u64,

    /// Upper bound on a single socket read, in milliseconds
    #[arg(long, env = "WEBRELAY_READ_POLL_MS", default_value_t = 500)]
    pub read_poll_ms: u64,

    /// Upper bound on a single outbound write, in milliseconds
    #[arg(long, env = "WEBRELAY_WRITE_TIMEOUT_MS", default_value_t = 1000)]
    pub write_timeout_ms: u64,

    /// Seconds without a chat poll before a dead session is evicted (0 = never)
    #[arg(long, env = "WEBRELAY_DEAD_SESSION_GRACE_SECS", default_value_t = 600)]
    pub dead_session_grace_secs: u64,

    /// Directory holding index.html and send_input.html
    #[arg(long, env = "WEBRELAY_TEMPLATES", default_value = "templates")]
    pub templates: PathBuf,

    /// Base log level (trace, debug, info, warn, error)
    #[arg(long, env = "WEBRELAY_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format: "pretty" or "json"
    #[arg(long, env = "WEBRELAY_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

impl Config {
    pub fn remote_addr(&self) -> String {
        format!("{}:{}", self.remote_host, self.remote_port)
    }

    pub fn relay_settings(&self) -> RelaySettings {
        RelaySettings {
            remote_addr: self.remote_addr(),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            heartbeat_interval: Duration::from_secs(self.heartbeat_secs),
            read_poll: Duration::from_millis(self.read_poll_ms),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            dead_session_grace: (self.dead_session_grace_secs > 0)
                .then(|| Duration::from_secs(self.dead_session_grace_secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_remote_protocol() {
        let config = Config::try_parse_from(["webrelay"]).unwrap();
        let settings = config.relay_settings();

        assert_eq!(settings.remote_addr, "127.0.0.1:42439");
        assert_eq!(settings.idle_timeout, Duration::from_secs(180));
        assert_eq!(settings.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(settings.read_poll, Duration::from_millis(500));
        assert_eq!(settings.write_timeout, Duration::from_millis(1000));
        assert_eq!(settings.dead_session_grace, Some(Duration::from_secs(600)));
    }

    #[test]
    fn zero_grace_keeps_dead_sessions() {
        let config = Config::try_parse_from([
            "webrelay",
            "--remote-host",
            "chat.example.net",
            "--remote-port",
            "7000",
            "--dead-session-grace-secs",
            "0",
        ])
        .unwrap();

        let settings = config.relay_settings();
        assert_eq!(settings.remote_addr, "chat.example.net:7000");
        assert_eq!(settings.dead_session_grace, None);
    }
}
