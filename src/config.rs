//! Configuration parsing and validation for the mock server
//!
//! This module handles command-line argument parsing and validation using clap.
use anthropic_mock::MockOptions;
use anthropic_mock::contract::DEFAULT_BODY_LIMIT;
use anthropic_mock::messages::DEFAULT_REPLY_TEXT;
use anyhow::anyhow;
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// The address the mock server binds to.
    #[arg(long, env = "ANTHROPIC_MOCK_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// The port on which the mock server will listen. Use 0 for an ephemeral port.
    #[arg(short = 'p', long, env = "ANTHROPIC_MOCK_PORT", default_value_t = 3000)]
    pub port: u16,

    /// The assistant text returned for every request.
    #[arg(long, default_value = DEFAULT_REPLY_TEXT)]
    pub reply_text: String,

    /// Largest accepted request body, in bytes.
    #[arg(long, default_value_t = DEFAULT_BODY_LIMIT)]
    pub max_body_bytes: usize,

    /// Whether to enable the metrics endpoint.
    #[arg(short = 'm', long, default_value_t = false)]
    pub metrics: bool,

    /// The port on which the metrics server will listen.
    #[arg(long, default_value_t = 9090)]
    pub metrics_port: u16,

    /// The prefix to use for metrics.
    #[arg(long, default_value = "anthropic_mock")]
    pub metrics_prefix: String,

    /// Log at debug level for this crate.
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl Config {
    pub fn validate(self) -> Result<Self, anyhow::Error> {
        if self.reply_text.is_empty() {
            return Err(anyhow!("--reply-text must not be empty"));
        }
        if self.max_body_bytes == 0 {
            return Err(anyhow!("--max-body-bytes must be greater than zero"));
        }
        if self.metrics && self.port != 0 && self.metrics_port == self.port {
            return Err(anyhow!(
                "Metrics port {} collides with the server port",
                self.metrics_port
            ));
        }
        Ok(self)
    }

    pub fn mock_options(&self) -> MockOptions {
        MockOptions::builder()
            .reply_text(self.reply_text.clone())
            .body_limit(self.max_body_bytes)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("anthropic-mock").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]).validate().unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.reply_text, "Hello world!");
        assert!(!config.metrics);

        let options = config.mock_options();
        assert_eq!(options.body_limit, DEFAULT_BODY_LIMIT);
    }

    #[test]
    fn test_overrides() {
        let config = parse(&["-p", "0", "--reply-text", "Hi", "--max-body-bytes", "64"])
            .validate()
            .unwrap();
        assert_eq!(config.port, 0);
        assert_eq!(config.mock_options().reply_text, "Hi");
        assert_eq!(config.mock_options().body_limit, 64);
    }

    #[test]
    fn test_rejects_empty_reply_text() {
        assert!(parse(&["--reply-text", ""]).validate().is_err());
    }

    #[test]
    fn test_rejects_zero_body_limit() {
        assert!(parse(&["--max-body-bytes", "0"]).validate().is_err());
    }

    #[test]
    fn test_rejects_colliding_metrics_port() {
        let result = parse(&["-m", "-p", "9000", "--metrics-port", "9000"]).validate();
        assert!(result.is_err());
    }
}
