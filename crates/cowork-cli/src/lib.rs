// ABOUTME: Library half of the cowork CLI
// ABOUTME: Argument definitions and the uri/check commands

pub mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cowork_session::{Options, CONNECT_ACTION};
use cowork_ssh::HostKeySet;
use tracing::debug;

use crate::config::SessionArgs;

#[derive(Parser, Debug)]
#[command(name = "cowork")]
#[command(about = "Inspect cowork relay session parameters")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub session: SessionArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the relay websocket URL for an action
    Uri {
        /// Relay action name
        #[arg(long, default_value = CONNECT_ACTION)]
        action: String,
    },

    /// Validate the session parameters and list host key fingerprints
    Check,
}

/// Run the parsed command, returning what to print.
pub fn run(cli: &Cli) -> Result<String> {
    let opts = cli.session.resolve()?;
    debug!(?opts, "resolved session options");

    match &cli.command {
        Commands::Uri { action } => uri(&opts, action),
        Commands::Check => check(&opts),
    }
}

fn uri(opts: &Options, action: &str) -> Result<String> {
    opts.uri(action).context("Invalid session parameters")
}

fn check(opts: &Options) -> Result<String> {
    opts.validate().context("Invalid session parameters")?;
    let host_keys =
        HostKeySet::parse(&opts.host_public_keys).context("Invalid host public key")?;

    let mut lines = vec![format!(
        "session {} for {}: ok",
        opts.session_id, opts.client_name
    )];
    if opts.session_token.is_empty() {
        lines.push("warning: no session token set".to_string());
    }
    if host_keys.is_empty() {
        lines.push("warning: no host keys, every host will be rejected".to_string());
    }
    for fingerprint in host_keys.fingerprints() {
        lines.push(format!("host key SHA256:{}", fingerprint));
    }
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_uri_defaults_to_connect() {
        let cli = parse(&[
            "cowork",
            "uri",
            "--client-name",
            "gh",
            "--session-id",
            "S1",
            "--relay-sas",
            "sig=1",
            "--relay-endpoint",
            "sb://x.servicebus.windows.net/",
        ]);
        assert!(matches!(&cli.command, Commands::Uri { action } if action == "connect"));

        let out = run(&cli).unwrap();
        assert_eq!(
            out,
            "wss://x.servicebus.windows.net:443/$hc/?sb-hc-action=connect&sb-hc-token=sig%3D1"
        );
    }

    #[test]
    fn test_uri_custom_action() {
        let cli = parse(&[
            "cowork",
            "--client-name=gh",
            "--session-id=S1",
            "--relay-sas=s",
            "--relay-endpoint=http://localhost.net/",
            "uri",
            "--action",
            "listen",
        ]);
        let out = run(&cli).unwrap();
        assert_eq!(
            out,
            "ws://localhost.net:443/$hc/?sb-hc-action=listen&sb-hc-token=s"
        );
    }

    #[test]
    fn test_check_reports_missing_field() {
        let opts = Options {
            client_name: "gh".to_string(),
            session_id: "S1".to_string(),
            relay_sas: "sig".to_string(),
            ..Default::default()
        };
        let err = check(&opts).unwrap_err();
        assert!(format!("{:#}", err).contains("relay_endpoint is required"));
    }

    #[test]
    fn test_check_warns_without_host_keys() {
        let opts = Options {
            client_name: "gh".to_string(),
            session_id: "S1".to_string(),
            relay_sas: "sig".to_string(),
            relay_endpoint: "sb://x.servicebus.windows.net/".to_string(),
            ..Default::default()
        };
        let out = check(&opts).unwrap();
        assert!(out.starts_with("session S1 for gh: ok"));
        assert!(out.contains("no session token"));
        assert!(out.contains("no host keys"));
    }
}
