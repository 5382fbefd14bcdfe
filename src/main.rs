use std::{fs, io::{self, Write}};

use clap::Parser as _;
use goose::{GooseAttack, config::GooseConfiguration};

use crate::{cli::{Cli, Command}, prelude::*};


mod auth;
mod cli;
mod config;
mod log;
mod prelude;
mod scenario;
#[cfg(test)]
mod testing;
mod util;


#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match &cli.cmd {
        Command::Run => run(&cli).await?,

        Command::Check => check(&cli).await?,

        Command::GenConfigTemplate { out } => {
            let template = config::template();
            match out {
                Some(path) => fs::write(path, &template)?,
                None => io::stdout().write_all(template.as_bytes())?,
            }
        }
    }

    Ok(())
}

/// Starts the actual load test. Scheduling, weighted task selection and
/// metrics are goose's job; we only translate our config and register the
/// scenario.
async fn run(cli: &Cli) -> Result<()> {
    let config = config::load(cli.config.as_deref())?;
    log::init(&config.log)?;
    warn_if_insecure_tls(&config.target);

    info!(
        "starting load test against {} with {} users",
        config.target.host,
        config.load.users,
    );

    let mut goose_config = GooseConfiguration::default();
    goose_config.host = config.target.host.to_string();
    goose_config.users = Some(config.load.users);
    goose_config.run_time = format!("{}s", config.load.run_time.as_secs());
    if let Some(hatch_rate) = config.load.hatch_rate {
        goose_config.hatch_rate = Some(hatch_rate.to_string());
    }

    GooseAttack::initialize_with_config(goose_config)?
        .register_scenario(scenario::build(&config)?)
        .execute()
        .await?;

    Ok(())
}

/// Verifies config and credentials by performing a single authentication
/// call, without starting the load test.
async fn check(cli: &Cli) -> Result<()> {
    let config = config::load(cli.config.as_deref())?;
    log::init(&config.log)?;
    warn_if_insecure_tls(&config.target);

    let client = util::client_builder(config.target.accept_invalid_certs)
        .build()
        .context("failed to build HTTP client")?;
    let token = auth::fetch_token(&client, &config.target.host, &config.auth).await?;
    info!("obtained access token ({} bytes)", token.len());

    println!("Checks passed: authentication against {} succeeded.", config.target.host);
    Ok(())
}

/// Every subcommand that talks to the target goes through this, so nobody
/// runs with disabled certificate checks unannounced.
fn warn_if_insecure_tls(target: &config::TargetConfig) {
    if target.accept_invalid_certs {
        warn!("TLS certificate verification is DISABLED for all requests");
    }
}


#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use crate::config::{TargetConfig, TargetHost};

    use super::*;

    #[derive(Clone)]
    struct BufWriter(Arc<Mutex<Vec<u8>>>);

    impl io::Write for BufWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Runs `f` with a subscriber writing into a buffer and returns the
    /// captured log output.
    fn capture_logs(f: impl FnOnce()) -> String {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let writer = BufWriter(Arc::clone(&buffer));
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, f);

        let buffer = buffer.lock().unwrap();
        String::from_utf8_lossy(&buffer).into_owned()
    }

    fn target(accept_invalid_certs: bool) -> TargetConfig {
        TargetConfig {
            host: TargetHost::try_from("https://localhost:3000".to_owned()).unwrap(),
            accept_invalid_certs,
        }
    }

    #[test]
    fn disabled_tls_verification_is_warned_about() {
        let logs = capture_logs(|| warn_if_insecure_tls(&target(true)));
        assert!(logs.contains("WARN"), "unexpected log output: {logs}");
        assert!(logs.contains("TLS certificate verification is DISABLED"));
    }

    #[test]
    fn strict_tls_verification_is_silent() {
        let logs = capture_logs(|| warn_if_insecure_tls(&target(false)));
        assert_eq!(logs, "");
    }
}
