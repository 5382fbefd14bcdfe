use std::path::PathBuf;


#[derive(clap::Parser)]
#[command(version, about)]
pub struct Cli {
    #[clap(subcommand)]
    pub cmd: Command,

    /// Specifies config file location. Default locations are: 'config.toml'
    /// and '/etc/velotest/config.toml'. Can also be set via env
    /// `VELOTEST_CONFIG_PATH`.
    #[clap(long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Starts the load test and runs it until `load.run_time` has elapsed or
    /// CTRL+C is pressed.
    Run,

    /// Checks the config and performs a single authentication call against
    /// the target. Useful to run before starting a long load test.
    Check,

    /// Outputs a template of the configuration, including all config options
    /// with descriptions, great as a starting point.
    GenConfigTemplate {
        /// File to write it to. If unspecified, written to stdout.
        #[clap(short, long)]
        out: Option<PathBuf>,
    },
}
