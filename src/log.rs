use std::{collections::HashMap, fs::OpenOptions, path::PathBuf};

use serde::Deserialize;
use tracing_subscriber::{
    filter::{FilterFn, LevelFilter},
    prelude::*,
};

use crate::prelude::*;


#[derive(Debug, confique::Config)]
pub(crate) struct LogConfig {
    /// Specifies what log messages to emit, based on the module path and log
    /// level.
    ///
    /// This is a map where the key specifies a module path prefix, and the
    /// value specifies a minimum log level. For each log message, the map
    /// entry with the longest prefix matching the log's module path is
    /// chosen. If no such entry exists, the log is not emitted. Valid log
    /// levels: off, error, warn, info, debug, trace.
    ///
    /// Example: only allow ≥"info" logs from velotest generally, but also
    /// ≥"debug" messages from the harness:
    ///
    ///    [log]
    ///    filters.velotest = "info"
    ///    filters.goose = "debug"
    #[config(default = { "velotest": "info" })]
    pub(crate) filters: Filters,

    /// If this is set, log messages are also written to this file.
    pub(crate) file: Option<PathBuf>,

    /// If this is set to `false`, log messages are not written to stdout.
    #[config(default = true)]
    pub(crate) stdout: bool,
}

#[derive(Debug, Deserialize)]
#[serde(try_from = "HashMap<String, String>")]
pub(crate) struct Filters(pub(crate) HashMap<String, LevelFilter>);

impl TryFrom<HashMap<String, String>> for Filters {
    type Error = String;
    fn try_from(value: HashMap<String, String>) -> Result<Self, Self::Error> {
        value.into_iter()
            .map(|(target_prefix, level)| {
                let level = parse_level_filter(&level)?;
                Ok((target_prefix, level))
            })
            .collect::<Result<_, _>>()
            .map(Self)
    }
}

fn parse_level_filter(s: &str) -> Result<LevelFilter, String> {
    match s {
        "off" => Ok(LevelFilter::OFF),
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" => Ok(LevelFilter::WARN),
        "error" => Ok(LevelFilter::ERROR),
        other => Err(format!("invalid log level '{other}'")),
    }
}

pub(crate) fn init(config: &LogConfig) -> Result<()> {
    let filters = config.filters.0.clone();
    let max_level = filters.values().max().copied().unwrap_or(LevelFilter::OFF);
    let filter = FilterFn::new(move |metadata| {
        // Longest matching prefix wins. The number of entries is expected to
        // be tiny, so a linear scan is fine.
        let target = metadata.target();
        filters.iter()
            .filter(|(target_prefix, _)| target.starts_with(target_prefix.as_str()))
            .max_by_key(|(target_prefix, _)| target_prefix.len())
            .is_some_and(|(_, level_filter)| metadata.level() <= level_filter)
    }).with_max_level_hint(max_level);

    let stdout_output = config.stdout
        .then(|| tracing_subscriber::fmt::layer());

    let file_output = config.file.as_ref().map(|path| {
        use std::io::Write;

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .with_context(|| format!("failed to open/create log file '{}'", path.display()))?;

        // Empty line separator to make process restarts visible.
        file.write_all(b"\n\n").context("could not write to log file")?;

        anyhow::Ok(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file))
    }).transpose()?;

    tracing_subscriber::registry()
        .with(filter)
        .with(file_output)
        .with(stdout_output)
        .init();

    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_filters_parse() {
        let raw = HashMap::from([
            ("velotest".to_owned(), "trace".to_owned()),
            ("goose".to_owned(), "warn".to_owned()),
        ]);
        let filters = Filters::try_from(raw).unwrap();
        assert_eq!(filters.0["velotest"], LevelFilter::TRACE);
        assert_eq!(filters.0["goose"], LevelFilter::WARN);
    }

    #[test]
    fn unknown_level_is_rejected() {
        let raw = HashMap::from([("velotest".to_owned(), "loud".to_owned())]);
        assert!(Filters::try_from(raw).is_err());
    }
}
