//! Various helper-utilities

use crate::{
    cli::Opts,
    config::{Config, PROJECT_DIRS},
};
use anyhow::Result;
use clap::crate_name;
use flexi_logger::{
    style,
    AdaptiveFormat,
    Age,
    Cleanup,
    Criterion,
    DeferredNow,
    Duplicate,
    FileSpec,
    Level,
    Logger,
    LoggerHandle,
    Naming,
    Record,
    WriteMode,
};
use serde::{de, Deserialize};
use std::{
    env,
    io::{self, Write},
    panic,
    path::PathBuf,
};
use which::which;

/// Shorter way of testing if the user wants color for the output of `--help`
pub(crate) fn wants_color() -> bool {
    env::var_os("NO_COLOR").is_none()
}

/// Initializes logging for this crate. The returned handle flushes the
/// buffered log when dropped, so it must be kept alive until exit
pub(crate) fn initialize_logging(config: &Config, args: &Opts) -> Result<LoggerHandle> {
    /// Customize the format of the log (colored)
    fn colored_format(
        w: &mut dyn Write,
        _now: &mut DeferredNow,
        record: &Record,
    ) -> Result<(), io::Error> {
        let level = record.level();
        write!(
            w,
            "{:<5} [{}:{}]: {}",
            style(level, level),
            style(Level::Trace, record.file().unwrap_or("<unnamed>")),
            record.line().unwrap_or(0),
            &record.args()
        )
    }

    /// Customize the format of the log (uncolored)
    fn uncolored_format(
        w: &mut dyn Write,
        now: &mut DeferredNow,
        record: &Record,
    ) -> Result<(), io::Error> {
        // Strip the ansi sequences put in log messages using the `colored` crate
        // when writing to a file
        write!(
            w,
            "[{:>}] {:<5} [{}:{}]: {}",
            now.now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.file().unwrap_or("<unnamed>"),
            record.line().unwrap_or(0),
            String::from_utf8(strip_ansi_escapes::strip(
                &record.args().to_string().as_bytes()
            )?)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
        )
    }

    if cfg!(debug_assertions) {
        better_panic::install();
        panic::set_hook(Box::new(|panic_info| {
            better_panic::Settings::auto().create_panic_handler()(panic_info);
        }));
    }

    let log_dir = config
        .global
        .log_dir
        .clone()
        .unwrap_or_else(|| PROJECT_DIRS.cache_dir().to_path_buf());

    let mut logger = Logger::try_with_str(env::var("SBSMODE_LOG").unwrap_or_else(
        |_| match args.verbose {
            0 => String::from("info"),
            1 => String::from("debug"),
            _ => String::from("trace"),
        },
    ))?
    .write_mode(WriteMode::BufferAndFlush)
    .adaptive_format_for_stderr(AdaptiveFormat::Custom(uncolored_format, colored_format))
    .set_palette(String::from("9;11;14;5;13"));

    if config.global.log_to_file {
        logger = logger
            .duplicate_to_stderr(Duplicate::All)
            .rotate(
                Criterion::AgeOrSize(Age::Day, 5_000_000),
                Naming::Numbers,
                Cleanup::KeepLogFiles(2),
            )
            .log_to_file(
                FileSpec::default()
                    .basename(crate_name!())
                    .directory(&log_dir),
            )
            .format_for_files(uncolored_format);
    }

    let handle = logger.start()?;
    log::trace!("logging started, log directory: {}", log_dir.display());

    Ok(handle)
}

/// Expand environment variables and `~` in a path
fn shellexpand_path<E: de::Error>(value: &PathBuf) -> Result<PathBuf, E> {
    Ok(PathBuf::from(
        shellexpand::full(&value.to_string_lossy())
            .map_err(|e| {
                de::Error::invalid_value(
                    de::Unexpected::Str(value.to_string_lossy().as_ref()),
                    &e.to_string().as_str(),
                )
            })?
            .to_string(),
    ))
}

/// [`Deserialize`] something that has a shell variable
#[allow(single_use_lifetimes)]
pub(crate) fn deserialize_shellexpand<'de, D>(d: D) -> Result<Option<PathBuf>, D::Error>
where
    D: de::Deserializer<'de>,
{
    let value = PathBuf::deserialize(d)?;
    Ok(Some(shellexpand_path::<D::Error>(&value)?))
}

/// [`Deserialize`] a path or a binary name into an absolute path. Binary names
/// are looked up in `$PATH`
#[allow(single_use_lifetimes)]
pub(crate) fn deserialize_absolute_path<'de, D>(d: D) -> Result<Option<PathBuf>, D::Error>
where
    D: de::Deserializer<'de>,
{
    let value = PathBuf::deserialize(d)?;
    let value = shellexpand_path::<D::Error>(&value)?;

    let canonicalize = |p: &PathBuf| -> Result<PathBuf, D::Error> {
        p.canonicalize()
            .map_err(|_| de::Error::custom(format!("failed to canonicalize path: {}", p.display())))
    };

    if let Ok(value) = canonicalize(&value) {
        if value.is_absolute() {
            return Ok(Some(value));
        }
    }

    // Maybe it was a binary name given
    // `which` should return the absolute value
    if let Ok(ret) = which(&value) {
        return Ok(Some(canonicalize(&ret)?));
    }

    Err(de::Error::invalid_value(
        de::Unexpected::Str(value.to_string_lossy().as_ref()),
        &"an absolute path or a binary in $PATH",
    ))
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use std::path::PathBuf;

    #[derive(Debug, Deserialize)]
    struct Paths {
        #[serde(default, deserialize_with = "super::deserialize_shellexpand")]
        dir: Option<PathBuf>,
        #[serde(default, deserialize_with = "super::deserialize_absolute_path")]
        bin: Option<PathBuf>,
    }

    #[test]
    fn shellexpand_environment_variables() {
        std::env::set_var("SBSMODE_TEST_DIR", "/tmp/sbsmode-test");
        let paths: Paths = serde_yaml::from_str("dir: $SBSMODE_TEST_DIR/logs").unwrap();
        assert_eq!(paths.dir, Some(PathBuf::from("/tmp/sbsmode-test/logs")));
        assert!(paths.bin.is_none());
    }

    #[test]
    fn absolute_path_must_exist() {
        let paths: Paths = serde_yaml::from_str("bin: /").unwrap();
        assert_eq!(paths.bin, Some(PathBuf::from("/")));
        assert!(serde_yaml::from_str::<Paths>("bin: sbsmode-no-such-binary").is_err());
    }
}
