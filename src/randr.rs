//! Talking to the RandR extension through the `xrandr` binary

use crate::{config::Modeline, error::Error, screen::Screen, x11};
use anyhow::{Context, Result};
use colored::Colorize;
use itertools::Itertools;
use std::{
    iter,
    path::{Path, PathBuf},
    process::{Command, Output},
};

/// The operations performed on the display server.
///
/// Every mutating operation corresponds to exactly one external command and
/// succeeds only if that command exits successfully.
pub(crate) trait Randr {
    /// Read the current state of every output
    fn query(&mut self) -> Result<Screen>;

    /// Register a new mode with the server (`--newmode`)
    fn new_mode(&mut self, modeline: &Modeline) -> Result<()>;

    /// Make a registered mode available on an output (`--addmode`)
    fn add_mode(&mut self, output: &str, mode: &str) -> Result<()>;

    /// Switch the active mode of an output (`--output <output> --mode <mode>`)
    fn set_mode(&mut self, output: &str, mode: &str) -> Result<()>;
}

/// [`Randr`] implemented by running `xrandr`
#[derive(Debug, Clone)]
pub(crate) struct Xrandr {
    /// Path to the binary
    exec:         PathBuf,
    /// Query over the X11 protocol rather than parsing `xrandr --query`
    native_query: bool,
    /// Print mutating commands instead of running them
    dry_run:      bool,
}

impl Xrandr {
    /// Create a new [`Xrandr`]
    pub(crate) fn new<P: AsRef<Path>>(exec: P) -> Self {
        Self {
            exec:         exec.as_ref().to_path_buf(),
            native_query: false,
            dry_run:      false,
        }
    }

    /// Set whether queries go through the X11 protocol
    pub(crate) const fn native_query(mut self, native_query: bool) -> Self {
        self.native_query = native_query;
        self
    }

    /// Set whether mutating commands are only printed
    pub(crate) const fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// The command line as it would be typed in a shell
    fn command_line(&self, args: &[String]) -> String {
        iter::once(self.exec.display().to_string())
            .chain(args.iter().cloned())
            .join(" ")
    }

    /// Run `xrandr` and wait for it to finish
    fn run(&self, args: &[String]) -> Result<Output, Error> {
        log::debug!("{}: {}", "running".bright_blue(), self.command_line(args));

        Command::new(&self.exec)
            .args(args)
            .output()
            .map_err(|source| Error::Spawn {
                program: self.exec.display().to_string(),
                source,
            })
    }

    /// Run `xrandr`, failing when its exit status is not zero
    fn run_checked(&self, args: &[String]) -> Result<Output, Error> {
        let output = self.run(args)?;
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            if !stderr.trim().is_empty() {
                log::warn!("xrandr: {}", stderr.trim());
            }
            return Err(Error::CommandFailed {
                command: self.command_line(args),
                status:  output.status,
            });
        }

        if !stderr.trim().is_empty() {
            log::debug!("xrandr: {}", stderr.trim());
        }

        Ok(output)
    }

    /// Run a command that changes the state of the server
    fn mutate(&self, args: Vec<String>) -> Result<()> {
        if self.dry_run {
            println!("{}", self.command_line(&args));
            return Ok(());
        }

        self.run_checked(&args)?;
        Ok(())
    }
}

impl Randr for Xrandr {
    fn query(&mut self) -> Result<Screen> {
        if self.native_query {
            return x11::query_screen().context("failed to query RandR over X11");
        }

        let output = self.run_checked(&[String::from("--query")])?;
        String::from_utf8_lossy(&output.stdout)
            .parse::<Screen>()
            .context("failed to parse the output of `xrandr --query`")
    }

    fn new_mode(&mut self, modeline: &Modeline) -> Result<()> {
        log::info!(
            "registering mode {} ({} at {:.2}Hz)",
            modeline.name.green(),
            modeline.dimension(),
            modeline.refresh_hz()
        );
        self.mutate(
            iter::once(String::from("--newmode"))
                .chain(modeline.args())
                .collect(),
        )
    }

    fn add_mode(&mut self, output: &str, mode: &str) -> Result<()> {
        log::info!("adding mode {} to {}", mode.green(), output.yellow());
        self.mutate(vec![
            String::from("--addmode"),
            output.to_owned(),
            mode.to_owned(),
        ])
    }

    fn set_mode(&mut self, output: &str, mode: &str) -> Result<()> {
        log::info!("switching {} to {}", output.yellow(), mode.green());
        self.mutate(vec![
            String::from("--output"),
            output.to_owned(),
            String::from("--mode"),
            mode.to_owned(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::{Randr, Xrandr};
    use crate::{config::Modeline, error::Error};

    #[test]
    fn command_line_formatting() {
        let xrandr = Xrandr::new("/usr/bin/xrandr");
        let args = vec![String::from("--output"), String::from("HDMI-1")];
        assert_eq!(xrandr.command_line(&args), "/usr/bin/xrandr --output HDMI-1");
    }

    #[test]
    fn dry_run_never_spawns() {
        let mut xrandr = Xrandr::new("/nonexistent/xrandr").dry_run(true);
        xrandr.new_mode(&Modeline::default()).unwrap();
        xrandr.add_mode("HDMI-1", "3840x1080R").unwrap();
        xrandr.set_mode("HDMI-1", "3840x1080R").unwrap();
    }

    #[test]
    fn missing_binary_is_a_spawn_error() {
        let mut xrandr = Xrandr::new("/nonexistent/xrandr");
        let err = xrandr.set_mode("HDMI-1", "1920x1080").unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Spawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_a_command_failure() {
        // `false` ignores its arguments and exits with 1
        let mut xrandr = Xrandr::new("false");
        let err = xrandr.set_mode("HDMI-1", "1920x1080").unwrap_err();
        match err.downcast_ref::<Error>() {
            Some(Error::CommandFailed { command, status }) => {
                assert_eq!(command, "false --output HDMI-1 --mode 1920x1080");
                assert!(!status.success());
            },
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn query_parses_stdout() {
        // `echo` prints its arguments, standing in for a listing
        let mut xrandr = Xrandr::new("echo");
        let screen = xrandr.query().unwrap();
        assert!(screen.outputs.is_empty());
    }
}
