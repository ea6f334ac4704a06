//! Switching an output between the side-by-side mode and its standard mode

use crate::{
    config::DisplaySettings,
    error::Error,
    geometry::{Dimension, Point},
    randr::Randr,
    screen::{OutputState, Screen},
};
use anyhow::Result;
use colored::Colorize;
use itertools::Itertools;
use serde::Serialize;
use std::fmt;

/// What `status` found out about the output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct StatusReport {
    /// Name of the output
    pub(crate) output:       String,
    /// Whether a display is attached
    pub(crate) connected:    bool,
    /// Resolution being driven, if any
    pub(crate) resolution:   Option<Dimension>,
    /// Whether [`StatusReport::resolution`] is the side-by-side resolution
    pub(crate) stereo:       bool,
    /// Name of the mode being driven, if any
    pub(crate) current_mode: Option<String>,
    /// Offset in the virtual screen, if active
    pub(crate) position:     Option<Point>,
    /// Other modes the output advertises, truncated
    pub(crate) other_modes:  Vec<String>,
    /// Number of other modes before truncation
    pub(crate) total_other:  usize,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if !self.connected {
            return write!(f, "{}: {}", self.output.yellow().bold(), "not connected".red());
        }

        writeln!(f, "{}: {}", self.output.yellow().bold(), "connected".green())?;

        let resolution = self
            .resolution
            .map_or_else(|| String::from("none"), |r| r.to_string());
        let kind = if self.stereo {
            "side-by-side".green().bold()
        } else {
            "standard".normal()
        };
        write!(f, "  resolution: {} ({})", resolution.bold(), kind)?;

        if let Some(mode) = &self.current_mode {
            write!(f, "\n  mode:       {}", mode)?;
        }
        if let Some(pos) = self.position {
            write!(f, "\n  position:   {}", pos)?;
        }
        if !self.other_modes.is_empty() {
            write!(f, "\n  modes:      {}", self.other_modes.iter().join(", "))?;
            if self.total_other > self.other_modes.len() {
                write!(f, " (+{} more)", self.total_other - self.other_modes.len())?;
            }
        }

        Ok(())
    }
}

/// Drives a [`Randr`] implementation to toggle the side-by-side mode
#[derive(Debug)]
pub(crate) struct Controller<R: Randr> {
    /// How the server is talked to
    randr:    R,
    /// Output and modes being switched
    settings: DisplaySettings,
}

impl<R: Randr> Controller<R> {
    /// Create a new [`Controller`]
    pub(crate) fn new(randr: R, settings: DisplaySettings) -> Self {
        Self { randr, settings }
    }

    /// The settings the controller acts on
    pub(crate) fn settings(&self) -> &DisplaySettings {
        &self.settings
    }

    /// Find the configured output on the screen. The first name whose output
    /// is connected wins, otherwise the first one present
    fn find_output<'a>(&self, screen: &'a Screen) -> Option<&'a OutputState> {
        let present = self
            .settings
            .output_names()
            .filter_map(|name| screen.output(name))
            .collect::<Vec<_>>();

        present
            .iter()
            .find(|o| o.is_connected())
            .or_else(|| present.first())
            .copied()
    }

    /// Query the server and make sure the output has a display attached,
    /// returning the screen and the name the output goes by.
    /// Nothing is changed on the server before this has succeeded
    fn require_connected(&mut self) -> Result<(Screen, String)> {
        let screen = self.randr.query()?;
        let output = self
            .find_output(&screen)
            .ok_or_else(|| Error::NoOutput(self.settings.output_names().join(", ")))?;

        if !output.is_connected() {
            return Err(Error::NotConnected(output.name.clone()).into());
        }
        if output.name != self.settings.output {
            log::debug!("{} not found, using {}", self.settings.output, output.name);
        }

        let name = output.name.clone();
        Ok((screen, name))
    }

    /// Switch the output to the side-by-side mode, registering the mode and
    /// adding it to the output first when needed. Returns the output switched
    pub(crate) fn enable(&mut self) -> Result<String> {
        let (screen, output_name) = self.require_connected()?;
        let name = self.settings.modeline.name.clone();

        if screen.knows_mode(&name) {
            log::debug!("mode {} is already registered", name);
        } else {
            self.randr.new_mode(&self.settings.modeline)?;
        }

        if screen
            .output(&output_name)
            .map_or(false, |o| o.has_mode(&name))
        {
            log::debug!("mode {} is already available on {}", name, output_name);
        } else {
            self.randr.add_mode(&output_name, &name)?;
        }

        self.randr.set_mode(&output_name, &name)?;
        Ok(output_name)
    }

    /// Switch the output back to the standard mode. Returns the output switched
    pub(crate) fn disable(&mut self) -> Result<String> {
        let (_, output_name) = self.require_connected()?;
        let mode = self.settings.standard_mode.clone();

        self.randr.set_mode(&output_name, &mode)?;
        Ok(output_name)
    }

    /// Report on the output without changing anything
    pub(crate) fn status(&mut self) -> Result<StatusReport> {
        let screen = self.randr.query()?;

        Ok(match self.find_output(&screen) {
            Some(output) if output.is_connected() => self.report(output),
            found => StatusReport {
                output:       found.map_or_else(|| self.settings.output.clone(), |o| o.name.clone()),
                connected:    false,
                resolution:   None,
                stereo:       false,
                current_mode: None,
                position:     None,
                other_modes:  vec![],
                total_other:  0,
            },
        })
    }

    /// Build the [`StatusReport`] of a connected output
    fn report(&self, output: &OutputState) -> StatusReport {
        let resolution = output.resolution();
        let current_mode = output.current_mode().map(|m| m.name.clone());
        let others = output
            .modes
            .iter()
            .filter(|m| Some(&m.name) != current_mode.as_ref())
            .map(|m| m.name.clone())
            .collect::<Vec<_>>();

        StatusReport {
            output: output.name.clone(),
            connected: true,
            resolution,
            stereo: resolution == Some(self.settings.modeline.dimension()),
            current_mode,
            position: output.position(),
            total_other: others.len(),
            other_modes: others
                .into_iter()
                .take(self.settings.listed_modes)
                .collect(),
        }
    }

    /// Offset of the output in the virtual screen
    pub(crate) fn position(&mut self) -> Result<Point> {
        let (screen, output_name) = self.require_connected()?;

        screen
            .output(&output_name)
            .and_then(OutputState::position)
            .ok_or_else(|| Error::Inactive(output_name).into())
    }

    /// Access the [`Randr`] implementation
    #[cfg(test)]
    pub(crate) fn randr(&self) -> &R {
        &self.randr
    }
}
