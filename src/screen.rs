//! Structured view of the RandR state of a screen
//!
//! The state is read either from the textual listing printed by `xrandr
//! --query` (parsed here) or through the protocol itself (see [`crate::x11`]).
//! Both produce a [`Screen`], which is the only thing decisions are made on.

use crate::geometry::{Dimension, Point, Rectangle};
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::str::FromStr;

/// `HDMI-1 connected primary 1920x1080+2560+0 (normal left ...) 0mm x 0mm`
static OUTPUT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<name>\S+) (?P<state>connected|disconnected|unknown connection)(?P<primary> primary)?(?: (?P<geometry>\d+x\d+(?:\+-?|-)\d+(?:\+-?|-)\d+))?",
    )
    .expect("invalid output regex")
});

/// `  3840x1080R (0x1e2) 266.500MHz +HSync -VSync`
static UNASSOCIATED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s+(?P<name>\S+) \(0x[0-9a-fA-F]+\)\s+[\d.]+MHz").expect("invalid mode regex")
});

/// `        h: width  3840 start 3888 ...`
static DETAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s+[hv]: ").expect("invalid detail regex"));

/// `   1920x1080     60.00*+  50.00    59.94`
static MODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s+(?P<name>\S+)(?P<rates>(?:\s+\S+)*)\s*$").expect("invalid mode regex")
});

// ============================ Connection ============================

/// Whether something is plugged into an output
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Connection {
    /// A display is attached
    Connected,
    /// Nothing is attached
    Disconnected,
    /// The driver cannot tell
    Unknown,
}

impl Connection {
    /// Convert the word used in the `xrandr` listing
    fn from_listing(s: &str) -> Self {
        match s {
            "connected" => Self::Connected,
            "disconnected" => Self::Disconnected,
            _ => Self::Unknown,
        }
    }
}

// ============================== Modes ===============================

/// A refresh rate a mode is advertised with
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub(crate) struct Rate {
    /// Vertical refresh in hertz
    pub(crate) hz:        f64,
    /// Mode and rate currently driven
    pub(crate) current:   bool,
    /// Rate preferred by the display
    pub(crate) preferred: bool,
}

impl Rate {
    /// Create a new, unflagged [`Rate`]
    pub(crate) const fn new(hz: f64) -> Self {
        Self { hz, current: false, preferred: false }
    }
}

/// A mode an output advertises
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ModeEntry {
    /// Name of the mode, usually `WxH`
    pub(crate) name:  String,
    /// Refresh rates listed for the mode
    pub(crate) rates: Vec<Rate>,
}

impl ModeEntry {
    /// Create a new [`ModeEntry`]
    pub(crate) fn new<S: Into<String>>(name: S, rates: Vec<Rate>) -> Self {
        Self { name: name.into(), rates }
    }

    /// Is any of the rates being driven
    pub(crate) fn is_current(&self) -> bool {
        self.rates.iter().any(|r| r.current)
    }

    /// Parse the refresh rate column of a mode line. A marker may be glued to
    /// the number (`60.00*+`) or stand alone when the rate is preferred but
    /// not current (`60.00 +`)
    fn parse_rates(column: &str) -> Result<Vec<Rate>> {
        let mut rates: Vec<Rate> = vec![];

        for token in column.split_whitespace() {
            let digits = token.trim_end_matches(|c: char| c == '*' || c == '+');
            let flags = &token[digits.len()..];

            if digits.is_empty() {
                if let Some(last) = rates.last_mut() {
                    last.current |= flags.contains('*');
                    last.preferred |= flags.contains('+');
                }
                continue;
            }

            let hz = digits
                .parse::<f64>()
                .with_context(|| format!("invalid refresh rate: '{}'", token))?;

            rates.push(Rate {
                hz,
                current: flags.contains('*'),
                preferred: flags.contains('+'),
            });
        }

        Ok(rates)
    }
}

// ============================== Output ==============================

/// A physical connector and everything the server says about it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct OutputState {
    /// Name of the connector (`HDMI-1`)
    pub(crate) name:       String,
    /// Connection state
    pub(crate) connection: Connection,
    /// Whether this is the primary output
    pub(crate) primary:    bool,
    /// Area covered in the virtual screen, only present when a mode is active
    pub(crate) geometry:   Option<Rectangle>,
    /// Advertised modes in listing order
    pub(crate) modes:      Vec<ModeEntry>,
}

impl OutputState {
    /// Create an [`OutputState`] without any modes
    pub(crate) fn new<S: Into<String>>(name: S, connection: Connection) -> Self {
        Self {
            name: name.into(),
            connection,
            primary: false,
            geometry: None,
            modes: vec![],
        }
    }

    /// Is a display attached to this output
    pub(crate) fn is_connected(&self) -> bool {
        self.connection == Connection::Connected
    }

    /// Does the output list a mode of the given name
    pub(crate) fn has_mode(&self, name: &str) -> bool {
        self.modes.iter().any(|m| m.name == name)
    }

    /// The mode flagged as currently driven
    pub(crate) fn current_mode(&self) -> Option<&ModeEntry> {
        self.modes.iter().find(|m| m.is_current())
    }

    /// The resolution being driven. The geometry is authoritative; the current
    /// mode's name is only consulted when the geometry is missing
    pub(crate) fn resolution(&self) -> Option<Dimension> {
        self.geometry.map(|g| g.dimension).or_else(|| {
            self.current_mode()
                .and_then(|m| Dimension::from_mode_name(&m.name))
        })
    }

    /// Offset of the output in the virtual screen
    pub(crate) fn position(&self) -> Option<Point> {
        self.geometry.map(|g| g.point)
    }
}

// ============================== Screen ==============================

/// Every output of a screen plus the modes no output references
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub(crate) struct Screen {
    /// Outputs in listing order
    pub(crate) outputs:      Vec<OutputState>,
    /// Modes known to the server but not listed by any output
    pub(crate) unassociated: Vec<String>,
}

impl Screen {
    /// Find an output by name
    pub(crate) fn output(&self, name: &str) -> Option<&OutputState> {
        self.outputs.iter().find(|o| o.name == name)
    }

    /// Find an output by name, mutably
    #[cfg(test)]
    pub(crate) fn output_mut(&mut self, name: &str) -> Option<&mut OutputState> {
        self.outputs.iter_mut().find(|o| o.name == name)
    }

    /// Has a mode with this name been registered with the server
    pub(crate) fn knows_mode(&self, name: &str) -> bool {
        self.unassociated.iter().any(|m| m == name)
            || self.outputs.iter().any(|o| o.has_mode(name))
    }
}

impl FromStr for Screen {
    type Err = anyhow::Error;

    /// Parse the output of `xrandr --query`
    fn from_str(listing: &str) -> Result<Self> {
        let mut screen = Self::default();
        // Index of the output mode lines are currently attributed to
        let mut current: Option<usize> = None;

        for (lnum, line) in listing.lines().enumerate() {
            if line.trim().is_empty() || line.starts_with("Screen ") {
                continue;
            }

            if let Some(caps) = OUTPUT_RE.captures(line) {
                let mut output = OutputState::new(&caps["name"], Connection::from_listing(&caps["state"]));
                output.primary = caps.name("primary").is_some();
                output.geometry = caps
                    .name("geometry")
                    .map(|g| g.as_str().parse::<Rectangle>())
                    .transpose()
                    .with_context(|| format!("line {}: invalid output geometry", lnum + 1))?;

                log::trace!("found output {} ({:?})", output.name, output.connection);
                screen.outputs.push(output);
                current = Some(screen.outputs.len() - 1);
                continue;
            }

            if let Some(caps) = UNASSOCIATED_RE.captures(line) {
                log::trace!("found unassociated mode {}", &caps["name"]);
                screen.unassociated.push(caps["name"].to_string());
                current = None;
                continue;
            }

            if DETAIL_RE.is_match(line) {
                continue;
            }

            if let Some(caps) = MODE_RE.captures(line) {
                let idx = match current {
                    Some(idx) => idx,
                    None => {
                        log::debug!("line {}: mode without an output: {}", lnum + 1, line);
                        continue;
                    },
                };

                let rates = ModeEntry::parse_rates(&caps["rates"])
                    .with_context(|| format!("line {}: invalid mode line", lnum + 1))?;
                screen.outputs[idx]
                    .modes
                    .push(ModeEntry::new(&caps["name"], rates));
                continue;
            }

            log::debug!("line {}: ignoring unrecognized line: {}", lnum + 1, line);
        }

        Ok(screen)
    }
}

#[cfg(test)]
mod tests {
    use super::{Connection, ModeEntry, Rate, Screen};
    use crate::geometry::{Dimension, Point, Rectangle};

    const LISTING: &str = "\
Screen 0: minimum 320 x 200, current 4480 x 1440, maximum 16384 x 16384
DP-1 connected primary 2560x1440+0+0 (normal left inverted right x axis y axis) 597mm x 336mm
   2560x1440     59.95*+  74.97
   1920x1080     60.00    50.00    59.94
HDMI-1 connected 1920x1080+2560+0 (normal left inverted right x axis y axis) 0mm x 0mm
   1920x1080     60.00*+  50.00    59.94
   1280x720      60.00    50.00
   1920x1080i    60.00    50.00
HDMI-2 disconnected (normal left inverted right x axis y axis)
DP-2 unknown connection (normal left inverted right x axis y axis)
  3840x1080R (0x1e2) 266.500MHz +HSync -VSync
        h: width  3840 start 3888 end 3920 total 4000 skew    0 clock  66.62KHz
        v: height 1080 start 1083 end 1093 total 1111           clock  59.97Hz
";

    #[test]
    fn parses_outputs() {
        let screen: Screen = LISTING.parse().unwrap();
        let names = screen.outputs.iter().map(|o| o.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["DP-1", "HDMI-1", "HDMI-2", "DP-2"]);

        let dp = screen.output("DP-1").unwrap();
        assert!(dp.primary);
        assert!(dp.is_connected());
        assert_eq!(dp.geometry, Some(Rectangle::new(0, 0, 2560, 1440)));

        let hdmi = screen.output("HDMI-1").unwrap();
        assert!(!hdmi.primary);
        assert_eq!(hdmi.position(), Some(Point::new(2560, 0)));
        assert_eq!(hdmi.resolution(), Some(Dimension::new(1920, 1080)));
        assert_eq!(hdmi.modes.len(), 3);

        assert_eq!(screen.output("HDMI-2").unwrap().connection, Connection::Disconnected);
        assert_eq!(screen.output("DP-2").unwrap().connection, Connection::Unknown);
        assert!(screen.output("HDMI-3").is_none());
    }

    #[test]
    fn unassociated_modes_are_not_attached() {
        let screen: Screen = LISTING.parse().unwrap();
        assert_eq!(screen.unassociated, vec![String::from("3840x1080R")]);
        assert!(screen.knows_mode("3840x1080R"));
        assert!(screen.knows_mode("1280x720"));
        assert!(!screen.knows_mode("3840x1080"));

        // Neither the disconnected output listed right before the mode, nor any
        // other output, owns it
        assert!(screen.outputs.iter().all(|o| !o.has_mode("3840x1080R")));
        assert!(screen.output("DP-2").unwrap().modes.is_empty());
    }

    #[test]
    fn current_and_preferred_markers() {
        let screen: Screen = LISTING.parse().unwrap();
        let hdmi = screen.output("HDMI-1").unwrap();
        let current = hdmi.current_mode().unwrap();

        assert_eq!(current.name, "1920x1080");
        assert_eq!(current.rates[0], Rate { hz: 60.0, current: true, preferred: true });
        assert_eq!(current.rates[1], Rate::new(50.0));
        assert!(!hdmi.modes[1].is_current());
    }

    #[test]
    fn detached_preferred_marker() {
        let rates = ModeEntry::parse_rates("60.00 +  50.00*").unwrap();
        assert_eq!(
            rates,
            vec![
                Rate { hz: 60.0, current: false, preferred: true },
                Rate { hz: 50.0, current: true, preferred: false },
            ]
        );
        assert!(ModeEntry::parse_rates("sixty").is_err());
    }

    #[test]
    fn connected_output_without_mode() {
        let screen: Screen = "\
HDMI-1 connected (normal left inverted right x axis y axis)
   1920x1080     60.00 +  50.00
   3840x1080R    59.97
"
        .parse()
        .unwrap();

        let hdmi = screen.output("HDMI-1").unwrap();
        assert!(hdmi.is_connected());
        assert!(hdmi.geometry.is_none());
        assert!(hdmi.current_mode().is_none());
        assert!(hdmi.resolution().is_none());
        assert!(hdmi.has_mode("3840x1080R"));
    }

    #[test]
    fn rotated_output_header() {
        let screen: Screen =
            "HDMI-1 connected 1080x1920+0+0 left (normal left inverted right x axis y axis) 0mm x 0mm\n"
                .parse()
                .unwrap();
        assert_eq!(
            screen.output("HDMI-1").unwrap().resolution(),
            Some(Dimension::new(1080, 1920))
        );
    }

    #[test]
    fn output_left_of_the_origin() {
        let screen: Screen =
            "HDMI-1 connected 3840x1080+-3840+0 (normal left inverted right x axis y axis) 0mm x 0mm\n"
                .parse()
                .unwrap();
        let hdmi = screen.output("HDMI-1").unwrap();

        assert_eq!(hdmi.position(), Some(Point::new(-3840, 0)));
        assert_eq!(hdmi.resolution(), Some(Dimension::new(3840, 1080)));
    }
}
