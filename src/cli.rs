//! The command line arguments

use crate::utils::wants_color;
use clap::{crate_description, crate_version, AppSettings, Parser, ValueHint};
use once_cell::sync::Lazy;
use std::{env, fs, path::PathBuf, str::FromStr};
use strum::EnumString;

/// Options for the [`sbsmode`] program
#[derive(Parser, Default, Clone, Debug, PartialEq)]
#[clap(
    version = crate_version!(),
    author = <String as AsRef<str>>::as_ref(&APP_AUTHORS),
    about = <String as AsRef<str>>::as_ref(&APP_ABOUT),
    after_help =  <String as AsRef<str>>::as_ref(&AFTER_HELP),
    override_usage =  <String as AsRef<str>>::as_ref(&OVERRIDE_HELP),
    max_term_width = 100,
    color = clap::ColorChoice::Auto,
    global_setting = AppSettings::DeriveDisplayOrder,
    disable_help_subcommand = true,
    hide_possible_values = true,
)]
pub(crate) struct Opts {
    /// Display debugging messages on various levels
    #[clap(
        long,
        short,
        global = true,
        parse(from_occurrences),
        long_help = "
        Set the verbosity level of the program. There are 2 extra levels after the default (INFO). \
                     If `-v` is used, DEBUG messages are displayed, and if `-vv` is used TRACE \
                     messages are displayed. The verbosity can also be set with the `SBSMODE_LOG` \
                     environment variable"
    )]
    pub(crate) verbose: u8,

    /// Location of configuration file
    #[clap(
        long,
        short,
        takes_value = true,
        number_of_values = 1,
        value_name = "file",
        value_hint = ValueHint::FilePath,
        validator = |t| {
            fs::metadata(
                PathBuf::from(t).components()
                    .count()
                    .gt(&1_usize)
                    .then(|| PathBuf::from(t))
                    .unwrap_or_else(|| env::current_dir().unwrap_or_else(|_| PathBuf::from(".")).join(PathBuf::from(t))),
            )
            .map_err(|_| "must be a valid path")
            .map(|_| ())
            .map_err(|e| e.to_string())
        },
        long_help = "\
        Specify the location of the configuration file. The default location is \
                `$XDG_CONFIG_HOME/sbsmode/sbsmode.yml`"
    )]
    pub(crate) config: Option<PathBuf>,

    /// Output to switch, overriding the configuration
    #[clap(
        long,
        short,
        takes_value = true,
        number_of_values = 1,
        value_name = "name",
        long_help = "\
        Name of the output the headset adapter is plugged into, as listed by `xrandr --query` \
                     (e.g., HDMI-1). Overrides the `output` key of the configuration file"
    )]
    pub(crate) output: Option<String>,

    /// Print the status or position as JSON
    #[clap(long, short, takes_value = false)]
    pub(crate) json: bool,

    /// Print the xrandr commands instead of running them
    #[clap(
        name = "dry-run",
        long = "dry-run",
        short = 'n',
        takes_value = false,
        long_help = "\
        Print each command that would change the display configuration instead of running it. \
                     The current state is still queried"
    )]
    pub(crate) dry_run: bool,

    /// When to colorize output
    #[clap(
        name = "color",
        long = "color",
        short = 'C',
        value_name = "when",
        possible_values = &["never", "auto", "always"],
        long_help = "\
        When to colorize output (usually meant for piping). Valid values are: always, \
                auto, never."
    )]
    pub(crate) color_when: Option<String>,

    /// One of: on, off, status, position
    #[clap(
        name = "action",
        value_name = "action",
        long_help = "\
        The action to perform, case-insensitive:
    on, enable, sbs        switch the output to the side-by-side mode
    off, disable, normal   switch the output back to the standard mode
    status, info           show the connection state and active resolution
    position, pos          show the offset of the output in the virtual screen"
    )]
    pub(crate) action: Option<String>,
}

/// What the program was asked to do
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumString)]
pub(crate) enum Action {
    /// Switch to the side-by-side mode
    #[strum(serialize = "on", serialize = "enable", serialize = "sbs")]
    Enable,
    /// Switch back to the standard mode
    #[strum(serialize = "off", serialize = "disable", serialize = "normal")]
    Disable,
    /// Report on the output
    #[strum(serialize = "status", serialize = "info")]
    Status,
    /// Report the offset of the output
    #[strum(serialize = "position", serialize = "pos")]
    Position,
}

impl Action {
    /// Parse an action, ignoring case
    pub(crate) fn parse(s: &str) -> Option<Self> {
        Self::from_str(&s.trim().to_ascii_lowercase()).ok()
    }
}

// =============== Prettify Help ==================

/// Yellow ansi code
const YELLOW: &str = "\x1b[0;33m";
/// Green ansi code
const GREEN: &str = "\x1b[0;32m";
/// Bright-green ansi code
const BRGREEN: &str = "\x1b[38;5;10m";
/// Bright-red ansi code
const BRRED: &str = "\x1b[38;5;9m";
/// Bold-red ansi code
const BRED: &str = "\x1b[01;38;5;1m";
/// Reset colors
const RES: &str = "\x1b[0m";

/// Colored options used in the output of `--help`
pub(crate) static APP_ABOUT: Lazy<String> = Lazy::new(|| {
    wants_color()
        .then(|| {
            format!(
                "{}DESCRIPTION: {}{}{}",
                YELLOW,
                GREEN,
                crate_description!(),
                RES
            )
        })
        .unwrap_or_else(|| crate_description!().to_owned())
});

/// Colorized message to override the generated help message
pub(crate) static OVERRIDE_HELP: Lazy<String> = Lazy::new(|| {
    wants_color()
        .then(|| {
            format!(
                "{}sbsmode{} [{}FLAGS{}/{}OPTIONS{}] [{}on{}|{}off{}|{}status{}|{}position{}]",
                BRED, RES, GREEN, RES, GREEN, RES, GREEN, RES, GREEN, RES, GREEN, RES, GREEN, RES
            )
        })
        .unwrap_or_else(|| String::from("sbsmode [FLAGS/OPTIONS] [on|off|status|position]"))
});

/// Colorized message displayed after the help message
pub(crate) static AFTER_HELP: Lazy<String> = Lazy::new(|| {
    wants_color()
        .then(|| {
            format!(
                "See {}sbsmode{} {}--help{} for longer explanations of some options.",
                BRED, RES, GREEN, RES
            )
        })
        .unwrap_or_else(|| {
            String::from("See sbsmode --help for longer explanations of some options.")
        })
});

/// Colorized message about the app's authors
pub(crate) static APP_AUTHORS: Lazy<String> = Lazy::new(|| {
    wants_color()
        .then(|| format!("{}sbsmode contributors{}", BRRED, RES))
        .unwrap_or_else(|| String::from("sbsmode contributors"))
});

/// Short usage printed when no valid action is given
pub(crate) static USAGE: Lazy<String> = Lazy::new(|| {
    wants_color()
        .then(|| {
            format!(
                "{}usage{}: {}\n\n  {}on{}, enable, sbs        switch to the side-by-side mode\n  {}off{}, \
                 disable, normal   switch back to the standard mode\n  {}status{}, info           \
                 show the active resolution\n  {}position{}, pos          show the offset of the \
                 output",
                YELLOW, RES, *OVERRIDE_HELP, BRGREEN, RES, BRGREEN, RES, BRGREEN, RES, BRGREEN, RES
            )
        })
        .unwrap_or_else(|| {
            format!(
                "usage: {}\n\n  on, enable, sbs        switch to the side-by-side mode\n  off, \
                 disable, normal   switch back to the standard mode\n  status, info           \
                 show the active resolution\n  position, pos          show the offset of the \
                 output",
                *OVERRIDE_HELP
            )
        })
});

#[cfg(test)]
mod tests {
    use super::{Action, Opts};
    use clap::Parser;

    #[test]
    fn actions_and_synonyms() {
        for (input, action) in [
            ("on", Action::Enable),
            ("enable", Action::Enable),
            ("sbs", Action::Enable),
            ("off", Action::Disable),
            ("disable", Action::Disable),
            ("normal", Action::Disable),
            ("status", Action::Status),
            ("info", Action::Status),
            ("position", Action::Position),
            ("pos", Action::Position),
        ] {
            assert_eq!(Action::parse(input), Some(action), "{}", input);
        }
    }

    #[test]
    fn actions_ignore_case() {
        assert_eq!(Action::parse("ON"), Some(Action::Enable));
        assert_eq!(Action::parse("Sbs"), Some(Action::Enable));
        assert_eq!(Action::parse("NORMAL"), Some(Action::Disable));
        assert_eq!(Action::parse("Info"), Some(Action::Status));
    }

    #[test]
    fn unrecognized_actions() {
        for input in ["", "toggle", "onn", "3d", "--on", "stat us"] {
            assert_eq!(Action::parse(input), None, "{}", input);
        }
    }

    #[test]
    fn parse_arguments() {
        let opts = Opts::try_parse_from(&["sbsmode", "-vv", "-o", "HDMI-A-1", "--dry-run", "On"])
            .unwrap();
        assert_eq!(opts.verbose, 2);
        assert_eq!(opts.output.as_deref(), Some("HDMI-A-1"));
        assert!(opts.dry_run);
        assert!(!opts.json);
        assert_eq!(opts.action.as_deref().and_then(Action::parse), Some(Action::Enable));

        let opts = Opts::try_parse_from(&["sbsmode"]).unwrap();
        assert!(opts.action.is_none());
    }
}
