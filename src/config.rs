//! Configuration options

use crate::{
    geometry::Dimension,
    utils::{deserialize_absolute_path, deserialize_shellexpand},
};
use anyhow::{Context, Result};
use colored::Colorize;
use directories::BaseDirs;
use format_serde_error::SerdeError;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::{
    env,
    fmt,
    fs,
    io::Write,
    iter,
    path::{Path, PathBuf},
};
use which::which;

/// Configuration file name
const CONFIG_FILE: &str = "sbsmode.yml";

/// The `xrandr` binary used when the configuration doesn't name one
pub(crate) static XRANDR: Lazy<PathBuf> = Lazy::new(|| {
    env::var_os("SBSMODE_XRANDR").map_or_else(
        || which("xrandr").unwrap_or_else(|_| PathBuf::from("xrandr")),
        PathBuf::from,
    )
});

// ================== Modeline ==================== [[[

/// Polarity of a sync pulse
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum Polarity {
    /// `+hsync` / `+vsync`
    #[serde(rename = "+", alias = "positive")]
    Positive,
    /// `-hsync` / `-vsync`
    #[serde(rename = "-", alias = "negative")]
    Negative,
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Positive => write!(f, "+"),
            Self::Negative => write!(f, "-"),
        }
    }
}

/// A named display timing registered with the server through `--newmode`.
///
/// The values are specific to the adapter being driven and are passed through
/// untouched; nothing here derives or validates timings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub(crate) struct Modeline {
    /// Name the mode is registered under
    pub(crate) name:        String,
    /// Pixel clock in MHz
    #[serde(alias = "clock")]
    pub(crate) clock_mhz:   f64,
    pub(crate) hdisplay:    u32,
    pub(crate) hsync_start: u32,
    pub(crate) hsync_end:   u32,
    pub(crate) htotal:      u32,
    pub(crate) vdisplay:    u32,
    pub(crate) vsync_start: u32,
    pub(crate) vsync_end:   u32,
    pub(crate) vtotal:      u32,
    pub(crate) hsync:       Polarity,
    pub(crate) vsync:       Polarity,
}

impl Default for Modeline {
    /// 3840x1080 at ~60Hz with reduced blanking
    fn default() -> Self {
        Self {
            name:        String::from("3840x1080R"),
            clock_mhz:   266.50,
            hdisplay:    3840,
            hsync_start: 3888,
            hsync_end:   3920,
            htotal:      4000,
            vdisplay:    1080,
            vsync_start: 1083,
            vsync_end:   1093,
            vtotal:      1111,
            hsync:       Polarity::Positive,
            vsync:       Polarity::Negative,
        }
    }
}

impl Modeline {
    /// The arguments following `--newmode`: the name and eleven timing fields
    pub(crate) fn args(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            format!("{:.2}", self.clock_mhz),
            self.hdisplay.to_string(),
            self.hsync_start.to_string(),
            self.hsync_end.to_string(),
            self.htotal.to_string(),
            self.vdisplay.to_string(),
            self.vsync_start.to_string(),
            self.vsync_end.to_string(),
            self.vtotal.to_string(),
            format!("{}hsync", self.hsync),
            format!("{}vsync", self.vsync),
        ]
    }

    /// Visible resolution of the mode
    pub(crate) const fn dimension(&self) -> Dimension {
        Dimension::new(self.hdisplay, self.vdisplay)
    }

    /// Vertical refresh rate implied by the timings
    pub(crate) fn refresh_hz(&self) -> f64 {
        let total = f64::from(self.htotal) * f64::from(self.vtotal);
        if total == 0.0 {
            return 0.0;
        }
        self.clock_mhz * 1_000_000.0 / total
    }
}

// ]]] === Modeline ===

// =============== GlobalSettings ================= [[[

/// Global configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub(crate) struct GlobalSettings {
    /// The `xrandr` binary to run
    #[serde(deserialize_with = "deserialize_absolute_path")]
    pub(crate) xrandr: Option<PathBuf>,

    /// Read the RandR state over the X11 protocol instead of parsing the text
    /// listing of `xrandr`
    pub(crate) native_query: bool,

    /// Whether logs should be written to a file
    pub(crate) log_to_file: bool,

    /// The directory to write the log to
    #[serde(deserialize_with = "deserialize_shellexpand")]
    pub(crate) log_dir: Option<PathBuf>,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            xrandr:       Some(XRANDR.to_path_buf()),
            native_query: false,
            log_to_file:  false,
            log_dir:      None,
        }
    }
}

// ]]] === GlobalSettings ===

// =============== DisplaySettings ================ [[[

/// What is switched, and what it is switched between
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub(crate) struct DisplaySettings {
    /// Name of the output the headset adapter is plugged into
    pub(crate) output: String,

    /// Names tried when [`DisplaySettings::output`] is not on the screen.
    /// Drivers disagree on connector names (`HDMI-1` vs `HDMI-A-1`)
    pub(crate) fallback_outputs: Vec<String>,

    /// Mode restored by `off`
    pub(crate) standard_mode: String,

    /// Number of other modes shown by `status`
    pub(crate) listed_modes: usize,

    /// The side-by-side mode
    pub(crate) modeline: Modeline,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            output:           String::from("HDMI-1"),
            fallback_outputs: vec![String::from("HDMI-A-1")],
            standard_mode:    String::from("1920x1080"),
            listed_modes:     5,
            modeline:         Modeline::default(),
        }
    }
}

impl DisplaySettings {
    /// Every name the output may go by, in the order they are tried
    pub(crate) fn output_names(&self) -> impl Iterator<Item = &str> {
        iter::once(self.output.as_str())
            .chain(self.fallback_outputs.iter().map(String::as_str))
    }
}

// ]]] === DisplaySettings ===

// =================== Config ===================== [[[

/// Configuration file to parse
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub(crate) struct Config {
    /// Global settings
    #[serde(flatten)]
    pub(crate) global: GlobalSettings,

    /// Output and mode settings
    #[serde(flatten)]
    pub(crate) display: DisplaySettings,
}

impl Config {
    /// Create the default configuration file if it is missing, then load it
    pub(crate) fn create_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::debug!("Creating configuration path: {}", path.display());
            fs::create_dir_all(path).context("unable to create configuration directory")?;
        }

        let path = path.join(CONFIG_FILE);
        log::debug!("{}: {}", "Configuration path".bright_blue(), path.display());

        if !path.is_file() {
            let initialization = include_str!("../example/sbsmode.yml");

            let mut config_file: fs::File = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .open(&path)
                .with_context(|| format!("could not create sbsmode config: '{}'", path.display()))?;

            config_file
                .write_all(initialization.as_bytes())
                .with_context(|| format!("could not create sbsmode config: '{}'", path.display()))?;
            config_file.flush()?;
        }

        Self::load(path)
    }

    /// Load the configuration file from a given path
    pub(crate) fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: '{}'", path.display()))?;

        Self::from_yaml(file)
    }

    /// Parse configuration from a YAML document
    pub(crate) fn from_yaml(file: String) -> Result<Self> {
        // An empty document is `null` to serde_yaml, not an empty mapping
        if file.trim().is_empty() {
            return Ok(Self::default());
        }

        let res = serde_yaml::from_str(&file).map_err(|e| SerdeError::new(file, e))?;
        Ok(res)
    }

    /// Load the default configuration file
    pub(crate) fn load_default() -> Result<Self> {
        let path = PROJECT_DIRS.config_dir();
        log::debug!("loading default config: {}", path.display());
        Self::create_default(path)
    }

    /// The `xrandr` binary to run
    pub(crate) fn xrandr(&self) -> &Path {
        self.global.xrandr.as_deref().unwrap_or_else(|| XRANDR.as_path())
    }
} // ]]] === Config ===

// ================ Project Dirs ================== [[[

/// Get the base [`SbsDirs`]
pub(crate) static PROJECT_DIRS: Lazy<SbsDirs> = Lazy::new(SbsDirs::new);

/// Get the project directories relevant to [`sbsmode`]
#[derive(Debug, Clone)]
pub(crate) struct SbsDirs {
    /// User's `$XDG_CACHE_HOME/sbsmode` directory
    cache_dir:  PathBuf,
    /// User's `$XDG_CONFIG_HOME/sbsmode` directory
    config_dir: PathBuf,
}

impl SbsDirs {
    /// Create a new [`SbsDirs`]. Falls back to the temporary directory when no
    /// home directory can be found
    fn new() -> Self {
        let fallback = || env::temp_dir().join(env!("CARGO_PKG_NAME"));
        Self {
            cache_dir:  Self::get_dir("SBSMODE_CACHE_DIR", "XDG_CACHE_HOME", ".cache")
                .unwrap_or_else(fallback),
            config_dir: Self::get_dir("SBSMODE_CONFIG_DIR", "XDG_CONFIG_HOME", ".config")
                .unwrap_or_else(fallback),
        }
    }

    /// Wrapper function that makes it easier to get directories
    fn get_dir(env_var: &str, var: &str, join: &str) -> Option<PathBuf> {
        env::var_os(env_var).map(PathBuf::from).map_or_else(
            || {
                env::var_os(var)
                    .map(PathBuf::from)
                    .filter(|p| p.is_absolute())
                    .or_else(|| BaseDirs::new().map(|p| p.home_dir().join(join)))
                    .map(|p| p.join(env!("CARGO_PKG_NAME")))
            },
            |v| {
                // Custom env var is set
                if v.is_absolute() {
                    Some(v)
                } else {
                    BaseDirs::new()
                        .map(|p| p.home_dir().join(join))
                        .map(|p| p.join(env!("CARGO_PKG_NAME")))
                }
            },
        )
    }

    /// Get cache directory
    #[must_use]
    pub(crate) fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Get configuration directory
    #[must_use]
    pub(crate) fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}

// ]]] === Project Dirs ===
