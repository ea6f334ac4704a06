//! Structures used to map areas of the virtual screen

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Matches `3840x1080` as well as `3840x1080+2560+0`. `xrandr` prints
/// negative offsets as `+-3840`
static GEOMETRY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+)x(\d+)(?:(\+-?\d+|-\d+)(\+-?\d+|-\d+))?$").expect("invalid geometry regex")
});

/// Parse an offset, which is either signed (`-1920`) or has an explicit plus
/// in front of a negative number (`+-1920`)
fn parse_offset(s: &str) -> Result<i32> {
    s.strip_prefix('+')
        .unwrap_or(s)
        .parse::<i32>()
        .with_context(|| format!("invalid offset: '{}'", s))
}

// =============================== Point ==============================
// ====================================================================

/// Offset of an output inside of the virtual screen
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(crate) struct Point {
    /// Horizontal offset
    pub(crate) x: i32,
    /// Vertical offset
    pub(crate) y: i32,
}

impl Point {
    /// Create a new [`Point`]
    pub(crate) const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

// ============================= Dimension ===========================
// ====================================================================

/// A `width` and a `height`. The resolution of a mode
#[derive(Debug, Default, Copy, Clone, PartialOrd, Ord, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(crate) struct Dimension {
    /// Horizontal pixel count
    pub(crate) width:  u32,
    /// Vertical pixel count
    pub(crate) height: u32,
}

impl Dimension {
    /// Create a new [`Dimension`]
    pub(crate) const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Parse the leading `WxH` of a mode name such as `1920x1080i` or
    /// `3840x1080R`. Mode names are free-form, so this is best effort
    pub(crate) fn from_mode_name(name: &str) -> Option<Self> {
        let (width, rest) = name.split_once('x')?;
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .map_or(rest, |idx| &rest[..idx]);

        Some(Self::new(width.parse().ok()?, digits.parse().ok()?))
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Dimension {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let rect = Rectangle::from_str(s)?;
        Ok(rect.dimension)
    }
}

// ============================= Rectangle ===========================
// ====================================================================

/// The area an output covers in the virtual screen (`WxH+X+Y`)
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(crate) struct Rectangle {
    /// Top left corner
    pub(crate) point:     Point,
    /// Size of the area
    pub(crate) dimension: Dimension,
}

impl Rectangle {
    /// Create a new [`Rectangle`]
    pub(crate) const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            point:     Point::new(x, y),
            dimension: Dimension::new(width, height),
        }
    }
}

impl fmt::Display for Rectangle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{:+}{:+}", self.dimension, self.point.x, self.point.y)
    }
}

impl FromStr for Rectangle {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let caps = GEOMETRY_RE
            .captures(s.trim())
            .ok_or_else(|| anyhow!("invalid geometry: '{}'", s))?;

        let num = |idx: usize| caps.get(idx).map(|m| m.as_str());
        let width = num(1).unwrap_or_default().parse::<u32>().context("invalid width")?;
        let height = num(2).unwrap_or_default().parse::<u32>().context("invalid height")?;
        let x = num(3).map_or(Ok(0), parse_offset)?;
        let y = num(4).map_or(Ok(0), parse_offset)?;

        Ok(Self::new(x, y, width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::{Dimension, Point, Rectangle};

    #[test]
    fn parse_full_geometry() {
        let rect: Rectangle = "3840x1080+2560+0".parse().unwrap();
        assert_eq!(rect, Rectangle::new(2560, 0, 3840, 1080));
        assert_eq!(rect.to_string(), "3840x1080+2560+0");
    }

    #[test]
    fn parse_negative_offsets() {
        let rect: Rectangle = "1920x1080-1920+0".parse().unwrap();
        assert_eq!(rect.point, Point::new(-1920, 0));
        assert_eq!(rect.to_string(), "1920x1080-1920+0");
    }

    #[test]
    fn parse_xrandr_negative_offsets() {
        let rect: Rectangle = "3840x1080+-3840+0".parse().unwrap();
        assert_eq!(rect, Rectangle::new(-3840, 0, 3840, 1080));

        let rect: Rectangle = "1920x1080+0+-1080".parse().unwrap();
        assert_eq!(rect.point, Point::new(0, -1080));

        assert!("1920x1080+-+0".parse::<Rectangle>().is_err());
        assert!("1920x1080--10+0".parse::<Rectangle>().is_err());
    }

    #[test]
    fn parse_bare_dimension() {
        let dim: Dimension = "1920x1080".parse().unwrap();
        assert_eq!(dim, Dimension::new(1920, 1080));
        assert!("1920by1080".parse::<Dimension>().is_err());
        assert!("x1080".parse::<Rectangle>().is_err());
    }

    #[test]
    fn dimension_from_mode_names() {
        assert_eq!(
            Dimension::from_mode_name("3840x1080R"),
            Some(Dimension::new(3840, 1080))
        );
        assert_eq!(
            Dimension::from_mode_name("1920x1080i"),
            Some(Dimension::new(1920, 1080))
        );
        assert_eq!(
            Dimension::from_mode_name("3840x1080_60.00"),
            Some(Dimension::new(3840, 1080))
        );
        assert_eq!(Dimension::from_mode_name("sbs"), None);
    }
}
