//! Reading the RandR state over the X11 protocol
//!
//! This avoids depending on the text layout of `xrandr --query`. Only queries
//! go through here; changes are still made by running `xrandr`.

use crate::{
    error::Error,
    geometry::Rectangle,
    screen::{Connection, ModeEntry, OutputState, Rate, Screen},
};
use anyhow::{anyhow, Context, Result};
use itertools::Itertools;
use std::collections::HashMap;
use x11rb::{
    connection::{Connection as _, RequestConnection},
    protocol::randr::{self, ConnectionExt as _, ModeInfo},
    rust_connection::RustConnection,
};

/// Check that the `randr` extension is present and recent enough
fn check_extension(conn: &RustConnection) -> Result<()> {
    if conn.extension_information(randr::X11_EXTENSION_NAME)?.is_none() {
        return Err(anyhow!("{} X11 extension is unsupported", randr::X11_EXTENSION_NAME));
    }

    let (min, max) = randr::X11_XML_VERSION;
    conn.randr_query_version(min, max)
        .context("failed to query `randr` version")?
        .reply()
        .with_context(|| format!("`randr` version is unsupported. Supported versions: {}-{}", min, max))?;
    log::debug!("`randr` extension is up to date: {}-{}", min, max);

    Ok(())
}

/// Vertical refresh rate of a mode in hertz
fn refresh_rate(info: &ModeInfo) -> f64 {
    let total = f64::from(info.htotal) * f64::from(info.vtotal);
    if total == 0.0 {
        return 0.0;
    }

    f64::from(info.dot_clock) / total
}

/// Split the concatenated mode names of the screen resources
fn mode_names<'a>(modes: &'a [ModeInfo], names: &[u8]) -> HashMap<u32, (String, &'a ModeInfo)> {
    let mut offset = 0_usize;
    let mut map = HashMap::with_capacity(modes.len());

    for info in modes {
        let len = usize::from(info.name_len);
        let name = names
            .get(offset..offset + len)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .unwrap_or_default();
        offset += len;
        map.insert(info.id, (name, info));
    }

    map
}

/// Group the modes of an output by name. The server hands out one id per
/// timing, so a name advertised at several refresh rates becomes a single
/// [`ModeEntry`] holding every rate, as in the `xrandr` listing
fn output_modes(
    ids: &[u32],
    names: &HashMap<u32, (String, &ModeInfo)>,
    current: Option<u32>,
    num_preferred: u16,
) -> Vec<ModeEntry> {
    let mut modes: Vec<ModeEntry> = vec![];

    for (idx, id) in ids.iter().enumerate() {
        let (name, info) = match names.get(id) {
            Some(mode) => mode,
            None => continue,
        };

        let mut rate = Rate::new(refresh_rate(info));
        rate.current = current == Some(*id);
        rate.preferred = idx < usize::from(num_preferred);

        match modes.iter_mut().find(|m| &m.name == name) {
            Some(entry) => entry.rates.push(rate),
            None => modes.push(ModeEntry::new(name.clone(), vec![rate])),
        }
    }

    modes
}

/// Names of the modes no output lists, sorted and without duplicates
fn unassociated_modes(
    names: &HashMap<u32, (String, &ModeInfo)>,
    outputs: &[OutputState],
) -> Vec<String> {
    names
        .values()
        .map(|(name, _)| name)
        .filter(|name| !outputs.iter().any(|o| o.has_mode(name)))
        .cloned()
        .sorted()
        .dedup()
        .collect()
}

/// Read the state of every output of the default screen
pub(crate) fn query_screen() -> Result<Screen> {
    let (conn, screen_num) = RustConnection::connect(None).map_err(Error::Connection)?;
    check_extension(&conn)?;

    let root = conn
        .setup()
        .roots
        .get(screen_num)
        .ok_or_else(|| anyhow!("screen {} does not exist", screen_num))?
        .root;

    let resources = conn
        .randr_get_screen_resources_current(root)
        .context("failed to get screen resources")?
        .reply()
        .context("failed to get reply from: 'GetScreenResourcesCurrent'")?;
    let timestamp = resources.config_timestamp;
    let names = mode_names(&resources.modes, &resources.names);

    let mut screen = Screen::default();

    for output in &resources.outputs {
        let info = conn
            .randr_get_output_info(*output, timestamp)
            .context("failed to get output info")?
            .reply()
            .context("failed to get reply from: 'GetOutputInfo'")?;

        let name = String::from_utf8_lossy(&info.name).into_owned();
        let connection = match info.connection {
            randr::Connection::CONNECTED => Connection::Connected,
            randr::Connection::DISCONNECTED => Connection::Disconnected,
            _ => Connection::Unknown,
        };
        let mut state = OutputState::new(name, connection);

        let mut current_mode = None;
        if info.crtc != x11rb::NONE {
            let crtc = conn
                .randr_get_crtc_info(info.crtc, timestamp)
                .context("failed to get crtc info")?
                .reply()
                .context("failed to get reply from: 'GetCrtcInfo'")?;

            if crtc.mode != x11rb::NONE {
                current_mode = Some(crtc.mode);
                state.geometry = Some(Rectangle::new(
                    i32::from(crtc.x),
                    i32::from(crtc.y),
                    u32::from(crtc.width),
                    u32::from(crtc.height),
                ));
            }
        }

        state.modes = output_modes(&info.modes, &names, current_mode, info.num_preferred);

        log::trace!("found output {} ({:?})", state.name, state.connection);
        screen.outputs.push(state);
    }

    screen.unassociated = unassociated_modes(&names, &screen.outputs);

    Ok(screen)
}

#[cfg(test)]
mod tests {
    use super::{mode_names, output_modes, refresh_rate, unassociated_modes};
    use crate::screen::{Connection, ModeEntry, OutputState};
    use x11rb::{protocol::randr::ModeInfo, x11_utils::TryParse};

    /// Build a [`ModeInfo`] from its wire representation
    fn mode(id: u32, name_len: u16, htotal: u16, vtotal: u16, dot_clock: u32) -> ModeInfo {
        let mut buf = Vec::with_capacity(32);
        buf.extend_from_slice(&id.to_ne_bytes());
        buf.extend_from_slice(&[0; 4]); // width, height
        buf.extend_from_slice(&dot_clock.to_ne_bytes());
        buf.extend_from_slice(&[0; 4]); // hsync_start, hsync_end
        buf.extend_from_slice(&htotal.to_ne_bytes());
        buf.extend_from_slice(&[0; 6]); // hskew, vsync_start, vsync_end
        buf.extend_from_slice(&vtotal.to_ne_bytes());
        buf.extend_from_slice(&name_len.to_ne_bytes());
        buf.extend_from_slice(&[0; 4]); // mode_flags

        ModeInfo::try_parse(&buf).unwrap().0
    }

    #[test]
    fn split_mode_names() {
        let modes = vec![mode(0x40, 9, 0, 0, 0), mode(0x1e2, 10, 0, 0, 0)];
        let names = mode_names(&modes, b"1920x10803840x1080R");

        assert_eq!(names[&0x40].0, "1920x1080");
        assert_eq!(names[&0x1e2].0, "3840x1080R");
    }

    #[test]
    fn truncated_names_do_not_panic() {
        let modes = vec![mode(1, 9, 0, 0, 0), mode(2, 40, 0, 0, 0)];
        let names = mode_names(&modes, b"1920x1080");
        assert_eq!(names[&1].0, "1920x1080");
        assert_eq!(names[&2].0, "");
    }

    #[test]
    fn refresh_from_timings() {
        let rate = refresh_rate(&mode(1, 0, 4000, 1111, 266_500_000));
        assert!((rate - 59.97).abs() < 0.01);
        assert!(refresh_rate(&mode(1, 0, 0, 0, 266_500_000)).abs() < f64::EPSILON);
    }

    #[test]
    fn rates_of_one_name_share_an_entry() {
        let modes = vec![
            mode(0x40, 9, 2200, 1125, 148_500_000),
            mode(0x41, 9, 2200, 1125, 148_352_000),
            mode(0x42, 9, 2640, 1125, 148_500_000),
            mode(0x43, 8, 1650, 750, 74_250_000),
        ];
        let names = mode_names(&modes, b"1920x10801920x10801920x10801280x720");
        let entries = output_modes(&[0x40, 0x41, 0x42, 0x43], &names, Some(0x41), 1);

        let listed = entries.iter().map(|m| m.name.as_str()).collect::<Vec<_>>();
        assert_eq!(listed, vec!["1920x1080", "1280x720"]);

        let fhd: &ModeEntry = &entries[0];
        assert_eq!(fhd.rates.len(), 3);
        assert!(fhd.is_current());
        assert!(fhd.rates[0].preferred && !fhd.rates[0].current);
        assert!(fhd.rates[1].current && !fhd.rates[1].preferred);
        assert!((fhd.rates[2].hz - 50.0).abs() < 0.01);
        assert!(!entries[1].is_current());
    }

    #[test]
    fn unassociated_names_are_listed_once() {
        let modes = vec![
            mode(0x40, 9, 0, 0, 0),
            mode(0x1e2, 10, 0, 0, 0),
            mode(0x1e3, 10, 0, 0, 0),
        ];
        let names = mode_names(&modes, b"1920x10803840x1080R3840x1080R");

        let mut hdmi = OutputState::new("HDMI-1", Connection::Connected);
        hdmi.modes = output_modes(&[0x40], &names, Some(0x40), 1);

        assert_eq!(unassociated_modes(&names, &[hdmi]), vec![String::from("3840x1080R")]);
    }
}
