//! DRM device management
//!
//! Opens DRM device (/dev/dri/card*) and
//! enumerates available connectors, CRTCs, and encoders.
//! Also owns the shutdown flag set from SIGTERM/SIGINT/SIGHUP.

use anyhow::{anyhow, Context, Result};
use drm::control::{connector, crtc, encoder, Device as ControlDevice, ResourceHandles};
use drm::Device as BasicDevice;
use log::{debug, info, warn};
use std::fs::{File, OpenOptions};
use std::os::unix::io::{AsFd, AsRawFd, BorrowedFd, FromRawFd, RawFd};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::constants::MAX_DRM_CARDS;

/// Global flag for shutdown requested via signal (SIGTERM/SIGINT/SIGHUP)
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Check if shutdown was requested
pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::Relaxed)
}

/// Set up signal handlers for graceful shutdown (call once at startup)
///
/// Handles SIGTERM (systemd stop), SIGINT (Ctrl+C), and SIGHUP (terminal hangup).
/// The render loop finishes its frame, then CRTC and EGL are torn down.
pub fn setup_signal_handlers() {
    unsafe {
        for signo in [libc::SIGTERM, libc::SIGINT, libc::SIGHUP] {
            libc::signal(
                signo,
                shutdown_signal_handler as *const () as libc::sighandler_t,
            );
        }
    }
}

extern "C" fn shutdown_signal_handler(_signo: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::Relaxed);
}

/// DRM device wrapper
pub struct Device {
    file: File,
    resources: ResourceHandles,
    /// Whether we called SET_MASTER ourselves (libseat manages its own)
    owns_master: bool,
}

// Trait implementations required by drm crate
impl AsFd for Device {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl BasicDevice for Device {}
impl ControlDevice for Device {}

impl Device {
    /// Open DRM device
    ///
    /// # Arguments
    /// * `path` - Device path (e.g., "/dev/dri/card1")
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening DRM device: {}", path.display());

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("Cannot open DRM device {}", path.display()))?;

        Self::from_file(file)
    }

    /// Create Device from a pre-opened file descriptor
    ///
    /// Used when libseat provides the DRM device fd.
    /// The fd is duplicated, so the original can be closed.
    #[cfg(all(target_os = "linux", feature = "seatd"))]
    pub fn from_fd(fd: RawFd) -> Result<Self> {
        info!("Creating DRM device from fd {}", fd);

        let dup_fd = nix::unistd::dup(fd).context("Failed to dup DRM fd")?;
        let file = unsafe { File::from_raw_fd(dup_fd) };

        Self::from_file(file)
    }

    fn from_file(file: File) -> Result<Self> {
        let resources = read_resources(&file)?;

        info!(
            "DRM resources: connectors={}, crtcs={}, encoders={}",
            resources.connectors().len(),
            resources.crtcs().len(),
            resources.encoders().len(),
        );

        Ok(Self {
            file,
            resources,
            owns_master: false,
        })
    }

    /// Get connector info
    pub fn get_connector(&self, handle: connector::Handle) -> Result<connector::Info> {
        ControlDevice::get_connector(self, handle, false)
            .with_context(|| format!("Failed to get connector {:?} info", handle))
    }

    /// Get encoder info
    pub fn get_encoder(&self, handle: encoder::Handle) -> Result<encoder::Info> {
        ControlDevice::get_encoder(self, handle)
            .with_context(|| format!("Failed to get encoder {:?} info", handle))
    }

    /// Get CRTC info
    pub fn get_crtc(&self, handle: crtc::Handle) -> Result<crtc::Info> {
        ControlDevice::get_crtc(self, handle)
            .with_context(|| format!("Failed to get CRTC {:?} info", handle))
    }

    /// Get RawFd (needed for page flip polling)
    pub fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }

    /// Duplicate fd and return as File (for GBM device)
    pub fn dup_fd(&self) -> Result<File> {
        let fd = unsafe { libc::dup(self.file.as_raw_fd()) };
        if fd < 0 {
            return Err(anyhow!(
                "fd dup failed: {}",
                std::io::Error::last_os_error()
            ));
        }
        Ok(unsafe { File::from_raw_fd(fd) })
    }

    /// Find preferred connected connector based on priority
    ///
    /// When prefer_external is true, external connectors (HDMI, DP, DVI, VGA)
    /// are prioritized over built-in panels (DSI, DPI, eDP, LVDS).
    pub fn find_preferred_connector(
        &self,
        prefer_external: bool,
    ) -> Result<(connector::Handle, connector::Info)> {
        let mut connectors: Vec<(connector::Handle, connector::Info, i32)> = Vec::new();

        for &handle in self.resources.connectors() {
            let info = self.get_connector(handle)?;
            if info.state() == connector::State::Connected {
                let priority = connector_priority(info.interface(), prefer_external);
                connectors.push((handle, info, priority));
            }
        }

        // Stable sort keeps enumeration order among equal priorities
        connectors.sort_by_key(|(_, _, p)| *p);

        let (handle, info, _) = connectors
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No connected connector found"))?;
        info!("Selected connector: {:?} ({:?})", handle, info.interface());
        Ok((handle, info))
    }

    /// Find CRTC for connector
    pub fn find_crtc_for_connector(&self, connector: &connector::Info) -> Result<crtc::Handle> {
        // First check current encoder
        if let Some(encoder_handle) = connector.current_encoder() {
            let encoder = self.get_encoder(encoder_handle)?;
            if let Some(crtc_handle) = encoder.crtc() {
                return Ok(crtc_handle);
            }
        }

        // Find available encoder and CRTC
        for &encoder_handle in connector.encoders() {
            let encoder = self.get_encoder(encoder_handle)?;
            let possible = encoder.possible_crtcs();
            if let Some(&crtc_handle) = self.resources.filter_crtcs(possible).first() {
                return Ok(crtc_handle);
            }
        }

        Err(anyhow!("No CRTC found for connector"))
    }

    /// Acquire DRM master privileges (needed for mode setting)
    pub fn set_master(&mut self) -> Result<()> {
        let ret = unsafe { libc::ioctl(self.file.as_raw_fd(), drm_ioctl::DRM_IOCTL_SET_MASTER) };
        if ret < 0 {
            return Err(anyhow!(
                "SET_MASTER failed: {}",
                std::io::Error::last_os_error()
            ));
        }
        self.owns_master = true;
        info!("DRM master acquired");
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if self.owns_master {
            unsafe {
                libc::ioctl(self.file.as_raw_fd(), drm_ioctl::DRM_IOCTL_DROP_MASTER);
            }
            debug!("DRM master dropped");
        }
    }
}

/// Bare card file, so the drm traits can be used before Device exists
struct RawCard<'a>(&'a File);

impl AsFd for RawCard<'_> {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.0.as_fd()
    }
}

impl BasicDevice for RawCard<'_> {}
impl ControlDevice for RawCard<'_> {}

/// Query resource handles on a bare file
fn read_resources(file: &File) -> Result<ResourceHandles> {
    RawCard(file)
        .resource_handles()
        .context("Failed to get DRM resources")
}

/// Auto-detect the DRM card that drives a display
///
/// Raspberry Pi 4/5 expose the render-only v3d node and the vc4 KMS node as
/// separate cards, and their numbering is not stable. Pick the first card
/// that has a connected connector, falling back to the first card that exists.
pub fn find_drm_device() -> Result<String> {
    let mut first_existing: Option<String> = None;

    for i in 0..MAX_DRM_CARDS {
        let path = format!("/dev/dri/card{}", i);
        if !Path::new(&path).exists() {
            continue;
        }
        if first_existing.is_none() {
            first_existing = Some(path.clone());
        }

        match card_has_connected_output(&path) {
            Ok(true) => {
                debug!("{} has a connected output", path);
                return Ok(path);
            }
            Ok(false) => debug!("{} has no connected output", path),
            Err(e) => debug!("Cannot probe {}: {:#}", path, e),
        }
    }

    match first_existing {
        Some(path) => {
            warn!("No card with a connected output found, trying {}", path);
            Ok(path)
        }
        None => Err(anyhow!("/dev/dri/card* not found")),
    }
}

/// Look at a card without taking it over (no master, debug logging only)
fn card_has_connected_output(path: &str) -> Result<bool> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .with_context(|| format!("Cannot open {}", path))?;
    let resources = read_resources(&file)?;
    let card = RawCard(&file);
    Ok(resources.connectors().iter().any(|&handle| {
        ControlDevice::get_connector(&card, handle, false)
            .map(|info| info.state() == connector::State::Connected)
            .unwrap_or(false)
    }))
}

// DRM ioctl constants
mod drm_ioctl {
    // Linux: include/uapi/drm/drm.h
    // _IO('d', 0x1e) = SET_MASTER, _IO('d', 0x1f) = DROP_MASTER
    const DRM_IOCTL_BASE: u64 = 0x64;
    pub const DRM_IOCTL_SET_MASTER: libc::c_ulong =
        nix::request_code_none!(DRM_IOCTL_BASE, 0x1e) as libc::c_ulong;
    pub const DRM_IOCTL_DROP_MASTER: libc::c_ulong =
        nix::request_code_none!(DRM_IOCTL_BASE, 0x1f) as libc::c_ulong;
}

/// Get connector priority for display selection
///
/// When prefer_external is true, external connectors are prioritized.
/// Lower number = higher priority.
fn connector_priority(interface: connector::Interface, prefer_external: bool) -> i32 {
    use connector::Interface;

    if !prefer_external {
        // First connected wins
        return 0;
    }

    match interface {
        Interface::HDMIA | Interface::HDMIB => 10,
        Interface::DisplayPort => 20,
        Interface::DVID | Interface::DVII | Interface::DVIA => 30,
        Interface::VGA => 40,
        Interface::Composite | Interface::SVideo => 60,
        // Built-in panels last
        Interface::DSI => 100,
        Interface::DPI => 105,
        Interface::EmbeddedDisplayPort => 110,
        Interface::LVDS => 120,
        // Other/unknown
        _ => 50,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drm::control::connector::Interface;

    #[test]
    fn test_external_before_internal() {
        let hdmi = connector_priority(Interface::HDMIA, true);
        let dp = connector_priority(Interface::DisplayPort, true);
        let composite = connector_priority(Interface::Composite, true);
        let dsi = connector_priority(Interface::DSI, true);
        assert!(hdmi < dp);
        assert!(dp < composite);
        assert!(composite < dsi);
    }

    #[test]
    fn test_no_preference_is_flat() {
        assert_eq!(
            connector_priority(Interface::DSI, false),
            connector_priority(Interface::HDMIA, false)
        );
    }

    #[test]
    fn test_connected_output_check_rejects_non_card() {
        assert!(card_has_connected_output("/dev/null").is_err());
        assert!(card_has_connected_output("/nonexistent/dri/card0").is_err());
    }
}
