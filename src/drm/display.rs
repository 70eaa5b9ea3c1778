//! DRM display management
//!
//! Mode setting, page flips and CRTC restore

use anyhow::{anyhow, bail, Context, Result};
use drm::control::{
    connector, crtc, framebuffer, Device as ControlDevice, Event, Mode, ModeTypeFlags,
    PageFlipFlags,
};
use log::{debug, info, warn};

use super::device::Device;
use crate::constants::PAGE_FLIP_TIMEOUT_MS;

/// Display configuration
pub struct DisplayConfig {
    pub connector_handle: connector::Handle,
    pub crtc_handle: crtc::Handle,
    pub mode: Mode,
    pub width: u32,
    pub height: u32,
}

impl DisplayConfig {
    /// Pick a connected connector (optionally external first), its CRTC and mode
    pub fn detect_with_preference(device: &Device, prefer_external: bool) -> Result<Self> {
        let (connector_handle, connector_info) = device.find_preferred_connector(prefer_external)?;

        let crtc_handle = device.find_crtc_for_connector(&connector_info)?;
        info!("CRTC: {:?}", crtc_handle);

        let mode = select_mode(connector_info.modes())?;
        let (width, height) = mode.size();
        info!(
            "Display mode: {}x{} @ {}Hz",
            width,
            height,
            mode.vrefresh()
        );

        Ok(Self {
            connector_handle,
            crtc_handle,
            mode,
            width: width as u32,
            height: height as u32,
        })
    }
}

/// Preferred mode, or the first one the connector lists
fn select_mode(modes: &[Mode]) -> Result<Mode> {
    if modes.is_empty() {
        bail!("No available display modes");
    }

    modes
        .iter()
        .find(|m| m.mode_type().contains(ModeTypeFlags::PREFERRED))
        .or_else(|| modes.first())
        .copied()
        .ok_or_else(|| anyhow!("Failed to select display mode"))
}

/// DRM framebuffer wrapping a GBM buffer object
///
/// Removed from the device on drop.
pub struct DrmFramebuffer<'a> {
    device: &'a Device,
    fb: framebuffer::Handle,
}

impl<'a> DrmFramebuffer<'a> {
    /// Create framebuffer from GBM BO (24-bit depth, 32 bpp)
    pub fn from_bo(device: &'a Device, bo: &gbm::BufferObject<std::fs::File>) -> Result<Self> {
        let fb = device
            .add_framebuffer(bo, 24, 32)
            .context("Failed to add framebuffer")?;
        debug!("Framebuffer created: {:?}", fb);
        Ok(Self { device, fb })
    }

    pub fn handle(&self) -> framebuffer::Handle {
        self.fb
    }
}

impl Drop for DrmFramebuffer<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.device.destroy_framebuffer(self.fb) {
            warn!("Failed to remove framebuffer {:?}: {}", self.fb, e);
        }
    }
}

/// Set display mode and scan out `fb` immediately
pub fn set_crtc(device: &Device, config: &DisplayConfig, fb: &DrmFramebuffer) -> Result<()> {
    device
        .set_crtc(
            config.crtc_handle,
            Some(fb.handle()),
            (0, 0),
            &[config.connector_handle],
            Some(config.mode),
        )
        .context("Failed to set display mode")?;
    Ok(())
}

/// Queue `fb` for the next vblank and block until the flip completes
pub fn page_flip(device: &Device, config: &DisplayConfig, fb: &DrmFramebuffer) -> Result<()> {
    device
        .page_flip(config.crtc_handle, fb.handle(), PageFlipFlags::EVENT, None)
        .context("Failed to queue page flip")?;
    wait_for_page_flip(device, config.crtc_handle)
}

/// Wait for the page flip event of `crtc_handle`
///
/// The fd may be non-blocking (libseat opens devices that way), so poll first.
fn wait_for_page_flip(device: &Device, crtc_handle: crtc::Handle) -> Result<()> {
    loop {
        let mut pfd = libc::pollfd {
            fd: device.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let ret = unsafe { libc::poll(&mut pfd, 1, PAGE_FLIP_TIMEOUT_MS) };
        if ret < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return Err(anyhow!("poll on DRM fd failed: {}", err));
        }
        if ret == 0 {
            bail!("Timed out waiting for page flip");
        }

        let events = device
            .receive_events()
            .context("Failed to read DRM events")?;
        for event in events {
            if let Event::PageFlip(flip) = event {
                if flip.crtc == crtc_handle {
                    return Ok(());
                }
            }
        }
    }
}

/// Original CRTC configuration, restored on drop
pub struct SavedCrtc<'a> {
    device: &'a Device,
    crtc_handle: crtc::Handle,
    info: crtc::Info,
    connector: connector::Handle,
}

impl<'a> SavedCrtc<'a> {
    pub fn save(device: &'a Device, config: &DisplayConfig) -> Result<Self> {
        let info = device.get_crtc(config.crtc_handle)?;
        Ok(Self {
            device,
            crtc_handle: config.crtc_handle,
            info,
            connector: config.connector_handle,
        })
    }
}

impl Drop for SavedCrtc<'_> {
    fn drop(&mut self) {
        let Some(fb) = self.info.framebuffer() else {
            debug!("No previous framebuffer to restore");
            return;
        };
        match self.device.set_crtc(
            self.crtc_handle,
            Some(fb),
            self.info.position(),
            &[self.connector],
            self.info.mode(),
        ) {
            Ok(()) => info!("Restored previous display mode"),
            Err(e) => warn!("Failed to restore previous display mode: {}", e),
        }
    }
}
