//! libseat session backend
//!
//! Provides rootless DRM access via seatd or logind.

use std::cell::Cell;
use std::os::fd::{AsFd, AsRawFd, FromRawFd, OwnedFd};
use std::path::Path;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use libseat::{Seat, SeatEvent, SeatRef};
use log::{debug, info, warn};

/// Dispatch timeout while waiting for the session to become active
const DISPATCH_TIMEOUT_MS: i32 = 100;

/// libseat session manager
pub struct SeatSession {
    /// libseat handle
    seat: Seat,
    /// Set by the libseat callback on Enable/Disable
    active: Rc<Cell<bool>>,
}

impl SeatSession {
    /// Open a new seat session
    pub fn open() -> Result<Self> {
        let active = Rc::new(Cell::new(false));
        let active_cb = active.clone();

        let mut seat = Seat::open(move |seat_ref: &mut SeatRef, event: SeatEvent| match event {
            SeatEvent::Enable => {
                info!("libseat: session enabled");
                active_cb.set(true);
            }
            SeatEvent::Disable => {
                info!("libseat: session disabled");
                active_cb.set(false);
                // Must call disable() to acknowledge
                if let Err(e) = seat_ref.disable() {
                    warn!("libseat: failed to disable seat: {}", e);
                }
            }
        })
        .context("Failed to open libseat session")?;

        info!("libseat: opened seat '{}'", seat.name());

        Ok(Self { seat, active })
    }

    /// Check if session is currently active
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Dispatch libseat events until the session is enabled
    pub fn wait_until_active(&mut self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while !self.is_active() {
            if Instant::now() >= deadline {
                bail!("libseat session not enabled after {:?}", timeout);
            }
            self.seat
                .dispatch(DISPATCH_TIMEOUT_MS)
                .context("Failed to dispatch seat events")?;
        }
        Ok(())
    }

    /// Open a device through the seat
    ///
    /// The returned fd is a duplicate; libseat keeps the original.
    pub fn open_device<P: AsRef<Path>>(&mut self, path: P) -> Result<OwnedFd> {
        let path_str = path.as_ref().display().to_string();

        let device = self
            .seat
            .open_device(&path)
            .with_context(|| format!("Failed to open device: {}", path_str))?;

        let raw_fd = device.as_fd().as_raw_fd();
        debug!("libseat: opened device {} (fd={})", path_str, raw_fd);

        let dup_fd = nix::unistd::dup(raw_fd).context("Failed to dup device fd")?;
        Ok(unsafe { OwnedFd::from_raw_fd(dup_fd) })
    }
}

impl Drop for SeatSession {
    fn drop(&mut self) {
        info!("libseat: closing session");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Requires seatd or logind and a user with seat access.
    #[test]
    #[ignore]
    fn test_open_session() {
        let session = SeatSession::open();
        assert!(session.is_ok(), "Failed to open seat session");
    }
}
