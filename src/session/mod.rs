//! Session management
//!
//! With the `seatd` feature, DRM access goes through libseat (seatd or
//! logind) so the program can run without root. Without it, the device is
//! opened directly and DRM master is requested with SET_MASTER.

#[cfg(all(target_os = "linux", feature = "seatd"))]
mod seatd;
#[cfg(all(target_os = "linux", feature = "seatd"))]
pub use seatd::SeatSession;
