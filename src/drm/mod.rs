//! DRM/KMS display management

pub mod device;
pub mod display;

pub use device::{find_drm_device, setup_signal_handlers, shutdown_requested, Device};
pub use display::{page_flip, set_crtc, DisplayConfig, DrmFramebuffer, SavedCrtc};
