//! gles-triangle - rotating OpenGL ES triangle on the Linux console
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  Session (libseat / direct DRM open)     │
//! │                 ↓                        │
//! │  DRM/KMS: connector, CRTC, mode          │
//! │                 ↓                        │
//! │  GBM surface → EGL context → GL ES 2     │
//! │                 ↓                        │
//! │  Render loop: rotate, scale, draw, swap  │
//! │                 ↓                        │
//! │  Page flip (vsync) or SetCrtc            │
//! └──────────────────────────────────────────┘
//! ```

mod cli;
mod config;
mod constants;
mod drm;
mod gpu;
mod session;
mod utils;

use anyhow::{Context, Result};
use log::{debug, info, trace, warn};
use std::time::{Duration, Instant};

use crate::cli::{Command, Options};
use crate::config::Config;
use crate::constants::FPS_LOG_INTERVAL_FRAMES;
use crate::gpu::transform;
use crate::gpu::{
    check_gl_error, GlError, GlRenderer, TriangleMesh, TriangleShader, GL_INFO_LOG_TARGET,
};

/// DRM device plus the libseat session that granted it (if any)
///
/// Field order matters: the device is closed before the session.
struct DrmAccess {
    device: drm::Device,
    #[cfg(all(target_os = "linux", feature = "seatd"))]
    _seat: Option<session::SeatSession>,
}

/// Open the DRM device through libseat, falling back to a direct open
#[cfg(all(target_os = "linux", feature = "seatd"))]
fn open_drm(path: &str) -> Result<DrmAccess> {
    match open_via_seat(path) {
        Ok((seat, device)) => {
            return Ok(DrmAccess {
                device,
                _seat: Some(seat),
            })
        }
        Err(e) => warn!("libseat unavailable ({:#}), opening {} directly", e, path),
    }

    Ok(DrmAccess {
        device: open_direct(path)?,
        _seat: None,
    })
}

#[cfg(all(target_os = "linux", feature = "seatd"))]
fn open_via_seat(path: &str) -> Result<(session::SeatSession, drm::Device)> {
    use crate::constants::SEAT_ENABLE_TIMEOUT_MS;
    use std::os::fd::AsRawFd;

    let mut seat = session::SeatSession::open()?;
    seat.wait_until_active(Duration::from_millis(SEAT_ENABLE_TIMEOUT_MS))?;
    let fd = seat
        .open_device(path)
        .context("Cannot open DRM device via libseat")?;
    let device =
        drm::Device::from_fd(fd.as_raw_fd()).context("Cannot create DRM device from libseat fd")?;
    Ok((seat, device))
}

#[cfg(not(all(target_os = "linux", feature = "seatd")))]
fn open_drm(path: &str) -> Result<DrmAccess> {
    Ok(DrmAccess {
        device: open_direct(path)?,
    })
}

/// Open the device ourselves and ask for DRM master
fn open_direct(path: &str) -> Result<drm::Device> {
    let mut device = drm::Device::open(path)
        .context("Cannot open DRM device. Root privileges may be required.")?;
    if let Err(e) = device.set_master() {
        warn!("{:#} (mode setting may fail)", e);
    }
    Ok(device)
}

/// DRM device path: command line, then config, then auto-detect
fn resolve_device_path(opts: &Options, cfg: &Config) -> Result<String> {
    if let Some(path) = &opts.device {
        return Ok(path.clone());
    }
    if !cfg.display.device.is_empty() {
        return Ok(cfg.display.device.clone());
    }
    drm::find_drm_device()
}

/// Record one frame: matrix upload, clear, bind buffers, draw
fn draw_frame(
    renderer: &GlRenderer,
    shader: &TriangleShader,
    mesh: &TriangleMesh,
    angle: f32,
    scale: f32,
    viewport: (i32, i32),
    clear: (f32, f32, f32),
) -> Result<(), GlError> {
    let gl = renderer.gl();
    let matrix = transform::model_matrix(angle, scale);

    shader.bind(gl);
    shader.set_matrix(gl, &matrix);

    renderer.set_viewport(0, 0, viewport.0, viewport.1);
    renderer.clear(clear.0, clear.1, clear.2, 1.0);
    mesh.draw(gl, shader);

    check_gl_error(gl, "draw")
}

/// Report service state to systemd (no-op outside a notify unit)
fn notify_systemd(state: sd_notify::NotifyState) {
    if let Err(e) = sd_notify::notify(false, &[state]) {
        debug!("sd_notify failed: {}", e);
    }
}

/// Logger for the given options
///
/// `-info` keeps the GL info records visible whatever `RUST_LOG` says.
fn logger_builder(opts: &Options) -> env_logger::Builder {
    let default_filter = if opts.info { "info" } else { "warn" };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter));
    if opts.info {
        show_gl_info(&mut builder);
    }
    builder
}

fn show_gl_info(builder: &mut env_logger::Builder) {
    builder.filter_module(GL_INFO_LOG_TARGET, log::LevelFilter::Info);
}

fn run(opts: &Options, cfg: &Config) -> Result<()> {
    // Phase 1: DRM/KMS initialization
    let drm_path = resolve_device_path(opts, cfg)?;
    info!("DRM device: {}", drm_path);

    let access = open_drm(&drm_path)?;
    let drm_device = &access.device;

    let display_config =
        drm::DisplayConfig::detect_with_preference(drm_device, cfg.display.prefer_external)
            .context("Failed to detect display configuration")?;
    let viewport = (display_config.width as i32, display_config.height as i32);

    // Phase 2: GBM + EGL + GL
    let gbm_device = gpu::GbmDevice::new(drm_device.dup_fd()?)?;
    let gbm_surface = gpu::GbmSurface::new(
        gbm_device.device(),
        display_config.width,
        display_config.height,
    )?;
    let egl_context = gpu::EglContext::new(gbm_device.device(), gbm_surface.surface())?;
    let renderer = GlRenderer::new(&egl_context)?;

    if opts.info {
        renderer.info().log();
    }

    // Phase 3: shaders and static buffers
    let gl = renderer.gl();
    let shader = TriangleShader::new(gl)?;
    let mesh = TriangleMesh::new(gl)?;
    check_gl_error(gl, "initialization")?;

    // Framebuffer currently on screen, with its BO.
    // Declared before the saved CRTC so the old mode is restored first.
    let mut on_screen: Option<(drm::DrmFramebuffer, gbm::BufferObject<std::fs::File>)> = None;
    let _saved_crtc = match drm::SavedCrtc::save(drm_device, &display_config) {
        Ok(saved) => Some(saved),
        Err(e) => {
            warn!("Cannot save current CRTC, it will not be restored: {:#}", e);
            None
        }
    };

    let render = &cfg.render;
    let clear = render.clear_rgb();
    let frame_interval = Duration::from_millis(render.frame_interval_ms);

    let mut angle = 0.0_f32;
    let mut frame: u64 = 0;
    let mut fps_window = Instant::now();

    info!(
        "Entering render loop (vsync: {}, frames: {})",
        render.vsync,
        if opts.frames == 0 {
            "unlimited".to_string()
        } else {
            opts.frames.to_string()
        }
    );

    while !drm::shutdown_requested() && (opts.frames == 0 || frame < opts.frames) {
        draw_frame(
            &renderer,
            &shader,
            &mesh,
            angle,
            render.scale,
            viewport,
            clear,
        )?;
        egl_context.swap_buffers()?;

        let bo = gbm_surface.lock_front_buffer()?;
        let fb = drm::DrmFramebuffer::from_bo(drm_device, &bo)?;
        if on_screen.is_none() || !render.vsync {
            drm::set_crtc(drm_device, &display_config, &fb)?;
        } else {
            drm::page_flip(drm_device, &display_config, &fb)?;
        }
        // Previous buffer is no longer scanned out
        on_screen = Some((fb, bo));

        if frame == 0 {
            info!("First frame presented");
            notify_systemd(sd_notify::NotifyState::Ready);
        }

        if !render.vsync && !frame_interval.is_zero() {
            std::thread::sleep(frame_interval);
        }

        angle = transform::advance_angle(angle, render.rotation_step);
        frame += 1;

        if frame % FPS_LOG_INTERVAL_FRAMES == 0 {
            let elapsed = fps_window.elapsed().as_secs_f32();
            trace!(
                "frame {}: {:.1} fps",
                frame,
                FPS_LOG_INTERVAL_FRAMES as f32 / elapsed.max(f32::EPSILON)
            );
            fps_window = Instant::now();
        }
    }

    if drm::shutdown_requested() {
        info!("Shutdown requested");
        notify_systemd(sd_notify::NotifyState::Stopping);
    }

    // Resource cleanup (CRTC restore, EGL and GBM teardown happen on drop)
    mesh.destroy(gl);
    shader.destroy(gl);

    info!("gles-triangle terminated after {} frames", frame);
    Ok(())
}

fn main() -> Result<()> {
    let command = cli::parse_args(std::env::args().skip(1)).map_err(|e| {
        cli::print_help();
        e
    })?;

    let opts = match command {
        Command::Help => {
            cli::print_help();
            return Ok(());
        }
        Command::Version => {
            println!("gles-triangle {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Command::Run(opts) => opts,
    };

    logger_builder(&opts).init();

    info!("gles-triangle starting...");

    let cfg = Config::load();
    drm::setup_signal_handlers();

    run(&opts, &cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::{Level, Log, Metadata};

    fn enabled(logger: &env_logger::Logger, target: &str, level: Level) -> bool {
        logger.enabled(&Metadata::builder().target(target).level(level).build())
    }

    #[test]
    fn test_gl_info_survives_restrictive_filter() {
        let mut builder = env_logger::Builder::new();
        builder.parse_filters("warn");
        show_gl_info(&mut builder);
        let logger = builder.build();

        assert!(enabled(&logger, GL_INFO_LOG_TARGET, Level::Info));
        assert!(!enabled(&logger, "gles_triangle::drm::device", Level::Info));
    }

    #[test]
    fn test_gl_info_overrides_module_filter() {
        let mut builder = env_logger::Builder::new();
        builder.parse_filters(&format!("warn,{}=off", GL_INFO_LOG_TARGET));
        show_gl_info(&mut builder);
        let logger = builder.build();

        assert!(enabled(&logger, GL_INFO_LOG_TARGET, Level::Info));
    }

    #[test]
    fn test_gl_info_hidden_without_flag() {
        let mut builder = env_logger::Builder::new();
        builder.parse_filters("warn");
        let logger = builder.build();

        assert!(!enabled(&logger, GL_INFO_LOG_TARGET, Level::Info));
    }

    #[test]
    fn test_notify_systemd_sends_state() {
        use std::os::unix::net::UnixDatagram;

        let path = std::env::temp_dir()
            .join(format!("gles-triangle-notify-{}", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let sock = UnixDatagram::bind(&path).unwrap();
        std::env::set_var("NOTIFY_SOCKET", &path);

        notify_systemd(sd_notify::NotifyState::Stopping);

        std::env::remove_var("NOTIFY_SOCKET");
        let mut buf = [0u8; 64];
        let n = sock.recv(&mut buf).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(std::str::from_utf8(&buf[..n]).unwrap().trim(), "STOPPING=1");
    }
}
