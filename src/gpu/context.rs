//! GPU context management
//!
//! GBM + EGL + OpenGL ES 2 setup

use anyhow::{anyhow, Context, Result};
use gbm::AsRaw;
use glow::HasContext;
use khronos_egl as egl;
use log::{debug, info, warn};
use std::ffi::c_void;
use std::fs::File;

// EGL_PLATFORM_GBM_KHR (EGL extension)
const EGL_PLATFORM_GBM_KHR: egl::Enum = 0x31D7;

/// Log target for the `-info` driver strings
pub const GL_INFO_LOG_TARGET: &str = "gles_triangle::gl_info";

/// Scanout format shared by the GBM surface and the EGL config
const SURFACE_FORMAT: gbm::Format = gbm::Format::Xrgb8888;

/// GBM device
pub struct GbmDevice {
    device: gbm::Device<File>,
}

impl GbmDevice {
    /// Create GBM device from DRM file descriptor
    pub fn new(drm_file: File) -> Result<Self> {
        let device = gbm::Device::new(drm_file)
            .map_err(|e| anyhow!("Failed to create GBM device: {:?}", e))?;
        info!("GBM device created (backend: {})", device.backend_name());
        Ok(Self { device })
    }

    /// Reference to internal device
    pub fn device(&self) -> &gbm::Device<File> {
        &self.device
    }
}

/// GBM surface
pub struct GbmSurface {
    surface: gbm::Surface<File>,
}

impl GbmSurface {
    /// Create scanout-capable GBM surface
    pub fn new(device: &gbm::Device<File>, width: u32, height: u32) -> Result<Self> {
        let surface = device
            .create_surface::<File>(
                width,
                height,
                SURFACE_FORMAT,
                gbm::BufferObjectFlags::SCANOUT | gbm::BufferObjectFlags::RENDERING,
            )
            .map_err(|e| anyhow!("Failed to create GBM surface: {:?}", e))?;

        info!("GBM surface created: {}x{}", width, height);
        Ok(Self { surface })
    }

    /// Reference to internal surface
    pub fn surface(&self) -> &gbm::Surface<File> {
        &self.surface
    }

    /// Lock front buffer after eglSwapBuffers
    ///
    /// The buffer returns to the surface when the BO is dropped.
    pub fn lock_front_buffer(&self) -> Result<gbm::BufferObject<File>> {
        unsafe {
            self.surface
                .lock_front_buffer()
                .map_err(|e| anyhow!("Failed to lock front buffer: {:?}", e))
        }
    }
}

/// EGL instance type (dynamic loading)
type EglInstance = egl::Instance<egl::Dynamic<libloading::Library, egl::EGL1_5>>;

/// EGL context
pub struct EglContext {
    instance: EglInstance,
    display: egl::Display,
    context: egl::Context,
    surface: egl::Surface,
}

impl EglContext {
    /// Initialize EGL with GBM platform and an ES 2 context
    pub fn new(gbm_device: &gbm::Device<File>, gbm_surface: &gbm::Surface<File>) -> Result<Self> {
        // Load EGL library
        let lib = unsafe {
            libloading::Library::new("libEGL.so.1")
                .or_else(|_| libloading::Library::new("libEGL.so"))
                .context("Failed to load EGL library")?
        };

        let instance: EglInstance = unsafe {
            egl::DynamicInstance::<egl::EGL1_5>::load_required_from(lib)
                .context("Failed to create EGL instance")?
        };

        // Get display with GBM platform
        let display = unsafe {
            instance
                .get_platform_display(
                    EGL_PLATFORM_GBM_KHR,
                    gbm_device.as_raw() as *mut c_void,
                    &[egl::ATTRIB_NONE],
                )
                .context("Failed to get EGL display")?
        };

        let (major, minor) = instance
            .initialize(display)
            .context("Failed to initialize EGL")?;
        info!("EGL initialized: {}.{}", major, minor);

        if let Ok(vendor) = instance.query_string(Some(display), egl::VENDOR) {
            debug!("EGL vendor: {}", vendor.to_string_lossy());
        }

        instance
            .bind_api(egl::OPENGL_ES_API)
            .context("Failed to bind OpenGL ES API")?;

        let config = Self::choose_config(&instance, display)?;

        let context_attribs = [egl::CONTEXT_CLIENT_VERSION, 2, egl::NONE];
        let context = instance
            .create_context(display, config, None, &context_attribs)
            .context("Failed to create EGL context")?;

        // Wrap GBM surface: platform surface first, legacy entry point as fallback
        let surface = unsafe {
            instance
                .create_platform_window_surface(
                    display,
                    config,
                    gbm_surface.as_raw() as *mut c_void,
                    &[egl::ATTRIB_NONE],
                )
                .or_else(|_| {
                    instance.create_window_surface(
                        display,
                        config,
                        gbm_surface.as_raw() as egl::NativeWindowType,
                        None,
                    )
                })
                .context("Failed to create EGL surface")?
        };

        instance
            .make_current(display, Some(surface), Some(surface), Some(context))
            .context("Failed to make EGL context current")?;

        info!("EGL context created (OpenGL ES 2)");

        Ok(Self {
            instance,
            display,
            context,
            surface,
        })
    }

    /// Swap buffers
    pub fn swap_buffers(&self) -> Result<()> {
        self.instance
            .swap_buffers(self.display, self.surface)
            .context("Failed to swap buffers")?;
        Ok(())
    }

    /// Choose an ES 2 window config whose native visual matches the GBM format
    fn choose_config(instance: &EglInstance, display: egl::Display) -> Result<egl::Config> {
        let config_attribs = [
            egl::SURFACE_TYPE,
            egl::WINDOW_BIT,
            egl::RED_SIZE,
            8,
            egl::GREEN_SIZE,
            8,
            egl::BLUE_SIZE,
            8,
            egl::ALPHA_SIZE,
            0,
            egl::DEPTH_SIZE,
            0,
            egl::RENDERABLE_TYPE,
            egl::OPENGL_ES2_BIT,
            egl::NONE,
        ];

        let count = instance
            .matching_config_count(display, &config_attribs)
            .context("eglChooseConfig failed")?;
        let mut configs = Vec::with_capacity(count);
        instance
            .choose_config(display, &config_attribs, &mut configs)
            .context("eglChooseConfig failed")?;

        let wanted = SURFACE_FORMAT as egl::Int;
        let matching = configs.iter().copied().find(|&config| {
            instance
                .get_config_attrib(display, config, egl::NATIVE_VISUAL_ID)
                .map(|id| id == wanted)
                .unwrap_or(false)
        });

        match matching {
            Some(config) => Ok(config),
            None => {
                debug!("No EGL config with matching native visual, using first match");
                configs
                    .first()
                    .copied()
                    .ok_or_else(|| anyhow!("No suitable EGL config found"))
            }
        }
    }

    /// Load GL function pointers
    pub fn get_proc_address(&self, name: &str) -> *const c_void {
        self.instance
            .get_proc_address(name)
            .map(|f| f as *const c_void)
            .unwrap_or(std::ptr::null())
    }
}

impl Drop for EglContext {
    fn drop(&mut self) {
        let _ = self.instance.make_current(self.display, None, None, None);
        let _ = self.instance.destroy_surface(self.display, self.surface);
        let _ = self.instance.destroy_context(self.display, self.context);
        let _ = self.instance.terminate(self.display);
        debug!("EGL context destroyed");
    }
}

/// OpenGL ES version
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GlEsVersion {
    pub major: u32,
    pub minor: u32,
}

impl GlEsVersion {
    /// Parse version from GL_VERSION string (e.g., "OpenGL ES 2.0 Mesa 23.2.1")
    fn parse(version_str: &str) -> Self {
        let default = Self { major: 2, minor: 0 };

        let Some(pos) = version_str.find("ES ") else {
            return default;
        };
        let version_part: String = version_str[pos + 3..]
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();

        let mut parts = version_part.split('.');
        match (
            parts.next().and_then(|p| p.parse().ok()),
            parts.next().and_then(|p| p.parse().ok()),
        ) {
            (Some(major), Some(minor)) => Self { major, minor },
            _ => default,
        }
    }

    /// GLSL ES 1.00 shaders need at least ES 2.0
    fn runs_triangle_shader(&self) -> bool {
        self.major >= 2
    }
}

/// Driver identification strings
#[derive(Clone, Debug)]
pub struct GlInfo {
    pub renderer: String,
    pub version: String,
    pub vendor: String,
    pub extensions: String,
}

impl GlInfo {
    /// Log in the classic `GL_XXX = value` layout
    pub fn log(&self) {
        info!(target: GL_INFO_LOG_TARGET, "GL_RENDERER   = {}", self.renderer);
        info!(target: GL_INFO_LOG_TARGET, "GL_VERSION    = {}", self.version);
        info!(target: GL_INFO_LOG_TARGET, "GL_VENDOR     = {}", self.vendor);
        info!(target: GL_INFO_LOG_TARGET, "GL_EXTENSIONS = {}", self.extensions);
    }
}

/// OpenGL ES renderer
pub struct GlRenderer {
    gl: glow::Context,
}

impl GlRenderer {
    /// Initialize OpenGL ES from EGL context
    pub fn new(egl: &EglContext) -> Result<Self> {
        let gl = unsafe { glow::Context::from_loader_function(|name| egl.get_proc_address(name)) };

        let version = unsafe { gl.get_parameter_string(glow::VERSION) };
        let es_version = GlEsVersion::parse(&version);
        info!(
            "OpenGL ES: {} (detected ES {}.{})",
            version, es_version.major, es_version.minor
        );
        if !es_version.runs_triangle_shader() {
            warn!(
                "Context reports ES {}.{}, shaders may fail to compile",
                es_version.major, es_version.minor
            );
        }

        Ok(Self { gl })
    }

    /// Query renderer/version/vendor/extension strings
    pub fn info(&self) -> GlInfo {
        unsafe {
            GlInfo {
                renderer: self.gl.get_parameter_string(glow::RENDERER),
                version: self.gl.get_parameter_string(glow::VERSION),
                vendor: self.gl.get_parameter_string(glow::VENDOR),
                extensions: self.gl.get_parameter_string(glow::EXTENSIONS),
            }
        }
    }

    /// Clear color and depth
    pub fn clear(&self, r: f32, g: f32, b: f32, a: f32) {
        unsafe {
            self.gl.clear_color(r, g, b, a);
            self.gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
        }
    }

    /// Set viewport
    pub fn set_viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        unsafe {
            self.gl.viewport(x, y, width, height);
        }
    }

    /// Reference to glow context
    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_es_version() {
        assert_eq!(
            GlEsVersion::parse("OpenGL ES 3.1 Mesa 23.2.1-1~bpo12+rpt3"),
            GlEsVersion { major: 3, minor: 1 }
        );
        assert_eq!(
            GlEsVersion::parse("OpenGL ES 2.0 Mesa 20.3.5"),
            GlEsVersion { major: 2, minor: 0 }
        );
    }

    #[test]
    fn test_parse_es_version_fallback() {
        assert_eq!(
            GlEsVersion::parse("garbage"),
            GlEsVersion { major: 2, minor: 0 }
        );
        assert_eq!(
            GlEsVersion::parse("OpenGL ES x"),
            GlEsVersion { major: 2, minor: 0 }
        );
    }

    #[test]
    fn test_triangle_shader_needs_es2() {
        assert!(GlEsVersion::parse("OpenGL ES 2.0 Mesa 20.3.5").runs_triangle_shader());
        assert!(GlEsVersion::parse("OpenGL ES 3.1 V3D 7.1").runs_triangle_shader());
        assert!(!GlEsVersion { major: 1, minor: 1 }.runs_triangle_shader());
    }
}
