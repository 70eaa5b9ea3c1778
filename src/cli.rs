//! Command line parsing

use anyhow::{anyhow, bail, Result};

/// Options for a normal run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    /// Log renderer/version/vendor/extension strings before drawing
    pub info: bool,
    /// Stop after this many frames (0 = run until signalled)
    pub frames: u64,
    /// DRM device path overriding config and auto-detection
    pub device: Option<String>,
}

/// What the process was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(Options),
    Help,
    Version,
}

/// Parse arguments (without the program name)
///
/// Accepts both the single-dash `-info` form and GNU-style `--info`.
pub fn parse_args<I>(args: I) -> Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut opts = Options::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" | "-help" => return Ok(Command::Help),
            "-V" | "--version" | "-version" => return Ok(Command::Version),
            "-info" | "--info" => opts.info = true,
            "--frames" | "-frames" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("{} requires a value", arg))?;
                opts.frames = parse_frames(&value)?;
            }
            "--device" | "-device" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("{} requires a value", arg))?;
                opts.device = Some(value);
            }
            other => {
                if let Some(value) = other.strip_prefix("--frames=") {
                    opts.frames = parse_frames(value)?;
                } else if let Some(value) = other.strip_prefix("--device=") {
                    opts.device = Some(value.to_string());
                } else {
                    bail!("Unknown argument: {}", other);
                }
            }
        }
    }

    Ok(Command::Run(opts))
}

fn parse_frames(value: &str) -> Result<u64> {
    value
        .parse()
        .map_err(|_| anyhow!("Invalid frame count: {}", value))
}

/// Print help message
pub fn print_help() {
    println!(
        r#"gles-triangle {} - rotating OpenGL ES triangle on the Linux console

USAGE:
    gles-triangle [OPTIONS]

OPTIONS:
    -info, --info           Print GL renderer, version, vendor and extensions
    --frames N              Exit after N frames (default: run until Ctrl+C)
    --device PATH           DRM device (default: first card with a display)
    -h, --help              Print this help message
    -V, --version           Print version information

CONFIG FILE:
    $GLES_TRIANGLE_CONFIG, ~/.config/gles-triangle/config.toml
    or /etc/gles-triangle/config.toml
"#,
        env!("CARGO_PKG_VERSION")
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Command> {
        parse_args(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_no_args() {
        assert_eq!(parse(&[]).unwrap(), Command::Run(Options::default()));
    }

    #[test]
    fn test_info_flag() {
        for flag in ["-info", "--info"] {
            match parse(&[flag]).unwrap() {
                Command::Run(opts) => assert!(opts.info),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_frames_and_device() {
        let cmd = parse(&["--frames", "120", "--device=/dev/dri/card1"]).unwrap();
        assert_eq!(
            cmd,
            Command::Run(Options {
                info: false,
                frames: 120,
                device: Some("/dev/dri/card1".to_string()),
            })
        );
        let cmd = parse(&["--frames=5"]).unwrap();
        assert!(matches!(cmd, Command::Run(Options { frames: 5, .. })));
    }

    #[test]
    fn test_help_and_version() {
        assert_eq!(parse(&["-h"]).unwrap(), Command::Help);
        assert_eq!(parse(&["--info", "--version"]).unwrap(), Command::Version);
    }

    #[test]
    fn test_errors() {
        assert!(parse(&["--bogus"]).is_err());
        assert!(parse(&["--frames"]).is_err());
        assert!(parse(&["--frames", "many"]).is_err());
        assert!(parse(&["--device"]).is_err());
    }
}
