//! [`ScreenSource`] backed by external tools.
//!
//! The screenshot command writes an image file whose path is its last
//! argument (e.g. `xfce4-screenshooter -f -s /tmp/kivnc/shot.png`); the
//! pointer comes from `xdotool getmouselocation`.

use std::path::{Path, PathBuf};
use std::process::Command;

use image::RgbImage;

use super::ScreenSource;
use crate::error::{Error, Result};
use crate::input::xdotool::XDOTOOL;

/// Screenshot via an external command, pointer via xdotool.
#[derive(Debug, Clone)]
pub struct CommandScreenSource {
    command: Vec<String>,
    output: PathBuf,
}

impl CommandScreenSource {
    /// Build a source from a screenshot argv. The last element is the
    /// file the command writes; its directory is created if missing.
    pub fn new(command: Vec<String>) -> Result<Self> {
        let output = match command.as_slice() {
            [_, .., last] => PathBuf::from(last),
            _ => {
                return Err(Error::Other(
                    "screenshot command needs a program and an output path".into(),
                ));
            }
        };
        if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        Ok(Self { command, output })
    }

    /// File the screenshot command writes.
    pub fn output(&self) -> &Path {
        &self.output
    }
}

impl ScreenSource for CommandScreenSource {
    fn capture(&self) -> Result<RgbImage> {
        let out = Command::new(&self.command[0])
            .args(&self.command[1..])
            .output()
            .map_err(|e| Error::Capture(format!("{}: {e}", self.command[0])))?;
        if !out.status.success() {
            return Err(Error::Capture(format!(
                "{} exited with {}: {}",
                self.command[0],
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        let size = std::fs::metadata(&self.output)
            .map_err(|e| Error::Capture(format!("{}: {e}", self.output.display())))?
            .len();
        if size == 0 {
            return Err(Error::Capture(format!(
                "{} is empty",
                self.output.display()
            )));
        }

        Ok(image::open(&self.output)?.to_rgb8())
    }

    fn pointer(&self) -> Result<(i32, i32)> {
        let out = Command::new(XDOTOOL)
            .arg("getmouselocation")
            .output()
            .map_err(|e| Error::Capture(format!("{XDOTOOL}: {e}")))?;
        if !out.status.success() {
            return Err(Error::Capture(format!(
                "{XDOTOOL} getmouselocation exited with {}",
                out.status
            )));
        }
        parse_mouse_location(&String::from_utf8_lossy(&out.stdout))
    }
}

/// Parse `x:812 y:433 screen:0 window:71303176`.
pub fn parse_mouse_location(text: &str) -> Result<(i32, i32)> {
    let mut x = None;
    let mut y = None;
    for field in text.split_whitespace() {
        match field.split_once(':') {
            Some(("x", v)) => x = v.parse().ok(),
            Some(("y", v)) => y = v.parse().ok(),
            _ => {}
        }
    }
    match (x, y) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(Error::Capture(format!("unparsable pointer location: {text:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("kivnc-test-{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn parses_xdotool_output() {
        assert_eq!(
            parse_mouse_location("x:812 y:433 screen:0 window:71303176\n").unwrap(),
            (812, 433)
        );
        assert!(parse_mouse_location("screen:0").is_err());
        assert!(parse_mouse_location("x:abc y:1").is_err());
    }

    #[test]
    fn needs_program_and_output() {
        assert!(CommandScreenSource::new(vec![]).is_err());
        assert!(CommandScreenSource::new(vec!["shot".into()]).is_err());
    }

    #[test]
    fn reads_the_written_file() {
        let path = scratch("shot.png");
        let source =
            CommandScreenSource::new(vec!["true".into(), path.display().to_string()]).unwrap();
        RgbImage::from_pixel(6, 4, image::Rgb([1, 2, 3]))
            .save(&path)
            .unwrap();

        let image = source.capture().unwrap();
        assert_eq!(image.dimensions(), (6, 4));
        assert_eq!(image.get_pixel(0, 0), &image::Rgb([1, 2, 3]));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn failing_command_is_a_capture_error() {
        let path = scratch("never.png");
        let source =
            CommandScreenSource::new(vec!["false".into(), path.display().to_string()]).unwrap();
        assert!(matches!(source.capture(), Err(Error::Capture(_))));

        let missing = CommandScreenSource::new(vec![
            "kivnc-no-such-screenshooter".into(),
            path.display().to_string(),
        ])
        .unwrap();
        assert!(matches!(missing.capture(), Err(Error::Capture(_))));
    }
}
