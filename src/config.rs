use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{
    error::{CommandError, ConfigError, HueError, Result},
    hue::ParameterResolver,
    video::{PixelFormat, Rational, StreamInfo, REINIT_COMMAND},
};

/// Main configuration for yuv-hue
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Filter options and scheduled runtime commands
    pub filter: FilterConfig,

    /// Properties of the raw input stream
    pub stream: StreamConfig,

    /// Execution settings
    pub processing: ProcessingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.filter.validate()?;
        self.stream.validate()?;
        self.processing.validate()?;
        Ok(())
    }
}

/// Filter options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Option text, `hue[:saturation]` or `h=..:H=..:s=..`
    pub options: String,

    /// Commands sent to the filter before given frames
    pub commands: Vec<ScheduledCommand>,
}

impl FilterConfig {
    fn validate(&self) -> Result<()> {
        ParameterResolver::from_options(&self.options)?;

        for command in &self.commands {
            if command.command != REINIT_COMMAND {
                return Err(CommandError::NotSupported {
                    name: command.command.clone(),
                }
                .into());
            }
            ParameterResolver::from_options(&command.args)?;
        }
        Ok(())
    }

    /// Commands due before the frame with index `frame`, in declaration order
    pub fn commands_at(&self, frame: u64) -> impl Iterator<Item = &ScheduledCommand> {
        self.commands.iter().filter(move |command| command.frame == frame)
    }
}

/// A runtime command applied before a given frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledCommand {
    /// Zero-based index of the frame the command precedes
    pub frame: u64,

    /// Command name, `reinit`
    pub command: String,

    /// Command arguments
    #[serde(default)]
    pub args: String,
}

impl FromStr for ScheduledCommand {
    type Err = HueError;

    /// Parse `FRAME:COMMAND:ARGS`; `ARGS` may itself contain `:`
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CommandError::InvalidSchedule { entry: s.to_string() };

        let mut parts = s.splitn(3, ':');
        let frame = parts
            .next()
            .and_then(|frame| frame.trim().parse::<u64>().ok())
            .ok_or_else(invalid)?;
        let command = parts
            .next()
            .map(str::trim)
            .filter(|command| !command.is_empty())
            .ok_or_else(invalid)?;
        let args = parts.next().unwrap_or_default();

        Ok(Self {
            frame,
            command: command.to_string(),
            args: args.to_string(),
        })
    }
}

/// Raw input stream description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Frame width in pixels
    pub width: usize,

    /// Frame height in pixels
    pub height: usize,

    /// Planar pixel format
    pub pixel_format: PixelFormat,

    /// Frame rate, `0/1` when unknown
    pub frame_rate: Rational,

    /// Timestamp unit, the inverse frame rate when unset
    pub time_base: Option<Rational>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            pixel_format: PixelFormat::Yuv420p,
            frame_rate: Rational::new(25, 1),
            time_base: None,
        }
    }
}

impl StreamConfig {
    /// Time base used for the stream timestamps
    pub fn effective_time_base(&self) -> Rational {
        match self.time_base {
            Some(time_base) => time_base,
            None if self.frame_rate.num > 0 && self.frame_rate.den > 0 => self.frame_rate.invert(),
            None => Rational::new(1, 1_000_000),
        }
    }

    pub fn stream_info(&self) -> StreamInfo {
        StreamInfo {
            width: self.width,
            height: self.height,
            format: self.pixel_format,
            time_base: self.effective_time_base(),
            frame_rate: self.frame_rate,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidValue {
                key: "stream.size".to_string(),
                value: format!("{}x{}", self.width, self.height)
            }.into());
        }

        if self.frame_rate.num < 0 || self.frame_rate.den < 0 {
            return Err(ConfigError::InvalidValue {
                key: "stream.frame_rate".to_string(),
                value: self.frame_rate.to_string()
            }.into());
        }

        if let Some(time_base) = self.time_base {
            if time_base.num <= 0 || time_base.den <= 0 {
                return Err(ConfigError::InvalidValue {
                    key: "stream.time_base".to_string(),
                    value: time_base.to_string()
                }.into());
            }
        }

        Ok(())
    }
}

/// Execution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Rows per range handed to the filter, whole frames when unset
    pub slice_height: Option<usize>,

    /// Number of worker threads
    pub threads: usize,

    /// Spread the rows of each range over the worker threads
    pub parallel_rows: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            slice_height: None,
            threads: num_cpus::get(),
            parallel_rows: false,
        }
    }
}

impl ProcessingConfig {
    fn validate(&self) -> Result<()> {
        if self.slice_height == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "processing.slice_height".to_string(),
                value: "0".to_string()
            }.into());
        }

        if self.threads == 0 {
            return Err(ConfigError::InvalidValue {
                key: "processing.threads".to_string(),
                value: self.threads.to_string()
            }.into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.processing.threads > 0);
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test_config.toml");

        let mut original_config = Config::default();
        original_config.filter.options = "h=90*t:s=1.5".to_string();
        original_config.filter.commands.push("25:reinit:h=0:s=0".parse().unwrap());
        original_config.stream.time_base = Some(Rational::new(1, 90000));
        original_config.processing.slice_height = Some(16);

        original_config.save_to_file(&file_path).unwrap();
        let loaded_config = Config::from_file(&file_path).unwrap();

        assert_eq!(original_config, loaded_config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("partial.toml");
        std::fs::write(
            &file_path,
            r#"
[filter]
options = "180:1"

[[filter.commands]]
frame = 10
command = "reinit"
args = "s=2"

[stream]
width = 640
height = 480
pixel_format = "yuv422p"
"#,
        )
        .unwrap();

        let config = Config::from_file(&file_path).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.stream.pixel_format, PixelFormat::Yuv422p);
        assert_eq!(config.stream.frame_rate, Rational::new(25, 1));
        assert_eq!(config.stream.effective_time_base(), Rational::new(1, 25));
        assert_eq!(config.filter.commands_at(10).count(), 1);
        assert_eq!(config.filter.commands_at(11).count(), 0);
        assert_eq!(config.processing.slice_height, None);
    }

    #[test]
    fn test_missing_and_malformed_files() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            Config::from_file(dir.path().join("missing.toml")),
            Err(HueError::Config(ConfigError::FileNotFound { .. }))
        ));

        let file_path = dir.path().join("broken.toml");
        std::fs::write(&file_path, "[stream]\nwidth = \"wide\"\n").unwrap();
        assert!(matches!(
            Config::from_file(&file_path),
            Err(HueError::Config(ConfigError::ParseFailed { .. }))
        ));
    }

    #[test]
    fn test_invalid_filter_options() {
        let mut config = Config::default();
        config.filter.options = "h=1:H=2".to_string();
        assert!(config.validate().is_err());

        config.filter.options = "h=sin(".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_commands() {
        let mut config = Config::default();
        config.filter.commands.push("3:rotate:90".parse().unwrap());
        assert!(matches!(
            config.validate(),
            Err(HueError::Command(CommandError::NotSupported { .. }))
        ));

        config.filter.commands = vec!["3:reinit:20:11".parse().unwrap()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_stream_and_processing() {
        let mut config = Config::default();
        config.stream.width = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.stream.time_base = Some(Rational::new(0, 1));
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.processing.threads = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.processing.slice_height = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_scheduled_command() {
        let command: ScheduledCommand = "12:reinit:h=90:s=2".parse().unwrap();
        assert_eq!(command.frame, 12);
        assert_eq!(command.command, "reinit");
        assert_eq!(command.args, "h=90:s=2");

        let command: ScheduledCommand = "0:reinit".parse().unwrap();
        assert_eq!(command.args, "");

        assert!("x:reinit:90".parse::<ScheduledCommand>().is_err());
        assert!("4".parse::<ScheduledCommand>().is_err());
        assert!("4::90".parse::<ScheduledCommand>().is_err());
    }

    #[test]
    fn test_unknown_frame_rate_time_base() {
        let stream = StreamConfig {
            frame_rate: Rational::new(0, 1),
            ..StreamConfig::default()
        };
        assert_eq!(stream.effective_time_base(), Rational::new(1, 1_000_000));
        assert!(stream.validate().is_ok());
    }
}
