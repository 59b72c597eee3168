//! Configuration module for the merge pipeline.
//!
//! Settings are read from a TOML file. Every key is optional; missing keys keep their
//! built-in defaults, which match the behaviour of the command-line tool out of the box.
//!
//! # Configuration Structure
//!
//! - `tools` controls the external font editor (`fontforge`) used for conversion and merging
//! - `preview` sets the canvas, JPEG encoding, font-size search and preview strings
//! - `preview.light` / `preview.dark` set the colours of the two themed previews
//! - `shaping` selects the text shaping backend used for previews
//!
//! # Configuration Example
//!
//! ```toml
//! [tools]
//! fontforge = "/usr/bin/fontforge"
//! timeout_secs = 120
//! disable_external = false
//!
//! [preview]
//! width = 6400
//! height = 2880
//! quality = 95
//! dpi = 600
//!
//! [preview.dark]
//! background = { r = 18, g = 18, b = 18 }
//! textcolor = { r = 255, g = 255, b = 255 }
//!
//! [shaping]
//! backend = "auto"   # auto, complex or reshape
//! ```
//!
//! When no file is given on the command line, `fontmergerc.toml` is looked up in the
//! working directory and then in the user configuration directory.

use crate::MergeError;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use toml::Value;

/// Name of the configuration file looked up by [`discover_config`]
pub const CONFIG_FILE_NAME: &str = "fontmergerc.toml";

pub const LATIN_PREVIEW: &str = "The quick brown fox jumps over the lazy dog. 1234567890";
pub const ARABIC_PREVIEW: &str = "سمَات مجّانِية، إختر منْ بين أكثر من ١٠٠ سمة مجانية او انشئ سماتك الخاصة هُنا في هذا التطبيق النظيف الرائع، وأظهر الابداع.١٢٣٤٥٦٧٨٩٠";

/// Configuration source for the pipeline configuration.
#[derive(Debug, Clone)]
pub enum ConfigSource<'a> {
    /// Use the built-in defaults
    Default,
    /// Load configuration from a file path
    File(&'a str),
    /// Use a TOML string
    Embedded(&'a str),
}

/// External tool settings
#[derive(Debug, Clone, PartialEq)]
pub struct ToolConfig {
    /// Explicit path to fontforge; searched on `PATH` when unset
    pub fontforge: Option<PathBuf>,
    pub timeout: Duration,
    /// Skip the external tool entirely and use the in-process strategies
    pub disable_external: bool,
}

/// Colours of one preview image
#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    pub background: (u8, u8, u8),
    pub foreground: (u8, u8, u8),
    /// Appended to the preview file stem
    pub suffix: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreviewConfig {
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    pub dpi: u16,
    pub base_size: f32,
    pub size_step: f32,
    pub max_size: f32,
    pub latin_text: String,
    pub arabic_text: String,
    pub light: Theme,
    pub dark: Theme,
}

/// Which text shaping backend renders the previews
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapingMode {
    /// Complex shaping when the font supports it, reshape + reorder otherwise
    Auto,
    Complex,
    Reshape,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeConfig {
    pub tools: ToolConfig,
    pub preview: PreviewConfig,
    pub shaping: ShapingMode,
}

impl Default for ToolConfig {
    fn default() -> Self {
        ToolConfig {
            fontforge: None,
            timeout: Duration::from_secs(120),
            disable_external: false,
        }
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        PreviewConfig {
            width: 6400,
            height: 2880,
            quality: 95,
            dpi: 600,
            base_size: 330.0,
            size_step: 75.0,
            max_size: 1500.0,
            latin_text: LATIN_PREVIEW.to_string(),
            arabic_text: ARABIC_PREVIEW.to_string(),
            light: Theme {
                background: (255, 255, 255),
                foreground: (0, 0, 0),
                suffix: String::new(),
            },
            dark: Theme {
                background: (18, 18, 18),
                foreground: (255, 255, 255),
                suffix: "_121212".to_string(),
            },
        }
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        MergeConfig {
            tools: ToolConfig::default(),
            preview: PreviewConfig::default(),
            shaping: ShapingMode::Auto,
        }
    }
}

/// Longest accepted external tool timeout
pub const MAX_TIMEOUT_SECS: f64 = 86_400.0;

fn invalid(message: String, suggestion: &str) -> MergeError {
    MergeError::Config {
        message,
        suggestion: suggestion.to_string(),
    }
}

/// Parses an RGB color from a TOML table field.
///
/// Channels outside `0..=255` are rejected rather than wrapped.
fn parse_color(value: Option<&Value>, field: &str) -> Result<Option<(u8, u8, u8)>, MergeError> {
    let Some(color) = value.and_then(|c| c.get(field)) else {
        return Ok(None);
    };
    let channel = |name: &str| -> Result<Option<u8>, MergeError> {
        let Some(raw) = color.get(name).and_then(|v| v.as_integer()) else {
            return Ok(None);
        };
        u8::try_from(raw).map(Some).map_err(|_| {
            invalid(
                format!("Color channel {}.{} = {} is out of range", field, name, raw),
                "Use values between 0 and 255",
            )
        })
    };
    match (channel("r")?, channel("g")?, channel("b")?) {
        (Some(r), Some(g), Some(b)) => Ok(Some((r, g, b))),
        _ => Ok(None),
    }
}

fn parse_theme(value: Option<&Value>, default: Theme) -> Result<Theme, MergeError> {
    let mut theme = default;
    if let Some(color) = parse_color(value, "background")? {
        theme.background = color;
    }
    if let Some(color) = parse_color(value, "textcolor")? {
        theme.foreground = color;
    }
    if let Some(suffix) = value.and_then(|v| v.get("suffix")).and_then(|v| v.as_str()) {
        theme.suffix = suffix.to_string();
    }
    Ok(theme)
}

fn parse_number(value: &Value) -> Option<f64> {
    value
        .as_float()
        .or_else(|| value.as_integer().map(|i| i as f64))
}

fn parse_tools(value: Option<&Value>, default: ToolConfig) -> Result<ToolConfig, MergeError> {
    let mut tools = default;
    if let Some(section) = value {
        if let Some(path) = section.get("fontforge").and_then(|v| v.as_str()) {
            tools.fontforge = Some(PathBuf::from(path));
        }
        if let Some(secs) = section.get("timeout_secs").and_then(parse_number) {
            if !secs.is_finite() || secs > MAX_TIMEOUT_SECS {
                return Err(invalid(
                    format!("timeout_secs = {} is not a usable timeout", secs),
                    "Use a number of seconds between 1 and 86400",
                ));
            }
            tools.timeout = Duration::from_secs_f64(secs.max(1.0));
        }
        if let Some(disabled) = section.get("disable_external").and_then(|v| v.as_bool()) {
            tools.disable_external = disabled;
        }
    }
    Ok(tools)
}

fn parse_preview(value: Option<&Value>, default: PreviewConfig) -> Result<PreviewConfig, MergeError> {
    let mut preview = default;
    let Some(section) = value else {
        return Ok(preview);
    };
    let number = |key: &str| section.get(key).and_then(parse_number);
    if let Some(v) = number("width") {
        preview.width = v.max(1.0) as u32;
    }
    if let Some(v) = number("height") {
        preview.height = v.max(1.0) as u32;
    }
    if let Some(v) = number("quality") {
        preview.quality = v.clamp(1.0, 100.0) as u8;
    }
    if let Some(v) = number("dpi") {
        preview.dpi = v.clamp(1.0, u16::MAX as f64) as u16;
    }
    if let Some(v) = number("base_size") {
        preview.base_size = v as f32;
    }
    if let Some(v) = number("size_step") {
        preview.size_step = v as f32;
    }
    if let Some(v) = number("max_size") {
        preview.max_size = v as f32;
    }
    if let Some(text) = section.get("latin_text").and_then(|v| v.as_str()) {
        preview.latin_text = text.to_string();
    }
    if let Some(text) = section.get("arabic_text").and_then(|v| v.as_str()) {
        preview.arabic_text = text.to_string();
    }
    preview.light = parse_theme(section.get("light"), preview.light)?;
    preview.dark = parse_theme(section.get("dark"), preview.dark)?;
    Ok(preview)
}

fn parse_shaping(value: Option<&Value>) -> Result<ShapingMode, MergeError> {
    let backend = value
        .and_then(|s| s.get("backend"))
        .and_then(|v| v.as_str())
        .unwrap_or("auto");
    match backend {
        "auto" => Ok(ShapingMode::Auto),
        "complex" => Ok(ShapingMode::Complex),
        "reshape" => Ok(ShapingMode::Reshape),
        other => Err(MergeError::Config {
            message: format!("Unknown shaping backend '{}'", other),
            suggestion: "Use one of: auto, complex, reshape".to_string(),
        }),
    }
}

/// Parses a complete configuration from a TOML string.
///
/// # Examples
/// ```rust
/// use fontmerge::config::{parse_config_string, ShapingMode};
///
/// let config = parse_config_string(r#"
///     [preview]
///     width = 800
///     height = 400
///
///     [shaping]
///     backend = "reshape"
/// "#).unwrap();
/// assert_eq!(config.preview.width, 800);
/// assert_eq!(config.preview.quality, 95);
/// assert_eq!(config.shaping, ShapingMode::Reshape);
/// ```
pub fn parse_config_string(config_str: &str) -> Result<MergeConfig, MergeError> {
    let config: Value = toml::from_str(config_str).map_err(|e| MergeError::Config {
        message: e.to_string(),
        suggestion: "Check the TOML syntax of the configuration file".to_string(),
    })?;
    let defaults = MergeConfig::default();
    Ok(MergeConfig {
        tools: parse_tools(config.get("tools"), defaults.tools)?,
        preview: parse_preview(config.get("preview"), defaults.preview)?,
        shaping: parse_shaping(config.get("shaping"))?,
    })
}

/// Loads the configuration from the given source.
pub fn load_config_from_source(source: ConfigSource) -> Result<MergeConfig, MergeError> {
    match source {
        ConfigSource::Default => Ok(MergeConfig::default()),
        ConfigSource::File(path) => {
            debug!("Loading configuration from {}", path);
            let config_str = fs::read_to_string(Path::new(path)).map_err(|e| MergeError::Config {
                message: format!("Cannot read {}: {}", path, e),
                suggestion: "Check the path given with --config".to_string(),
            })?;
            parse_config_string(&config_str)
        }
        ConfigSource::Embedded(content) => parse_config_string(content),
    }
}

/// Finds a configuration file in the working directory or the user configuration directory
pub fn discover_config() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("fontmerge").join(CONFIG_FILE_NAME))
        .filter(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_color() {
        let color_toml: Value = toml::from_str(
            r#"
            background = { r = 18, g = 18, b = 18 }
        "#,
        )
        .unwrap();
        assert_eq!(parse_color(Some(&color_toml), "background").unwrap(), Some((18, 18, 18)));
        assert_eq!(parse_color(Some(&color_toml), "textcolor").unwrap(), None);
        assert_eq!(parse_color(None, "background").unwrap(), None);
    }

    #[test]
    fn test_out_of_range_color_channel_is_rejected() {
        let err = parse_config_string(
            r#"
            [preview.dark]
            background = { r = 300, g = 18, b = 18 }
        "#,
        )
        .unwrap_err();
        assert!(matches!(err, MergeError::Config { .. }));
        assert!(parse_config_string("[preview.light]\ntextcolor = { r = -1, g = 0, b = 0 }").is_err());
    }

    #[test]
    fn test_unusable_timeouts_are_rejected() {
        for value in ["inf", "-inf", "nan", "1e300"] {
            let err = parse_config_string(&format!("[tools]\ntimeout_secs = {}", value)).unwrap_err();
            assert!(matches!(err, MergeError::Config { .. }), "timeout_secs = {}", value);
        }
        let config = parse_config_string("[tools]\ntimeout_secs = 0.2").unwrap();
        assert_eq!(config.tools.timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_defaults_match_preview_contract() {
        let config = load_config_from_source(ConfigSource::Default).unwrap();
        assert_eq!((config.preview.width, config.preview.height), (6400, 2880));
        assert_eq!(config.preview.quality, 95);
        assert_eq!(config.preview.dpi, 600);
        assert_eq!(config.tools.timeout, Duration::from_secs(120));
        assert_eq!(config.preview.dark.background, (18, 18, 18));
        assert_eq!(config.preview.dark.suffix, "_121212");
        assert_eq!(config.shaping, ShapingMode::Auto);
    }

    #[test]
    fn test_config_source_embedded() {
        const EMBEDDED_CONFIG: &str = r#"
            [tools]
            fontforge = "/opt/ff/bin/fontforge"
            timeout_secs = 5
            disable_external = true

            [preview]
            quality = 80
            latin_text = "Hello"

            [preview.light]
            background = { r = 250, g = 240, b = 230 }
        "#;
        let config = load_config_from_source(ConfigSource::Embedded(EMBEDDED_CONFIG)).unwrap();
        assert_eq!(
            config.tools.fontforge,
            Some(PathBuf::from("/opt/ff/bin/fontforge"))
        );
        assert_eq!(config.tools.timeout, Duration::from_secs(5));
        assert!(config.tools.disable_external);
        assert_eq!(config.preview.quality, 80);
        assert_eq!(config.preview.latin_text, "Hello");
        assert_eq!(config.preview.light.background, (250, 240, 230));
        assert_eq!(config.preview.light.foreground, (0, 0, 0));
        assert_eq!(config.preview.arabic_text, ARABIC_PREVIEW);
    }

    #[test]
    fn test_parse_config_string_invalid_toml() {
        let err = parse_config_string("this is not valid toml {{{").unwrap_err();
        assert!(matches!(err, MergeError::Config { .. }));
    }

    #[test]
    fn test_unknown_shaping_backend_is_rejected() {
        assert!(parse_config_string("[shaping]\nbackend = \"graphite\"").is_err());
    }

    #[test]
    fn test_config_source_file_nonexistent() {
        assert!(load_config_from_source(ConfigSource::File("nonexistent.toml")).is_err());
    }
}
