//! The fontmerge library combines an Arabic-script font and a Latin-script font into a single
//! TrueType font that renders both scripts, and renders JPEG previews of the result.
//!
//! The work is organised as one sequential pipeline. Every stage maps font file path(s) to
//! font file path(s) inside a per-job temporary directory:
//!
//! ```text
//! +-------------+     +-------------+     +-------------+     +-------------+
//! | Convert     |     | Unify       |     | Subset      |     | Merge       |
//! | CFF -> glyf | --> | units-per-em| --> | Arabic /    | --> | glyf, cmap, |
//! | (optional)  |     | (optional)  |     | Latin range |     | hmtx, post  |
//! +-------------+     +-------------+     +-------------+     +-------------+
//!                                                                    |
//!                        +-------------------------------------------+
//!                        v
//!              +-------------------+
//!              | Layout + Preview  |  light theme, dark theme
//!              +-------------------+
//! ```
//!
//! Optional stages degrade to pass-through when they fail; only the merge stage is fatal.
//!
//! Basic usage:
//! ```rust,no_run
//! use fontmerge::config::{load_config_from_source, ConfigSource};
//! use fontmerge::job::{run_job, JobRequest};
//!
//! let config = load_config_from_source(ConfigSource::Default).unwrap();
//! let request = JobRequest::new("arabic.ttf", "latin.ttf", "out");
//! let report = run_job(&request, &config);
//! println!("{}", report.summary);
//! ```
//!
//! Individual stages are usable on their own as well:
//! ```rust,no_run
//! use fontmerge::asset::FontAsset;
//! use fontmerge::unicode_range::UnicodeRange;
//!
//! # fn example() -> Result<(), fontmerge::MergeError> {
//! let font = FontAsset::load("latin.ttf")?;
//! let subset = fontmerge::subset::subset_font(&font, &UnicodeRange::latin())?;
//! subset.save("latin_sub.ttf")?;
//! # Ok(())
//! # }
//! ```

pub mod asset;
pub mod config;
pub mod convert;
pub mod external;
pub mod job;
pub mod joblog;
pub mod layout;
pub mod merge;
pub mod preview;
pub mod subset;
pub mod tables;
pub mod unicode_range;
pub mod unify;

#[cfg(test)]
mod test_fonts;

use std::error::Error;
use std::fmt;
use std::path::Path;

/// Errors raised by the font pipeline.
///
/// Every variant carries a human readable message and a suggestion that is shown
/// to the user together with the message.
#[derive(Debug)]
pub enum MergeError {
    /// A file could not be read or written
    Io {
        message: String,
        path: String,
        suggestion: String,
    },
    /// A font file could not be parsed
    Font {
        message: String,
        path: Option<String>,
        suggestion: String,
    },
    /// A font table is missing or malformed
    Table { tag: String, message: String },
    /// Outline conversion failed with every available strategy
    Conversion { message: String },
    /// Merging failed with every available strategy
    Merge { message: String },
    /// Preview rendering failed
    Render { message: String },
    /// The configuration file is invalid
    Config { message: String, suggestion: String },
    /// An external tool failed, timed out or could not be started
    Tool { tool: String, message: String },
}

impl Error for MergeError {}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MergeError::Io {
                message,
                path,
                suggestion,
            } => {
                write!(f, "❌ File Error: {}", message)?;
                write!(f, "\n📁 Path: {}", path)?;
                write!(f, "\n💡 Suggestion: {}", suggestion)?;
                Ok(())
            }
            MergeError::Font {
                message,
                path,
                suggestion,
            } => {
                write!(f, "❌ Font Error: {}", message)?;
                if let Some(p) = path {
                    write!(f, "\n📁 Path: {}", p)?;
                }
                write!(f, "\n💡 Suggestion: {}", suggestion)?;
                Ok(())
            }
            MergeError::Table { tag, message } => {
                write!(f, "❌ Table Error: '{}' {}", tag, message)
            }
            MergeError::Conversion { message } => {
                write!(f, "❌ Conversion Error: {}", message)
            }
            MergeError::Merge { message } => {
                write!(f, "❌ Merge Error: {}", message)?;
                write!(
                    f,
                    "\n💡 Suggestion: Install fontforge or check that both fonts use TrueType outlines"
                )?;
                Ok(())
            }
            MergeError::Render { message } => write!(f, "❌ Render Error: {}", message),
            MergeError::Config {
                message,
                suggestion,
            } => {
                write!(f, "❌ Configuration Error: {}", message)?;
                write!(f, "\n💡 Suggestion: {}", suggestion)?;
                Ok(())
            }
            MergeError::Tool { tool, message } => {
                write!(f, "❌ Tool Error: {} {}", tool, message)
            }
        }
    }
}

impl MergeError {
    /// Wraps an I/O failure on `path`
    pub fn io(err: std::io::Error, path: &Path) -> Self {
        MergeError::Io {
            message: err.to_string(),
            path: path.display().to_string(),
            suggestion: "Check that the path exists and you have read/write permissions"
                .to_string(),
        }
    }

    /// Creates a font parse error for the font at `path`
    pub fn font(message: impl Into<String>, path: Option<&Path>) -> Self {
        MergeError::Font {
            message: message.into(),
            path: path.map(|p| p.display().to_string()),
            suggestion: "Make sure the file is a valid TrueType or OpenType font".to_string(),
        }
    }

    /// Creates an error for a missing or malformed table
    pub fn table(tag: impl Into<String>, message: impl Into<String>) -> Self {
        MergeError::Table {
            tag: tag.into(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for MergeError {
    fn from(err: std::io::Error) -> Self {
        MergeError::Io {
            message: err.to_string(),
            path: String::new(),
            suggestion: "Check available disk space and permissions".to_string(),
        }
    }
}
