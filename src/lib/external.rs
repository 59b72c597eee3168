//! Running the external font editor.
//!
//! `fontforge` is located once per job, either from the configured path or by searching
//! `PATH`. Scripts are constant strings that read their file paths from the script
//! arguments (`$1`, `$2`, ... in the native dialect, `sys.argv` in Python), so no path is
//! ever interpolated into script text.

use crate::config::ToolConfig;
use crate::MergeError;
use log::{debug, warn};
use std::env;
use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const TOOL_NAME: &str = "fontforge";
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Converts `$1` to the TrueType file `$2`
pub const CONVERT_SCRIPT_FF: &str = "Open($1); SelectWorthOutputting(); Generate($2); Close();";
pub const CONVERT_SCRIPT_PY: &str =
    "import fontforge, sys\nfont = fontforge.open(sys.argv[1])\nfont.generate(sys.argv[2])\nfont.close()";
/// Merges `$2` into `$1` and writes the result to `$3`
pub const MERGE_SCRIPT_FF: &str = "Open($1); MergeFonts($2); Generate($3); Close();";

/// Script language understood by the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Native,
    Python,
}

impl Dialect {
    fn flag(self) -> &'static str {
        match self {
            Dialect::Native => "-lang=ff",
            Dialect::Python => "-lang=py",
        }
    }
}

/// A located editor binary plus the time budget for each invocation
#[derive(Debug, Clone)]
pub struct ExternalTool {
    program: PathBuf,
    timeout: Duration,
}

impl ExternalTool {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        ExternalTool {
            program: program.into(),
            timeout,
        }
    }

    /// Locates the editor according to `config`; `None` when it is disabled or absent
    pub fn probe(config: &ToolConfig) -> Option<Self> {
        if config.disable_external {
            debug!("External tool disabled by configuration");
            return None;
        }
        let program = match &config.fontforge {
            Some(path) if path.is_file() => Some(path.clone()),
            Some(path) => {
                warn!("Configured {} not found at {:?}", TOOL_NAME, path);
                None
            }
            None => find_in_path(TOOL_NAME),
        }?;
        debug!("Using {} at {:?}", TOOL_NAME, program);
        Some(ExternalTool::new(program, config.timeout))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Runs `script` with `args` as its script arguments
    pub fn run_script(&self, dialect: Dialect, script: &str, args: &[&Path]) -> Result<(), MergeError> {
        let mut argv: Vec<&OsStr> = vec![
            OsStr::new("-quiet"),
            OsStr::new(dialect.flag()),
            OsStr::new("-c"),
            OsStr::new(script),
        ];
        argv.extend(args.iter().map(|p| p.as_os_str()));
        self.run(&argv)
    }

    /// Runs the editor with `args`, killing it when the timeout expires
    pub fn run(&self, args: &[&OsStr]) -> Result<(), MergeError> {
        let tool_error = |message: String| MergeError::Tool {
            tool: TOOL_NAME.to_string(),
            message,
        };
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| tool_error(format!("failed to start {:?}: {}", self.program, e)))?;

        let stderr_reader = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text);
                text
            })
        });

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if started.elapsed() >= self.timeout => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(tool_error(format!(
                        "timed out after {} seconds",
                        self.timeout.as_secs()
                    )));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => return Err(tool_error(format!("failed to wait for process: {}", e))),
            }
        };

        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        if status.success() {
            Ok(())
        } else {
            let detail = stderr.lines().last().unwrap_or("").trim();
            Err(tool_error(format!("exited with {}: {}", status, detail)))
        }
    }
}

/// Searches `PATH` for an executable named `name`
pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file() || path.with_extension("exe").is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripts_take_paths_from_arguments() {
        for script in [CONVERT_SCRIPT_FF, MERGE_SCRIPT_FF] {
            assert!(script.contains("$1"));
            assert!(!script.contains('"'));
        }
        assert!(CONVERT_SCRIPT_PY.contains("sys.argv[2]"));
    }

    #[test]
    fn test_disabled_tool_is_not_probed() {
        let config = ToolConfig {
            fontforge: Some(PathBuf::from("/bin/sh")),
            timeout: Duration::from_secs(1),
            disable_external: true,
        };
        assert!(ExternalTool::probe(&config).is_none());
    }

    #[test]
    fn test_missing_configured_path() {
        let config = ToolConfig {
            fontforge: Some(PathBuf::from("/definitely/not/here/fontforge")),
            ..ToolConfig::default()
        };
        assert!(ExternalTool::probe(&config).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_status_and_timeout() {
        let sh = ExternalTool::new("/bin/sh", Duration::from_millis(300));
        assert!(sh.run(&[OsStr::new("-c"), OsStr::new("exit 0")]).is_ok());
        let err = sh
            .run(&[OsStr::new("-c"), OsStr::new("echo broken >&2; exit 3")])
            .unwrap_err();
        assert!(err.to_string().contains("broken"));
        let err = sh.run(&[OsStr::new("-c"), OsStr::new("sleep 5")]).unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[cfg(unix)]
    #[test]
    fn test_find_in_path_locates_shell() {
        assert!(find_in_path("sh").is_some());
        assert!(find_in_path("no-such-program-fontmerge").is_none());
    }
}
