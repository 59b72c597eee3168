//! The merge job: runs every stage for one pair of fonts and reports the result.
//!
//! ```text
//! inputs --copy--> temp dir --convert--> --unify--> --subset--> --merge--> merged font
//!                                                                    \--> previews
//! ```
//!
//! Conversion, unification and subsetting degrade to passing their input through when
//! they fail. Reading the inputs and merging are fatal. Previews are cosmetic: a failed
//! preview is logged and the job still succeeds. Outputs are copied from the temporary
//! directory into `merged/`, `previews/` and `logs/` under the output directory.

use crate::asset::FontAsset;
use crate::config::MergeConfig;
use crate::convert::{convert_font, converters};
use crate::external::ExternalTool;
use crate::joblog::{unique_name, JobLog, StageOutcome, StageStatus};
use crate::merge::{merge_fonts, strategies};
use crate::preview::{render_previews, PreviewKind};
use crate::subset::subset_to_file;
use crate::unicode_range::UnicodeRange;
use crate::unify::{unify_units_per_em, Scaling};
use crate::MergeError;
use log::debug;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

/// The fonts to merge and where to put the results
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub arabic: PathBuf,
    pub latin: PathBuf,
    pub out_dir: PathBuf,
    /// Parent of the job's temporary directory; the system temp dir when unset
    pub work_root: Option<PathBuf>,
}

impl JobRequest {
    pub fn new(arabic: impl Into<PathBuf>, latin: impl Into<PathBuf>, out_dir: impl Into<PathBuf>) -> Self {
        JobRequest {
            arabic: arabic.into(),
            latin: latin.into(),
            out_dir: out_dir.into(),
            work_root: None,
        }
    }

    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = Some(root.into());
        self
    }
}

/// Outcome of a job
#[derive(Debug, Clone)]
pub struct JobReport {
    pub success: bool,
    /// Text shown to the user
    pub summary: String,
    pub font: Option<PathBuf>,
    pub previews: Vec<PathBuf>,
    pub log: Option<PathBuf>,
    pub stages: Vec<StageOutcome>,
}

impl JobReport {
    fn failure(message: String, log: Option<PathBuf>, stages: Vec<StageOutcome>) -> Self {
        JobReport {
            success: false,
            summary: format!("✗ Failed\n\n{}", message),
            font: None,
            previews: Vec::new(),
            log,
            stages,
        }
    }
}

struct JobOutputs {
    font: PathBuf,
    previews: Vec<PathBuf>,
}

/// Runs the whole pipeline. Never panics and never returns an error: failures are
/// described by the returned report.
pub fn run_job(request: &JobRequest, config: &MergeConfig) -> JobReport {
    let mut log = match JobLog::create(&request.out_dir.join("logs")) {
        Ok(log) => log,
        Err(e) => return JobReport::failure(e.to_string(), None, Vec::new()),
    };
    log.info(format!(
        "Merging {} with {}",
        request.arabic.display(),
        request.latin.display()
    ));

    let result = panic::catch_unwind(AssertUnwindSafe(|| run_stages(request, config, &mut log)));
    let result = match result {
        Ok(result) => result,
        Err(_) => Err(MergeError::Merge {
            message: "the pipeline stopped unexpectedly".to_string(),
        }),
    };

    match result {
        Ok(outputs) => {
            log.info("Font merge finished");
            let stages = log.outcomes().to_vec();
            let log_path = log.finish();
            let preview = |i: usize| {
                outputs
                    .previews
                    .get(i)
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "not created".to_string())
            };
            JobReport {
                success: true,
                summary: format!(
                    "✓ Successful!\n\nFont: {}\nPreview 1: {}\nPreview 2: {}",
                    outputs.font.display(),
                    preview(0),
                    preview(1)
                ),
                font: Some(outputs.font),
                previews: outputs.previews,
                log: Some(log_path),
                stages,
            }
        }
        Err(e) => {
            log.error_chain(&e);
            let stages = log.outcomes().to_vec();
            let log_path = log.finish();
            JobReport::failure(e.to_string(), Some(log_path), stages)
        }
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "font".to_string())
}

/// Copies `input` into its own directory under `work` and loads it
fn stage_input(input: &Path, work: &Path, label: &str) -> Result<FontAsset, MergeError> {
    let dir = work.join(label);
    fs::create_dir_all(&dir).map_err(|e| MergeError::io(e, &dir))?;
    let name = input
        .file_name()
        .ok_or_else(|| MergeError::font("input has no file name", Some(input)))?;
    let copy = dir.join(name);
    fs::copy(input, &copy).map_err(|e| MergeError::io(e, input))?;
    FontAsset::load(&copy)
}

fn run_stages(request: &JobRequest, config: &MergeConfig, log: &mut JobLog) -> Result<JobOutputs, MergeError> {
    let root = request.work_root.clone().unwrap_or_else(std::env::temp_dir);
    fs::create_dir_all(&root).map_err(|e| MergeError::io(e, &root))?;
    let work = tempfile::Builder::new()
        .prefix("fontmerge")
        .tempdir_in(&root)
        .map_err(|e| MergeError::io(e, &root))?;
    debug!("Working in {:?}", work.path());

    let inputs = [
        ("arabic", request.arabic.as_path(), UnicodeRange::arabic()),
        ("latin", request.latin.as_path(), UnicodeRange::latin()),
    ];
    let mut fonts = Vec::with_capacity(inputs.len());
    for (label, input, _) in &inputs {
        fonts.push(stage_input(input, work.path(), label)?);
    }

    let tool = ExternalTool::probe(&config.tools);
    match &tool {
        Some(tool) => log.info(format!("Using {}", tool.program().display())),
        None => log.info("fontforge not available, using built-in strategies"),
    }

    let available = converters(tool.as_ref());
    for ((label, _, _), font) in inputs.iter().zip(fonts.iter_mut()) {
        let dir = work.path().join(label);
        match convert_font(font.clone(), &dir, &available) {
            Ok(converted) => {
                if converted.path() != font.path() {
                    log.record("convert", StageStatus::Ok, format!("converted {} font to TrueType", label));
                }
                *font = converted;
            }
            Err(e) => log.record("convert", StageStatus::Degraded, e.to_string()),
        }
    }

    let mut unified = fonts.clone();
    match unify_units_per_em(&mut unified) {
        Ok(scalings) => {
            for (scaling, font) in scalings.iter().zip(&unified) {
                match scaling {
                    Scaling::Unchanged => {}
                    Scaling::Full => log.record("unify", StageStatus::Ok, format!("rescaled {}", font.path().display())),
                    Scaling::MetricsOnly => log.record(
                        "unify",
                        StageStatus::Degraded,
                        format!("rescaled metrics only for {}", font.path().display()),
                    ),
                }
            }
            fonts = unified;
        }
        Err(e) => log.record("unify", StageStatus::Degraded, e.to_string()),
    }

    for ((label, _, range), font) in inputs.iter().zip(fonts.iter_mut()) {
        let dir = work.path().join(label);
        match subset_to_file(font, range, &dir) {
            Ok(subset) => {
                log.record("subset", StageStatus::Ok, format!("subset {} font to {}", label, range));
                *font = subset;
            }
            Err(e) => log.record("subset", StageStatus::Degraded, format!("{} font: {}", label, e)),
        }
    }

    let merged_name = format!("{}_{}.ttf", file_stem(&request.arabic), file_stem(&request.latin));
    let merged_path = work.path().join(&merged_name);
    let merged = match merge_fonts(&fonts[0], &fonts[1], &merged_path, &strategies(tool.as_ref())) {
        Ok(merged) => {
            log.record("merge", StageStatus::Ok, format!("merged into {}", merged_name));
            merged
        }
        Err(e) => {
            log.record("merge", StageStatus::Failed, e.to_string());
            return Err(e);
        }
    };

    let preview_dir = work.path().join("previews");
    fs::create_dir_all(&preview_dir).map_err(|e| MergeError::io(e, &preview_dir))?;
    let mut rendered = Vec::new();
    for (path, result) in render_previews(merged.path(), &preview_dir, config) {
        match result {
            Ok(PreviewKind::Full) => {
                log.record("preview", StageStatus::Ok, format!("created {}", path.display()));
                rendered.push(path);
            }
            Ok(PreviewKind::Fallback) => {
                log.record("preview", StageStatus::Degraded, format!("created simple {}", path.display()));
                rendered.push(path);
            }
            Err(e) => log.record("preview", StageStatus::Failed, e.to_string()),
        }
    }

    let font = publish(merged.path(), &request.out_dir.join("merged"))?;
    log.info(format!("Saved font to {}", font.display()));
    let mut previews = Vec::with_capacity(rendered.len());
    for path in &rendered {
        match publish(path, &request.out_dir.join("previews")) {
            Ok(published) => previews.push(published),
            Err(e) => log.warn(format!("Could not save preview: {}", e)),
        }
    }
    Ok(JobOutputs { font, previews })
}

/// Copies `file` into `dir` under a name that does not exist yet
fn publish(file: &Path, dir: &Path) -> Result<PathBuf, MergeError> {
    fs::create_dir_all(dir).map_err(|e| MergeError::io(e, dir))?;
    let ext = file
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let target = unique_name(dir, &file_stem(file), &ext);
    fs::copy(file, &target).map_err(|e| MergeError::io(e, &target))?;
    Ok(target)
}
