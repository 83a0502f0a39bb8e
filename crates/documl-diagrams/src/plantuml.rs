//! Batched `PlantUML` renderer invocation.
//!
//! Each [`RenderTask`] covers one `(format, key)` registry entry: the
//! accumulated source is written to a combined source file inside the
//! entry's output directory and the renderer is invoked once for the whole
//! batch. Tasks run in parallel on the rayon global thread pool and carry
//! no ordering dependency on each other.
//!
//! For the EPS format an optional post-pass converts every rendered
//! `<name>.eps` to `<name>.pdf` via `epstopdf`, strictly after that key's
//! renderer invocation.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use documl_config::Config;
use rayon::prelude::*;

use crate::consts::COMBINED_SOURCE_PREFIX;
use crate::format::OutputFormat;

/// Separator for the renderer's include-path list.
const PATH_LIST_SEPARATOR: &str = if cfg!(windows) { ";" } else { ":" };

/// One renderer invocation covering all non-skipped fragments of a key.
#[derive(Debug)]
pub struct RenderTask {
    /// Output format of this batch.
    pub format: OutputFormat,
    /// Logical output key the fragments were grouped under.
    pub key: String,
    /// Concatenated source of every non-skipped fragment, in submission order.
    pub source: String,
    /// Directory the rendered images are written into.
    pub out_dir: PathBuf,
    /// Image basenames requested under this key (drives the EPS post-pass).
    pub output_names: Vec<String>,
}

/// A successfully dispatched batch.
#[derive(Debug)]
pub struct RenderedBatch {
    /// Output format of the batch.
    pub format: OutputFormat,
    /// Output key of the batch.
    pub key: String,
}

/// Failure of a single batch.
///
/// Batches are independent; an error never aborts the remaining batches.
#[derive(Debug, thiserror::Error)]
#[error("{} batch '{key}': {kind}", .format.type_flag())]
pub struct RenderError {
    /// Output format of the failed batch.
    pub format: OutputFormat,
    /// Output key of the failed batch.
    pub key: String,
    /// What went wrong.
    pub kind: RenderErrorKind,
}

/// Kind of batch rendering error.
#[derive(Debug, thiserror::Error)]
pub enum RenderErrorKind {
    /// Combined source file could not be written.
    #[error("I/O error: {0}")]
    Io(String),
    /// Renderer process could not be launched.
    #[error("failed to launch renderer: {0}")]
    Spawn(String),
    /// Renderer exited with a non-zero status.
    #[error("renderer exited with code {0}")]
    Renderer(i32),
}

/// Result of dispatching batches with partial failures.
#[derive(Debug, Default)]
pub struct PartialRenderResult {
    /// Successfully rendered batches.
    pub rendered: Vec<RenderedBatch>,
    /// Errors for batches that failed.
    pub errors: Vec<RenderError>,
}

/// Render all batches in parallel on the rayon global thread pool.
///
/// Returns partial results: successfully rendered batches even when some
/// fail. The collect is the join barrier; every task has completed when
/// this function returns.
#[must_use]
pub fn render_all(tasks: &[RenderTask], config: &Config) -> PartialRenderResult {
    if tasks.is_empty() {
        return PartialRenderResult::default();
    }

    let results: Vec<Result<RenderedBatch, RenderError>> = tasks
        .par_iter()
        .map(|task| render_one(task, config))
        .collect();

    partition_results(results)
}

/// Partition results into successes and failures.
fn partition_results(
    results: Vec<Result<RenderedBatch, RenderError>>,
) -> PartialRenderResult {
    let mut rendered = Vec::with_capacity(results.len());
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(batch) => rendered.push(batch),
            Err(error) => errors.push(error),
        }
    }

    PartialRenderResult { rendered, errors }
}

/// Path of the combined source file for a `(format, key)` batch.
///
/// The name is derived from format and key so concurrent batches sharing an
/// output directory never collide.
#[must_use]
pub fn combined_source_path(out_dir: &Path, format: OutputFormat, key: &str) -> PathBuf {
    out_dir.join(format!(
        "{COMBINED_SOURCE_PREFIX}{}_{key}.puml",
        format.type_flag()
    ))
}

/// Build the renderer argument list for one batch.
///
/// Mirrors the canonical invocation:
/// `java [-Dplantuml.include.path=<paths>] -Djava.awt.headless=true
/// -jar <jar> [-config <file>] [-graphvizdot <dot>] -o <outDir>
/// -charset UTF-8 -t<type> <sourceFile>`
fn renderer_args(
    config: &Config,
    format: OutputFormat,
    out_dir: &Path,
    source_file: &Path,
) -> Vec<OsString> {
    let renderer = &config.renderer;
    let mut args = Vec::new();

    if !renderer.include_dirs.is_empty() {
        let mut arg = OsString::from("-Dplantuml.include.path=");
        for (i, dir) in renderer.include_dirs.iter().enumerate() {
            if i > 0 {
                arg.push(PATH_LIST_SEPARATOR);
            }
            arg.push(dir.as_os_str());
        }
        args.push(arg);
    }

    args.push(OsString::from("-Djava.awt.headless=true"));
    args.push(OsString::from("-jar"));
    args.push(renderer.jar.clone().into_os_string());

    if let Some(config_file) = &renderer.config_file {
        args.push(OsString::from("-config"));
        args.push(config_file.clone().into_os_string());
    }
    if let Some(dot) = &renderer.graphviz_dot {
        args.push(OsString::from("-graphvizdot"));
        args.push(dot.clone().into_os_string());
    }

    args.push(OsString::from("-o"));
    args.push(out_dir.as_os_str().to_owned());
    args.push(OsString::from("-charset"));
    args.push(OsString::from("UTF-8"));
    args.push(OsString::from(format!("-t{}", format.type_flag())));
    args.push(source_file.as_os_str().to_owned());

    args
}

/// Dispatch one batch: write the combined source file, invoke the renderer
/// once, and run the EPS post-pass when applicable.
fn render_one(task: &RenderTask, config: &Config) -> Result<RenderedBatch, RenderError> {
    let type_flag = task.format.type_flag();
    let source_file = combined_source_path(&task.out_dir, task.format, &task.key);

    tracing::info!(
        "generating PlantUML {type_flag} files for '{}' in {}",
        task.key,
        task.out_dir.display()
    );

    fs::write(&source_file, &task.source).map_err(|e| RenderError {
        format: task.format,
        key: task.key.clone(),
        kind: RenderErrorKind::Io(format!(
            "could not write {}: {e}",
            source_file.display()
        )),
    })?;

    let args = renderer_args(config, task.format, &task.out_dir, &source_file);
    let output = Command::new(&config.renderer.java)
        .args(&args)
        .output()
        .map_err(|e| RenderError {
            format: task.format,
            key: task.key.clone(),
            kind: RenderErrorKind::Spawn(e.to_string()),
        })?;

    if !output.status.success() {
        let code = output.status.code().unwrap_or(-1);
        tracing::error!(
            "PlantUML failed for '{}' (exit code {code}); verify that `{} -jar {} -h` \
             works from the command line",
            task.key,
            config.renderer.java.display(),
            config.renderer.jar.display()
        );
        return Err(RenderError {
            format: task.format,
            key: task.key.clone(),
            kind: RenderErrorKind::Renderer(code),
        });
    }

    if config.output.cleanup
        && let Err(e) = fs::remove_file(&source_file)
    {
        tracing::warn!("failed to remove {}: {e}", source_file.display());
    }

    if task.format == OutputFormat::Eps && config.conversion.eps_to_pdf {
        convert_eps_batch(task, config);
    }

    Ok(RenderedBatch {
        format: task.format,
        key: task.key.clone(),
    })
}

/// Convert every `<name>.eps` of a batch to `<name>.pdf`.
///
/// Runs after the batch's renderer invocation succeeded. A failing
/// conversion is reported and does not block the remaining basenames.
fn convert_eps_batch(task: &RenderTask, config: &Config) {
    for name in &task.output_names {
        let input = task.out_dir.join(format!("{name}.eps"));
        let outfile = format!(
            "--outfile={}",
            task.out_dir.join(format!("{name}.pdf")).display()
        );

        match Command::new(&config.conversion.epstopdf)
            .arg(&input)
            .arg(&outfile)
            .output()
        {
            Ok(output) if output.status.success() => {}
            Ok(output) => {
                tracing::error!(
                    "epstopdf failed for {} (exit code {}); check your TeX installation",
                    input.display(),
                    output.status.code().unwrap_or(-1)
                );
            }
            Err(e) => {
                tracing::error!("failed to launch epstopdf for {}: {e}", input.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn config_with_jar(out_dir: &Path) -> Config {
        let mut config = Config::default();
        config.output.dir = out_dir.to_path_buf();
        config.renderer.jar = PathBuf::from("/opt/plantuml/plantuml.jar");
        config
    }

    fn task(format: OutputFormat, key: &str, source: &str, out_dir: &Path) -> RenderTask {
        RenderTask {
            format,
            key: key.to_owned(),
            source: source.to_owned(),
            out_dir: out_dir.to_path_buf(),
            output_names: Vec::new(),
        }
    }

    /// Write an executable shell script that appends its arguments to `log`.
    #[cfg(unix)]
    fn fake_tool(dir: &Path, name: &str, log: &Path, exit_code: i32) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        let script = format!(
            "#!/bin/sh\nprintf '%s\\n' \"$*\" >> \"{}\"\nexit {exit_code}\n",
            log.display()
        );
        fs::write(&path, script).unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
        path
    }

    #[cfg(unix)]
    fn read_log(log: &Path) -> Vec<String> {
        fs::read_to_string(log)
            .unwrap_or_default()
            .lines()
            .map(ToOwned::to_owned)
            .collect()
    }

    #[test]
    fn test_combined_source_path_is_deterministic() {
        let path = combined_source_path(Path::new("out"), OutputFormat::Bitmap, "page1");
        assert_eq!(path, Path::new("out/combined_png_page1.puml"));

        // Same key under a different format never collides
        let svg = combined_source_path(Path::new("out"), OutputFormat::Vector, "page1");
        assert_eq!(svg, Path::new("out/combined_svg_page1.puml"));
        assert_ne!(path, svg);
    }

    #[test]
    fn test_renderer_args_basic() {
        let config = config_with_jar(Path::new("out"));
        let args = renderer_args(
            &config,
            OutputFormat::Bitmap,
            Path::new("out"),
            Path::new("out/combined_png_page1.puml"),
        );

        let expected: Vec<OsString> = [
            "-Djava.awt.headless=true",
            "-jar",
            "/opt/plantuml/plantuml.jar",
            "-o",
            "out",
            "-charset",
            "UTF-8",
            "-tpng",
            "out/combined_png_page1.puml",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        assert_eq!(args, expected);
    }

    #[test]
    fn test_renderer_args_optional_flags() {
        let mut config = config_with_jar(Path::new("out"));
        config.renderer.config_file = Some(PathBuf::from("uml.cfg"));
        config.renderer.graphviz_dot = Some(PathBuf::from("/usr/bin/dot"));

        let args = renderer_args(
            &config,
            OutputFormat::Eps,
            Path::new("out"),
            Path::new("out/combined_eps_page1.puml"),
        );

        assert!(args.contains(&OsString::from("-config")));
        assert!(args.contains(&OsString::from("uml.cfg")));
        assert!(args.contains(&OsString::from("-graphvizdot")));
        assert!(args.contains(&OsString::from("/usr/bin/dot")));
        assert!(args.contains(&OsString::from("-teps")));
    }

    #[cfg(unix)]
    #[test]
    fn test_renderer_args_include_path_list() {
        let mut config = config_with_jar(Path::new("out"));
        config.renderer.include_dirs =
            vec![PathBuf::from("docs/uml"), PathBuf::from("docs/shared")];

        let args = renderer_args(
            &config,
            OutputFormat::Vector,
            Path::new("out"),
            Path::new("out/f.puml"),
        );

        assert_eq!(
            args[0],
            OsString::from("-Dplantuml.include.path=docs/uml:docs/shared")
        );
    }

    #[test]
    fn test_render_all_empty_is_noop() {
        let config = config_with_jar(Path::new("out"));
        let result = render_all(&[], &config);

        assert!(result.rendered.is_empty());
        assert!(result.errors.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_one_invocation_per_key() {
        let tmp = TempDir::new().unwrap();
        let log = tmp.path().join("renderer.log");
        let mut config = config_with_jar(tmp.path());
        config.renderer.java = fake_tool(tmp.path(), "fake-java", &log, 0);

        let tasks = vec![
            task(OutputFormat::Bitmap, "page1", "A -> B\nC -> D\n", tmp.path()),
            task(OutputFormat::Bitmap, "page2", "E -> F\n", tmp.path()),
        ];
        let result = render_all(&tasks, &config);

        assert_eq!(result.rendered.len(), 2);
        assert!(result.errors.is_empty());
        // One renderer invocation per key, not per fragment
        assert_eq!(read_log(&log).len(), 2);

        // Combined files hold the concatenated source and survive without cleanup
        let combined = combined_source_path(tmp.path(), OutputFormat::Bitmap, "page1");
        assert_eq!(fs::read_to_string(combined).unwrap(), "A -> B\nC -> D\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_cleanup_removes_combined_file() {
        let tmp = TempDir::new().unwrap();
        let log = tmp.path().join("renderer.log");
        let mut config = config_with_jar(tmp.path());
        config.renderer.java = fake_tool(tmp.path(), "fake-java", &log, 0);
        config.output.cleanup = true;

        let tasks = vec![task(OutputFormat::Vector, "page1", "A -> B\n", tmp.path())];
        let result = render_all(&tasks, &config);

        assert_eq!(result.rendered.len(), 1);
        let combined = combined_source_path(tmp.path(), OutputFormat::Vector, "page1");
        assert!(!combined.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_batch_does_not_block_others() {
        let tmp = TempDir::new().unwrap();
        let ok_dir = tmp.path().join("ok");
        fs::create_dir(&ok_dir).unwrap();
        let log = tmp.path().join("renderer.log");
        let mut config = config_with_jar(tmp.path());
        config.renderer.java = fake_tool(tmp.path(), "fake-java", &log, 0);

        let tasks = vec![
            // Output directory does not exist, so the combined file write fails
            task(
                OutputFormat::Bitmap,
                "broken",
                "A -> B\n",
                &tmp.path().join("missing"),
            ),
            task(OutputFormat::Bitmap, "fine", "C -> D\n", &ok_dir),
        ];
        let result = render_all(&tasks, &config);

        assert_eq!(result.rendered.len(), 1);
        assert_eq!(result.rendered[0].key, "fine");
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].key, "broken");
        assert!(matches!(result.errors[0].kind, RenderErrorKind::Io(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_reported_with_code() {
        let tmp = TempDir::new().unwrap();
        let log = tmp.path().join("renderer.log");
        let mut config = config_with_jar(tmp.path());
        config.renderer.java = fake_tool(tmp.path(), "fake-java", &log, 3);

        let tasks = vec![task(OutputFormat::Bitmap, "page1", "A -> B\n", tmp.path())];
        let result = render_all(&tasks, &config);

        assert!(result.rendered.is_empty());
        assert_eq!(result.errors.len(), 1);
        assert!(matches!(
            result.errors[0].kind,
            RenderErrorKind::Renderer(3)
        ));
    }

    #[test]
    fn test_missing_renderer_is_spawn_error() {
        let tmp = TempDir::new().unwrap();
        let mut config = config_with_jar(tmp.path());
        config.renderer.java = PathBuf::from("/nonexistent/fake-java");

        let tasks = vec![task(OutputFormat::Bitmap, "page1", "A -> B\n", tmp.path())];
        let result = render_all(&tasks, &config);

        assert_eq!(result.errors.len(), 1);
        assert!(matches!(result.errors[0].kind, RenderErrorKind::Spawn(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_eps_post_pass_one_conversion_per_basename() {
        let tmp = TempDir::new().unwrap();
        let renderer_log = tmp.path().join("renderer.log");
        let convert_log = tmp.path().join("convert.log");
        let mut config = config_with_jar(tmp.path());
        config.renderer.java = fake_tool(tmp.path(), "fake-java", &renderer_log, 0);
        config.conversion.eps_to_pdf = true;
        config.conversion.epstopdf = fake_tool(tmp.path(), "fake-epstopdf", &convert_log, 0);

        let mut eps_task = task(OutputFormat::Eps, "page1", "A -> B\n", tmp.path());
        eps_task.output_names = vec!["imgA".to_owned(), "imgB".to_owned()];
        let result = render_all(&[eps_task], &config);

        assert_eq!(result.rendered.len(), 1);
        let lines = read_log(&convert_log);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("imgA.eps"));
        assert!(lines[0].contains("--outfile="));
        assert!(lines[0].contains("imgA.pdf"));
        assert!(lines[1].contains("imgB.eps"));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_conversion_does_not_block_remaining_basenames() {
        let tmp = TempDir::new().unwrap();
        let renderer_log = tmp.path().join("renderer.log");
        let convert_log = tmp.path().join("convert.log");
        let mut config = config_with_jar(tmp.path());
        config.renderer.java = fake_tool(tmp.path(), "fake-java", &renderer_log, 0);
        config.conversion.eps_to_pdf = true;
        config.conversion.epstopdf = fake_tool(tmp.path(), "fake-epstopdf", &convert_log, 2);

        let mut eps_task = task(OutputFormat::Eps, "page1", "A -> B\n", tmp.path());
        eps_task.output_names = vec!["imgA".to_owned(), "imgB".to_owned()];
        let result = render_all(&[eps_task], &config);

        // The batch itself still counts as rendered; both conversions ran
        assert_eq!(result.rendered.len(), 1);
        assert_eq!(read_log(&convert_log).len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_post_pass_disabled_skips_conversion() {
        let tmp = TempDir::new().unwrap();
        let renderer_log = tmp.path().join("renderer.log");
        let convert_log = tmp.path().join("convert.log");
        let mut config = config_with_jar(tmp.path());
        config.renderer.java = fake_tool(tmp.path(), "fake-java", &renderer_log, 0);
        config.conversion.eps_to_pdf = false;
        config.conversion.epstopdf = fake_tool(tmp.path(), "fake-epstopdf", &convert_log, 0);

        let mut eps_task = task(OutputFormat::Eps, "page1", "A -> B\n", tmp.path());
        eps_task.output_names = vec!["imgA".to_owned()];
        render_all(&[eps_task], &config);

        assert!(read_log(&convert_log).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_post_pass_only_runs_for_eps() {
        let tmp = TempDir::new().unwrap();
        let renderer_log = tmp.path().join("renderer.log");
        let convert_log = tmp.path().join("convert.log");
        let mut config = config_with_jar(tmp.path());
        config.renderer.java = fake_tool(tmp.path(), "fake-java", &renderer_log, 0);
        config.conversion.eps_to_pdf = true;
        config.conversion.epstopdf = fake_tool(tmp.path(), "fake-epstopdf", &convert_log, 0);

        let mut png_task = task(OutputFormat::Bitmap, "page1", "A -> B\n", tmp.path());
        png_task.output_names = vec!["imgA".to_owned()];
        render_all(&[png_task], &config);

        assert!(read_log(&convert_log).is_empty());
    }
}
