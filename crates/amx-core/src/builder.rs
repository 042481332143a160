//! External build tool orchestration.
//!
//! Runs the formula's build tool (for the published formulas, Gradle driving
//! a Kotlin/Native build) inside the extracted source tree and locates the
//! produced executable.
//!
//! ## Invocation
//!
//! ```text
//! <tool> <task for target> <args...>      # gradle macosArm64Binaries --no-daemon
//! ```
//!
//! ## Environment contract
//!
//! The host environment is inherited (the tool needs `HOME` for its caches),
//! then overridden with:
//!
//! | Variable | Value |
//! |---|---|
//! | `PATH` | The configured search path, when one is set |
//! | `<home_env>` | Home of each resolved dependency that declares one (`JAVA_HOME`) |
//! | formula `env` | Declared per formula |
//! | [`BuildEnv::vars`] | Caller overrides, applied last |
//!
//! ## Target selection
//!
//! The task and artifact path are expanded for [`Platform::target`]. When the
//! platform has a [`Platform::legacy_target`], its artifact path is searched
//! too, and if the primary task fails or produces nothing the legacy task
//! (`gradle macosBinaries`) is run before giving up.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::InstallError;
use crate::deps::{BuildEnv, ResolvedDependency};
use crate::formula::BuildSource;
use crate::types::Platform;

/// Runs a [`BuildSource`] recipe in an extracted source tree.
#[derive(Debug)]
pub struct Builder<'a> {
    source_dir: &'a Path,
    env: &'a BuildEnv,
}

/// The located build output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltArtifact {
    /// Absolute path of the produced executable.
    pub path: PathBuf,
    /// Target name whose artifact path matched.
    pub target: String,
}

impl<'a> Builder<'a> {
    /// Create a new builder for the given source tree.
    pub fn new(source_dir: &'a Path, env: &'a BuildEnv) -> Self {
        Self { source_dir, env }
    }

    /// Invoke the build tool for `platform` and locate its artifact.
    ///
    /// When `verbose` is false, tool output goes to `log_path`; on failure the
    /// tail of that log is logged at error level.
    ///
    /// The primary task runs first. If it fails, or leaves no artifact, and the
    /// platform has a legacy target, the legacy task runs as well. When every
    /// attempt fails the primary attempt's error is returned.
    ///
    /// # Errors
    ///
    /// - [`InstallError::MissingDependency`] if the tool itself cannot be found.
    /// - [`InstallError::BuildToolFailure`] if the tool exits non-zero.
    /// - [`InstallError::BuildArtifactNotFound`] if no candidate path holds a file.
    pub fn build(
        &self,
        spec: &BuildSource,
        platform: Platform,
        deps: &[ResolvedDependency],
        log_path: &Path,
        verbose: bool,
    ) -> Result<BuiltArtifact, InstallError> {
        let tool = self.locate_tool(&spec.tool, deps)?;
        let mut first_error = None;

        for (attempt, target) in platform.candidate_targets().into_iter().enumerate() {
            let task = spec.task_for(&target);
            if attempt > 0 {
                tracing::warn!(
                    primary = %platform.target(),
                    fallback = %target,
                    "primary build failed, retrying with legacy target"
                );
            }

            let outcome = self
                .run_task(&tool, &task, spec, deps, log_path, verbose, attempt > 0)
                .and_then(|()| self.locate_artifact(spec, platform));

            match outcome {
                Ok(artifact) => return Ok(artifact),
                Err(
                    e @ (InstallError::BuildToolFailure { .. }
                    | InstallError::BuildArtifactNotFound { .. }),
                ) => {
                    tracing::debug!(%task, error = %e, "build attempt failed");
                    first_error.get_or_insert(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(first_error.unwrap_or(InstallError::BuildArtifactNotFound {
            searched: Vec::new(),
        }))
    }

    /// Run `<tool> <task> <args...>` once, appending to the log on retries.
    #[allow(clippy::too_many_arguments)]
    fn run_task(
        &self,
        tool: &Path,
        task: &str,
        spec: &BuildSource,
        deps: &[ResolvedDependency],
        log_path: &Path,
        verbose: bool,
        append: bool,
    ) -> Result<(), InstallError> {
        tracing::info!(
            tool = %tool.display(),
            %task,
            args = ?spec.args,
            dir = %self.source_dir.display(),
            "running build tool"
        );

        let mut cmd = Command::new(tool);
        cmd.arg(task).args(&spec.args).current_dir(self.source_dir);

        if let Some(path) = &self.env.search_path {
            cmd.env("PATH", path);
        }
        for dep in deps {
            if let (Some(var), Some(home)) = (&dep.home_env, &dep.home) {
                cmd.env(var, home);
            }
        }
        cmd.envs(&spec.env);
        cmd.envs(&self.env.vars);

        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let spawned = if verbose {
            cmd.status()
        } else {
            let log_file = std::fs::File::options()
                .create(true)
                .write(true)
                .append(append)
                .truncate(!append)
                .open(log_path)?;
            cmd.stdout(Stdio::from(log_file.try_clone()?))
                .stderr(Stdio::from(log_file))
                .status()
        };
        let status =
            spawned.map_err(|e| InstallError::context("Failed to execute build tool", e))?;

        if !status.success() {
            if !verbose {
                if let Ok(tail) = read_last_lines(log_path, 20) {
                    tracing::error!(log = %log_path.display(), "build failed, last 20 lines:\n{tail}");
                }
            }
            return Err(InstallError::BuildToolFailure {
                tool: spec.tool.clone(),
                code: status.code(),
                log: log_path.to_path_buf(),
            });
        }
        Ok(())
    }

    /// Find the produced executable, trying the legacy target after the primary one.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::BuildArtifactNotFound`] listing every path searched.
    pub fn locate_artifact(
        &self,
        spec: &BuildSource,
        platform: Platform,
    ) -> Result<BuiltArtifact, InstallError> {
        let mut searched = Vec::new();

        for target in platform.candidate_targets() {
            let path = self.source_dir.join(spec.artifact_for(&target));
            if path.is_file() {
                if target != platform.target() {
                    tracing::warn!(
                        primary = %platform.target(),
                        fallback = %target,
                        "primary build artifact absent, using legacy target"
                    );
                }
                return Ok(BuiltArtifact { path, target });
            }
            searched.push(path);
        }

        Err(InstallError::BuildArtifactNotFound { searched })
    }

    /// The tool is usually itself a declared dependency; otherwise search for it.
    fn locate_tool(
        &self,
        tool: &str,
        deps: &[ResolvedDependency],
    ) -> Result<PathBuf, InstallError> {
        let from_deps = deps.iter().find(|d| {
            d.name == tool || d.executable.file_name().is_some_and(|f| f == tool)
        });
        if let Some(dep) = from_deps {
            return Ok(dep.executable.clone());
        }

        self.env
            .find_executable(tool)
            .ok_or_else(|| InstallError::MissingDependency {
                name: tool.to_string(),
                reason: "build tool not found on PATH".to_string(),
            })
    }
}

/// Read the last N lines from a file efficiently.
///
/// Instead of loading the entire file, we seek to near the end and read a fixed-size
/// tail buffer. Gradle logs for native builds get large.
fn read_last_lines(path: &Path, n: usize) -> std::io::Result<String> {
    use std::fs::File;
    use std::io::{Read, Seek, SeekFrom};

    // Read at most 16KB from the end (enough for ~400 lines at 40 chars each)
    const TAIL_SIZE: u64 = 16 * 1024;

    let mut file = File::open(path)?;
    let file_len = file.metadata()?.len();

    let seek_pos = file_len.saturating_sub(TAIL_SIZE);
    file.seek(SeekFrom::Start(seek_pos))?;

    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    let buffer = String::from_utf8_lossy(&bytes);

    // If we seeked mid-file, skip the first (partial) line
    let content = if seek_pos > 0 {
        buffer.find('\n').map_or(&buffer[..], |idx| &buffer[idx + 1..])
    } else {
        &buffer[..]
    };

    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(n);
    Ok(lines[start..].join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Arch, Os, Sha256Digest};
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn spec() -> BuildSource {
        BuildSource {
            url: "https://example.com/src.tar.gz".to_string(),
            sha256: Sha256Digest::compute(b"src"),
            tool: "gradle".to_string(),
            task: "{target}Binaries".to_string(),
            args: vec!["--no-daemon".to_string()],
            artifact: "build/bin/{target}/releaseExecutable/amx-coder.kexe".to_string(),
            dependencies: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "kexe").unwrap();
    }

    #[test]
    fn locate_prefers_primary_target() {
        let src = tempdir().unwrap();
        let env = BuildEnv::default();
        let builder = Builder::new(src.path(), &env);
        touch(&src.path().join("build/bin/macosX64/releaseExecutable/amx-coder.kexe"));
        touch(&src.path().join("build/bin/macos/releaseExecutable/amx-coder.kexe"));

        let found = builder
            .locate_artifact(&spec(), Platform::new(Os::Macos, Arch::X64))
            .unwrap();
        assert_eq!(found.target, "macosX64");
    }

    #[test]
    fn locate_falls_back_to_legacy_target() {
        let src = tempdir().unwrap();
        let env = BuildEnv::default();
        let builder = Builder::new(src.path(), &env);
        touch(&src.path().join("build/bin/macos/releaseExecutable/amx-coder.kexe"));

        let found = builder
            .locate_artifact(&spec(), Platform::new(Os::Macos, Arch::X64))
            .unwrap();
        assert_eq!(found.target, "macos");
    }

    #[test]
    fn arm64_has_no_fallback() {
        let src = tempdir().unwrap();
        let env = BuildEnv::default();
        let builder = Builder::new(src.path(), &env);
        touch(&src.path().join("build/bin/macos/releaseExecutable/amx-coder.kexe"));

        let err = builder
            .locate_artifact(&spec(), Platform::new(Os::Macos, Arch::Arm64))
            .unwrap_err();
        match err {
            InstallError::BuildArtifactNotFound { searched } => {
                assert_eq!(searched.len(), 1);
                assert!(searched[0].ends_with("build/bin/macosArm64/releaseExecutable/amx-coder.kexe"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn runs_tool_with_task_args_and_home() {
        use crate::deps::tests::write_script;

        let src = tempdir().unwrap();
        let tools = tempdir().unwrap();
        let gradle = tools.path().join("gradle");
        // Records its arguments and JAVA_HOME, then produces the artifact for the task.
        write_script(
            &gradle,
            r#"echo "$@" > args.txt
echo "$JAVA_HOME" > java_home.txt
target="${1%Binaries}"
mkdir -p "build/bin/$target/releaseExecutable"
echo kexe > "build/bin/$target/releaseExecutable/amx-coder.kexe""#,
        );

        let env = BuildEnv {
            search_path: Some(format!("{}:/usr/bin:/bin", tools.path().display()).into()),
            ..BuildEnv::default()
        };
        let deps = vec![ResolvedDependency {
            name: "openjdk".to_string(),
            executable: PathBuf::from("/opt/jdk/bin/java"),
            home: Some(PathBuf::from("/opt/jdk")),
            home_env: Some("JAVA_HOME".to_string()),
            version: None,
        }];
        let log = src.path().join("logs/build.log");

        let built = Builder::new(src.path(), &env)
            .build(
                &spec(),
                Platform::new(Os::Macos, Arch::Arm64),
                &deps,
                &log,
                false,
            )
            .unwrap();

        assert_eq!(built.target, "macosArm64");
        let args = std::fs::read_to_string(src.path().join("args.txt")).unwrap();
        assert_eq!(args.trim(), "macosArm64Binaries --no-daemon");
        let java_home = std::fs::read_to_string(src.path().join("java_home.txt")).unwrap();
        assert_eq!(java_home.trim(), "/opt/jdk");
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_tool_failure() {
        use crate::deps::tests::write_script;

        let src = tempdir().unwrap();
        let tools = tempdir().unwrap();
        write_script(&tools.path().join("gradle"), "echo 'FAILURE: Build failed'\nexit 3");

        let env = BuildEnv {
            search_path: Some(format!("{}:/usr/bin:/bin", tools.path().display()).into()),
            ..BuildEnv::default()
        };
        let log = src.path().join("build.log");
        let err = Builder::new(src.path(), &env)
            .build(&spec(), Platform::new(Os::Macos, Arch::Arm64), &[], &log, false)
            .unwrap_err();

        match err {
            InstallError::BuildToolFailure { tool, code, log: l } => {
                assert_eq!(tool, "gradle");
                assert_eq!(code, Some(3));
                assert_eq!(l, log);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(read_last_lines(&log, 5).unwrap().contains("Build failed"));
    }

    /// Fake gradle that only knows the unqualified `macosBinaries` task.
    #[cfg(unix)]
    fn legacy_only_gradle(dir: &Path) {
        crate::deps::tests::write_script(
            &dir.join("gradle"),
            r#"echo "$1" >> tasks.txt
if [ "$1" != "macosBinaries" ]; then
  echo "Task '$1' not found in root project"
  exit 1
fi
mkdir -p build/bin/macos/releaseExecutable
echo kexe > build/bin/macos/releaseExecutable/amx-coder.kexe"#,
        );
    }

    #[cfg(unix)]
    #[test]
    fn x64_retries_with_legacy_task() {
        let src = tempdir().unwrap();
        let tools = tempdir().unwrap();
        legacy_only_gradle(tools.path());
        let env = BuildEnv {
            search_path: Some(format!("{}:/usr/bin:/bin", tools.path().display()).into()),
            ..BuildEnv::default()
        };
        let log = src.path().join("build.log");

        let built = Builder::new(src.path(), &env)
            .build(&spec(), Platform::new(Os::Macos, Arch::X64), &[], &log, false)
            .unwrap();

        assert_eq!(built.target, "macos");
        let tasks = std::fs::read_to_string(src.path().join("tasks.txt")).unwrap();
        assert_eq!(tasks, "macosX64Binaries\nmacosBinaries\n");
        // both attempts end up in the same log
        assert!(std::fs::read_to_string(&log).unwrap().contains("macosX64Binaries"));
    }

    #[cfg(unix)]
    #[test]
    fn arm64_does_not_retry_legacy_task() {
        let src = tempdir().unwrap();
        let tools = tempdir().unwrap();
        legacy_only_gradle(tools.path());
        let env = BuildEnv {
            search_path: Some(format!("{}:/usr/bin:/bin", tools.path().display()).into()),
            ..BuildEnv::default()
        };

        let err = Builder::new(src.path(), &env)
            .build(
                &spec(),
                Platform::new(Os::Macos, Arch::Arm64),
                &[],
                &src.path().join("build.log"),
                false,
            )
            .unwrap_err();

        assert!(matches!(err, InstallError::BuildToolFailure { code: Some(1), .. }));
        let tasks = std::fs::read_to_string(src.path().join("tasks.txt")).unwrap();
        assert_eq!(tasks, "macosArm64Binaries\n");
    }

    #[cfg(unix)]
    #[test]
    fn both_attempts_failing_reports_primary_failure() {
        use crate::deps::tests::write_script;

        let src = tempdir().unwrap();
        let tools = tempdir().unwrap();
        write_script(
            &tools.path().join("gradle"),
            r#"echo "$1" >> tasks.txt
if [ "$1" = "macosX64Binaries" ]; then exit 4; fi
exit 5"#,
        );
        let env = BuildEnv {
            search_path: Some(format!("{}:/usr/bin:/bin", tools.path().display()).into()),
            ..BuildEnv::default()
        };

        let err = Builder::new(src.path(), &env)
            .build(
                &spec(),
                Platform::new(Os::Macos, Arch::X64),
                &[],
                &src.path().join("build.log"),
                false,
            )
            .unwrap_err();

        assert!(matches!(err, InstallError::BuildToolFailure { code: Some(4), .. }));
        let tasks = std::fs::read_to_string(src.path().join("tasks.txt")).unwrap();
        assert_eq!(tasks.lines().count(), 2);
    }

    #[test]
    fn missing_tool_is_missing_dependency() {
        let src = tempdir().unwrap();
        let env = BuildEnv {
            search_path: Some(std::ffi::OsString::new()),
            ..BuildEnv::default()
        };
        let err = Builder::new(src.path(), &env)
            .build(
                &spec(),
                Platform::new(Os::Macos, Arch::Arm64),
                &[],
                &src.path().join("build.log"),
                false,
            )
            .unwrap_err();
        assert!(matches!(err, InstallError::MissingDependency { .. }));
    }

    #[test]
    fn read_last_lines_returns_tail() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("build.log");
        let body: Vec<String> = (1..=50).map(|i| format!("line {i}")).collect();
        std::fs::write(&log, body.join("\n")).unwrap();

        let tail = read_last_lines(&log, 3).unwrap();
        assert_eq!(tail, "line 48\nline 49\nline 50");
    }
}
