//! Post-install smoke tests.
//!
//! Each [`TestCase`] runs the installed binary once and asserts a zero exit
//! status plus a substring in its output (stdout followed by stderr).

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use wait_timeout::ChildExt;

use crate::InstallError;
use crate::formula::TestCase;

/// Upper bound for a single smoke-test invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Run every test case against `binary`, stopping at the first failure.
///
/// # Errors
///
/// Returns [`InstallError::VerificationFailed`] describing the failing case.
pub fn verify(binary: &Path, tests: &[TestCase], timeout: Duration) -> Result<(), InstallError> {
    for case in tests {
        let output = shell_output(binary, &case.args, timeout)?;
        if !output.contains(&case.contains) {
            return Err(InstallError::VerificationFailed(format!(
                "`{} {}` output does not contain {:?}",
                binary.display(),
                case.args.join(" "),
                case.contains
            )));
        }
        tracing::debug!(args = ?case.args, expected = %case.contains, "smoke test passed");
    }
    Ok(())
}

/// Run `binary args...`, returning its combined output if it exits zero in time.
///
/// # Errors
///
/// Returns [`InstallError::VerificationFailed`] on spawn failure, timeout or
/// non-zero exit.
pub fn shell_output(
    binary: &Path,
    args: &[String],
    timeout: Duration,
) -> Result<String, InstallError> {
    let describe = || format!("{} {}", binary.display(), args.join(" "));

    let mut child = Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| InstallError::VerificationFailed(format!("`{}`: {e}", describe())))?;

    let started = Instant::now();
    // Drain both pipes on their own threads so a chatty child cannot block on a full pipe.
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let status = match child.wait_timeout(timeout)? {
        Some(status) => status,
        None => {
            child.kill().ok();
            child.wait().ok();
            return Err(InstallError::VerificationFailed(format!(
                "`{}` timed out after {}s",
                describe(),
                timeout.as_secs()
            )));
        }
    };

    // A background grandchild can keep the pipes open after exit; wait only
    // for what is left of the timeout.
    let mut output = String::new();
    for pipe in [stdout, stderr].into_iter().flatten() {
        let remaining = timeout.saturating_sub(started.elapsed());
        match pipe.recv_timeout(remaining) {
            Ok(text) => output.push_str(&text),
            Err(RecvTimeoutError::Timeout) => {
                return Err(InstallError::VerificationFailed(format!(
                    "`{}` exited but left its output open for {}s",
                    describe(),
                    timeout.as_secs()
                )));
            }
            Err(RecvTimeoutError::Disconnected) => {}
        }
    }

    if !status.success() {
        return Err(InstallError::VerificationFailed(format!(
            "`{}` exited with {status}",
            describe()
        )));
    }

    Ok(output)
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let mut bytes = Vec::new();
        pipe.read_to_end(&mut bytes).ok();
        tx.send(String::from_utf8_lossy(&bytes).into_owned()).ok();
    });
    rx
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::deps::tests::write_script;

    fn case(args: &[&str], contains: &str) -> TestCase {
        TestCase {
            args: args.iter().map(|a| (*a).to_string()).collect(),
            contains: contains.to_string(),
        }
    }

    fn fake_amx(dir: &Path) -> std::path::PathBuf {
        let bin = dir.join("amx-coder");
        write_script(
            &bin,
            r#"case "$1" in
  --version) echo "AMX Coder 1.0.2" ;;
  --help) echo "AMX Coder - Multi-Agent Coding Workspace" ;;
  --stderr) echo "warning only" >&2 ;;
  --slow) sleep 5 ;;
  --daemon) (sleep 5) & echo "started" ;;
  *) exit 2 ;;
esac"#,
        );
        bin
    }

    #[test]
    fn version_and_help_pass() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_amx(dir.path());
        verify(
            &bin,
            &[
                case(&["--version"], "AMX Coder"),
                case(&["--help"], "Multi-Agent Coding Workspace"),
            ],
            DEFAULT_TIMEOUT,
        )
        .unwrap();
    }

    #[test]
    fn missing_substring_fails() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_amx(dir.path());
        let err = verify(&bin, &[case(&["--version"], "AMX Operator")], DEFAULT_TIMEOUT)
            .unwrap_err();
        assert!(matches!(err, InstallError::VerificationFailed(ref m) if m.contains("AMX Operator")));
    }

    #[test]
    fn stderr_counts_as_output() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_amx(dir.path());
        verify(&bin, &[case(&["--stderr"], "warning only")], DEFAULT_TIMEOUT).unwrap();
    }

    #[test]
    fn non_zero_exit_fails() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_amx(dir.path());
        let err = shell_output(&bin, &["--bogus".to_string()], DEFAULT_TIMEOUT).unwrap_err();
        assert!(matches!(err, InstallError::VerificationFailed(_)));
    }

    #[test]
    fn timeout_kills_child() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_amx(dir.path());
        let err = shell_output(&bin, &["--slow".to_string()], Duration::from_millis(200))
            .unwrap_err();
        assert!(matches!(err, InstallError::VerificationFailed(ref m) if m.contains("timed out")));
    }

    #[test]
    fn background_child_holding_output_does_not_hang() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_amx(dir.path());
        let started = Instant::now();
        let err = shell_output(&bin, &["--daemon".to_string()], Duration::from_millis(500))
            .unwrap_err();
        assert!(matches!(err, InstallError::VerificationFailed(ref m) if m.contains("output open")));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
