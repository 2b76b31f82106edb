use log::{debug, info};
use std::path::Path;

use crate::error::{InstallError, Result};
use crate::runtime::Runtime;

/// Flag the installed executable answers with its version.
pub const VERSION_FLAG: &str = "--version";

/// Run `<executable> --version` and require a zero exit status.
///
/// With `expected_version`, the output must also mention that version.
/// Returns the trimmed output.
#[tracing::instrument(skip(runtime))]
pub fn verify_executable<R: Runtime>(
    runtime: &R,
    executable: &Path,
    expected_version: Option<&str>,
) -> Result<String> {
    let fail = |reason: String| InstallError::Verification {
        executable: executable.to_path_buf(),
        reason,
    };

    if !runtime.exists(executable) {
        return Err(fail("executable does not exist".to_string()));
    }

    let output = runtime
        .run_command(executable, &[VERSION_FLAG.to_string()])
        .map_err(|e| fail(format!("{:#}", e)))?;

    debug!(
        "{:?} {} exited with {:?}",
        executable, VERSION_FLAG, output.code
    );

    if !output.success {
        let status = match output.code {
            Some(code) => format!("exit status {}", code),
            None => "termination by signal".to_string(),
        };
        let stderr = output.stderr.trim();
        return Err(fail(if stderr.is_empty() {
            status
        } else {
            format!("{}: {}", status, stderr)
        }));
    }

    // Some tools print their version on stderr.
    let reported = if output.stdout.trim().is_empty() {
        output.stderr.trim().to_string()
    } else {
        output.stdout.trim().to_string()
    };

    if let Some(version) = expected_version
        && !reported.contains(version)
    {
        return Err(fail(format!(
            "expected version {} but it reported {:?}",
            version, reported
        )));
    }

    info!("{} {} -> {}", executable.display(), VERSION_FLAG, reported);
    Ok(reported)
}
