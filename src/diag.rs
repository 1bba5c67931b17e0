use tokio::process::Command;

use crate::error::{Error, Result};

pub const DEFAULT_HOST: &str = "google.com";
pub const DEFAULT_COUNT: u32 = 4;

/// Runs the platform ping utility against `host` and returns its raw
/// output. Entirely decoupled from sampling; a hung ping affects nothing
/// but the caller.
pub async fn ping(host: &str, count: u32) -> Result<String> {
    // Windows ping counts echoes with -n, everything else with -c.
    let count_flag = if cfg!(windows) { "-n" } else { "-c" };

    let output = Command::new("ping")
        .arg(count_flag)
        .arg(count.to_string())
        .arg(host)
        .output()
        .await
        .map_err(|err| Error::Diagnostic(format!("could not run ping: {err}")))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if output.status.success() {
        return Ok(stdout);
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let detail = if stderr.trim().is_empty() {
        stdout.trim().to_string()
    } else {
        stderr.trim().to_string()
    };
    Err(Error::Diagnostic(format!(
        "ping exited with {}: {detail}",
        output.status
    )))
}
