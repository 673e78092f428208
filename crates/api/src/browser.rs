//! Deferred launch of the system browser.

use std::process::Stdio;
use std::time::Duration;

/// Delay between startup and opening the control surface.
pub const OPEN_DELAY: Duration = Duration::from_millis(500);

/// The platform command that opens `url` in the default browser.
pub fn opener_command(url: &str) -> (&'static str, Vec<String>) {
    if cfg!(target_os = "macos") {
        ("open", vec![url.to_string()])
    } else if cfg!(windows) {
        (
            "cmd",
            vec!["/C".into(), "start".into(), String::new(), url.to_string()],
        )
    } else {
        ("xdg-open", vec![url.to_string()])
    }
}

/// Sleep for `delay`, then ask the OS to open `url`. Failures are logged.
pub async fn open_after(url: String, delay: Duration) {
    tokio::time::sleep(delay).await;

    let (program, args) = opener_command(&url);
    let spawned = tokio::process::Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();

    match spawned {
        Ok(_) => tracing::info!(%url, "Opened control surface in browser"),
        Err(e) => tracing::warn!(%url, program, error = %e, "Could not launch browser"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_is_the_last_argument() {
        let (program, args) = opener_command("http://localhost:8000");
        assert!(!program.is_empty());
        assert_eq!(args.last().map(String::as_str), Some("http://localhost:8000"));
    }
}
