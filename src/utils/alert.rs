//! Best-effort desktop notifications.
//!
//! A developer staring at the browser should still notice a dead target
//! or an aborted run. Notifications go through the platform's native
//! command; anything going wrong here is logged and forgotten.

use std::process::{Command, Stdio};

/// Fire a desktop notification. Never blocks, never fails the caller.
pub fn notify_desktop(summary: &str, body: &str) {
    let Some(mut command) = platform_command(summary, body) else {
        return;
    };

    match command.stdout(Stdio::null()).stderr(Stdio::null()).spawn() {
        Ok(_) => {}
        Err(e) => crate::debug!("alert"; "notification failed: {}", e),
    }
}

#[cfg(target_os = "linux")]
fn platform_command(summary: &str, body: &str) -> Option<Command> {
    let mut command = Command::new("notify-send");
    command.arg(summary).arg(body);
    Some(command)
}

#[cfg(target_os = "macos")]
fn platform_command(summary: &str, body: &str) -> Option<Command> {
    let script = format!(
        "display notification \"{}\" with title \"{}\"",
        escape(body),
        escape(summary)
    );
    let mut command = Command::new("osascript");
    command.arg("-e").arg(script);
    Some(command)
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn platform_command(_summary: &str, _body: &str) -> Option<Command> {
    None
}

#[cfg(target_os = "macos")]
fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
