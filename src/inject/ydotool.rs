//! ydotool-based text injection
//!
//! Uses ydotool, which talks to the uinput kernel interface through the
//! ydotoold daemon, so it works on all compositors and X11.
//!
//! Requires:
//! - ydotool installed
//! - ydotoold daemon running (systemctl --user start ydotool)

use super::TextInjector;
use crate::error::InjectError;
use std::process::Stdio;
use tokio::process::Command;

/// Linux input event code for KEY_BACKSPACE
const BACKSPACE_CODE: u32 = 14;

/// ydotool-based injector
pub struct YdotoolInjector {
    /// Delay between keypresses in milliseconds
    delay_ms: u32,
}

impl YdotoolInjector {
    pub fn new(delay_ms: u32) -> Self {
        Self { delay_ms }
    }

    /// Send `count` backspace press/release pairs in one invocation.
    async fn erase(&self, count: usize) -> Result<(), InjectError> {
        if count == 0 {
            return Ok(());
        }
        let mut cmd = Command::new("ydotool");
        cmd.arg("key");
        for _ in 0..count {
            cmd.arg(format!("{}:1", BACKSPACE_CODE));
            cmd.arg(format!("{}:0", BACKSPACE_CODE));
        }
        run_ydotool(cmd).await
    }

    async fn type_text(&self, text: &str) -> Result<(), InjectError> {
        if text.is_empty() {
            return Ok(());
        }
        let mut cmd = Command::new("ydotool");
        cmd.arg("type");
        if self.delay_ms > 0 {
            cmd.arg("--key-delay").arg(self.delay_ms.to_string());
        }
        // The -- ensures text starting with - isn't treated as an option
        cmd.arg("--").arg(text);
        run_ydotool(cmd).await
    }
}

async fn run_ydotool(mut cmd: Command) -> Result<(), InjectError> {
    let output = cmd
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                InjectError::YdotoolNotFound
            } else {
                InjectError::InjectionFailed(e.to_string())
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("socket") || stderr.contains("connect") || stderr.contains("daemon") {
            return Err(InjectError::YdotoolNotRunning);
        }
        return Err(InjectError::InjectionFailed(stderr.to_string()));
    }

    Ok(())
}

#[async_trait::async_trait]
impl TextInjector for YdotoolInjector {
    async fn inject(&self, erase_count: usize, text: &str) -> Result<(), InjectError> {
        self.erase(erase_count).await?;
        self.type_text(text).await
    }

    async fn is_available(&self) -> bool {
        let which_result = Command::new("which")
            .arg("ydotool")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        if !which_result.map(|s| s.success()).unwrap_or(false) {
            return false;
        }

        // A no-op type succeeds quickly only when ydotoold is running
        Command::new("ydotool")
            .args(["type", ""])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn name(&self) -> &'static str {
        "ydotool"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let injector = YdotoolInjector::new(10);
        assert_eq!(injector.delay_ms, 10);
    }
}
