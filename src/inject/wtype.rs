//! wtype-based text injection
//!
//! Uses wtype to synthesize keyboard input on Wayland. Preferred because
//! it needs no daemon and has the best Unicode support.

use super::TextInjector;
use crate::error::InjectError;
use std::process::Stdio;
use tokio::process::Command;

/// wtype-based injector
pub struct WtypeInjector;

impl WtypeInjector {
    pub fn new() -> Self {
        Self
    }

    /// Send `count` BackSpace presses in one wtype invocation.
    async fn erase(&self, count: usize) -> Result<(), InjectError> {
        if count == 0 {
            return Ok(());
        }
        let mut cmd = Command::new("wtype");
        for _ in 0..count {
            cmd.arg("-k").arg("BackSpace");
        }
        run_wtype(cmd).await
    }

    async fn type_text(&self, text: &str) -> Result<(), InjectError> {
        if text.is_empty() {
            return Ok(());
        }
        let mut cmd = Command::new("wtype");
        // The -- ensures text starting with - isn't treated as an option
        cmd.arg("--").arg(text);
        run_wtype(cmd).await
    }
}

impl Default for WtypeInjector {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_wtype(mut cmd: Command) -> Result<(), InjectError> {
    let output = cmd
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                InjectError::WtypeNotFound
            } else {
                InjectError::InjectionFailed(e.to_string())
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(InjectError::InjectionFailed(format!(
            "wtype failed: {}",
            stderr
        )));
    }

    Ok(())
}

#[async_trait::async_trait]
impl TextInjector for WtypeInjector {
    async fn inject(&self, erase_count: usize, text: &str) -> Result<(), InjectError> {
        self.erase(erase_count).await?;
        self.type_text(text).await
    }

    async fn is_available(&self) -> bool {
        // Just check if wtype exists in PATH; it fails naturally if
        // Wayland isn't available.
        Command::new("which")
            .arg("wtype")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn name(&self) -> &'static str {
        "wtype"
    }
}
