//! Text injection module
//!
//! Delivers corrections to the focused application as synthesized input:
//! erase the last N characters with backspaces, then type the replacement.
//!
//! Fallback chain:
//! 1. wtype - Wayland-native, best Unicode support, no daemon needed
//! 2. ydotool - works on X11/Wayland/TTY, requires the ydotoold daemon
//!
//! The router tracks how many characters it has injected in the current
//! session and clamps erase requests to that amount: the focused field may
//! legitimately differ from the reconciler's bookkeeping if the user
//! edited it by hand, so the sink erases at most what it knows it typed.

pub mod wtype;
pub mod ydotool;

use crate::config::InjectConfig;
use crate::error::InjectError;

/// Trait for text injection implementations
#[async_trait::async_trait]
pub trait TextInjector: Send + Sync {
    /// Erase `erase_count` characters, then type `text`
    async fn inject(&self, erase_count: usize, text: &str) -> Result<(), InjectError>;

    /// Check if this injection method is available
    async fn is_available(&self) -> bool;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Factory function that returns the injection fallback chain
pub fn create_injector_chain(config: &InjectConfig) -> Vec<Box<dyn TextInjector>> {
    vec![
        Box::new(wtype::WtypeInjector::new()),
        Box::new(ydotool::YdotoolInjector::new(config.type_delay_ms)),
    ]
}

/// Applies corrections through the first working injector, tracking the
/// outstanding character count for erase clamping.
pub struct InjectionRouter {
    chain: Vec<Box<dyn TextInjector>>,
    outstanding: usize,
}

impl InjectionRouter {
    pub fn new(config: &InjectConfig) -> Self {
        Self {
            chain: create_injector_chain(config),
            outstanding: 0,
        }
    }

    #[cfg(test)]
    fn with_chain(chain: Vec<Box<dyn TextInjector>>) -> Self {
        Self {
            chain,
            outstanding: 0,
        }
    }

    /// Forget the outstanding text. Call at session start.
    pub fn reset(&mut self) {
        self.outstanding = 0;
    }

    /// Apply one correction through the first available injector.
    pub async fn apply(&mut self, erase_count: usize, text: &str) -> Result<(), InjectError> {
        let erase = erase_count.min(self.outstanding);
        if erase < erase_count {
            tracing::debug!(
                "Clamping erase from {} to {} outstanding characters",
                erase_count,
                erase
            );
        }
        if erase == 0 && text.is_empty() {
            return Ok(());
        }

        for injector in &self.chain {
            if !injector.is_available().await {
                tracing::debug!("{} not available, trying next", injector.name());
                continue;
            }
            match injector.inject(erase, text).await {
                Ok(()) => {
                    self.outstanding = self.outstanding - erase + text.chars().count();
                    tracing::trace!(
                        "Injected via {} (erase {}, type {:?})",
                        injector.name(),
                        erase,
                        text
                    );
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("{} failed: {}, trying next", injector.name(), e);
                }
            }
        }

        Err(InjectError::AllMethodsFailed)
    }
}
