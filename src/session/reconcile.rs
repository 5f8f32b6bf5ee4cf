//! Final/non-final token reconciliation
//!
//! Token-based services may revise provisional (non-final) text between
//! batches, and they re-segment token boundaries freely, so diffing against
//! previously typed text is unsafe. The only reliable correction is
//! character counting: erase the provisional tail typed from the previous
//! batch, then type the batch's final and provisional text fresh. Final
//! text is committed exactly once and never erased again.

use super::protocol::TokenBatch;

/// Token texts that are protocol control markers, not transcript content.
const CONTROL_MARKERS: &[&str] = &["<end>", "<fin>"];

/// Correction instruction for the injection sink: erase the last
/// `erase_count` characters, then type `insert_text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correction {
    pub erase_count: usize,
    pub insert_text: String,
}

/// Translates token batches into erase/insert corrections.
///
/// Batches must be applied in arrival order; the erase accounting depends
/// on it.
#[derive(Debug, Default)]
pub struct Reconciler {
    /// Characters of provisional text from the previous batch that are
    /// currently injected and may still be revised.
    pending_chars: usize,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the provisional tail. Call at session start (nothing is
    /// injected yet) and at turn boundaries.
    pub fn reset(&mut self) {
        self.pending_chars = 0;
    }

    /// Process one batch. Returns None when the batch carries no text.
    pub fn apply(&mut self, batch: &TokenBatch) -> Option<Correction> {
        let mut final_text = String::new();
        let mut nonfinal_text = String::new();

        for token in &batch.tokens {
            if CONTROL_MARKERS.contains(&token.text.as_str()) {
                continue;
            }
            if token.is_final {
                final_text.push_str(&token.text);
            } else {
                nonfinal_text.push_str(&token.text);
            }
        }

        if final_text.is_empty() && nonfinal_text.is_empty() {
            return None;
        }

        let erase_count = self.pending_chars;
        self.pending_chars = nonfinal_text.chars().count();

        Some(Correction {
            erase_count,
            insert_text: format!("{}{}", final_text, nonfinal_text),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::protocol::Token;

    fn batch(tokens: &[(&str, bool)]) -> TokenBatch {
        TokenBatch {
            tokens: tokens
                .iter()
                .map(|(text, is_final)| Token {
                    text: text.to_string(),
                    is_final: *is_final,
                })
                .collect(),
        }
    }

    /// Apply a correction to a virtual text buffer the way the injection
    /// sink would.
    fn apply_to_buffer(buffer: &mut String, correction: &Correction) {
        for _ in 0..correction.erase_count {
            buffer.pop();
        }
        buffer.push_str(&correction.insert_text);
    }

    #[test]
    fn test_provisional_then_final_revision() {
        let mut r = Reconciler::new();

        let first = r.apply(&batch(&[("hel", false)])).unwrap();
        assert_eq!(
            first,
            Correction {
                erase_count: 0,
                insert_text: "hel".to_string()
            }
        );

        let second = r
            .apply(&batch(&[("hello", true), (" wor", false)]))
            .unwrap();
        assert_eq!(
            second,
            Correction {
                erase_count: 3,
                insert_text: "hello wor".to_string()
            }
        );
    }

    #[test]
    fn test_empty_batch_produces_nothing() {
        let mut r = Reconciler::new();
        assert_eq!(r.apply(&batch(&[])), None);
        // Control markers alone are not text either.
        assert_eq!(r.apply(&batch(&[("<end>", true)])), None);
    }

    #[test]
    fn test_control_markers_are_stripped() {
        let mut r = Reconciler::new();
        let c = r
            .apply(&batch(&[("hi", true), ("<end>", true), ("<fin>", false)]))
            .unwrap();
        assert_eq!(c.insert_text, "hi");
        // The stripped non-final marker contributes nothing to the tail.
        let c = r.apply(&batch(&[("more", true)])).unwrap();
        assert_eq!(c.erase_count, 0);
    }

    #[test]
    fn test_final_text_is_never_erased() {
        let mut r = Reconciler::new();
        r.apply(&batch(&[("done.", true)]));
        // Next batch erases nothing: there was no provisional tail.
        let c = r.apply(&batch(&[("next", false)])).unwrap();
        assert_eq!(c.erase_count, 0);
    }

    #[test]
    fn test_erase_counts_characters_not_bytes() {
        let mut r = Reconciler::new();
        r.apply(&batch(&[("héllo", false)]));
        let c = r.apply(&batch(&[("héllo!", true)])).unwrap();
        assert_eq!(c.erase_count, 5);
    }

    #[test]
    fn test_reset_clears_pending_tail() {
        let mut r = Reconciler::new();
        r.apply(&batch(&[("pending", false)]));
        r.reset();
        let c = r.apply(&batch(&[("fresh", false)])).unwrap();
        assert_eq!(c.erase_count, 0);
    }

    #[test]
    fn test_correction_law_over_prefix_sequence() {
        // The cumulative effect of all corrections equals
        // finals_so_far + current_nonfinal at every step.
        let batches = [
            batch(&[("hel", false)]),
            batch(&[("hello", true), (" wor", false)]),
            batch(&[(" world", true)]),
            batch(&[(" how", false), (" are", false)]),
            batch(&[(" how are you", true), ("<end>", true)]),
        ];
        let expected = [
            "hel",
            "hello wor",
            "hello world",
            "hello world how are",
            "hello world how are you",
        ];

        let mut r = Reconciler::new();
        let mut buffer = String::new();
        for (batch, want) in batches.iter().zip(expected) {
            if let Some(correction) = r.apply(batch) {
                apply_to_buffer(&mut buffer, &correction);
            }
            assert_eq!(buffer, want);
        }
    }
}
