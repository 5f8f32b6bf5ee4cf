//! Shortcut grammar parsing and formatting
//!
//! Grammar:
//!   - tokens joined by `+` form a simultaneous chord: `<ctrl>+<shift>+v`
//!   - two chords separated by `,` form a sequential shortcut: `<ctrl>,<ctrl>`
//!   - the legacy `2x<token>` form is accepted and normalized to
//!     `<token>,<token>` (a double-tap)
//!
//! Shortcut strings come from free-form capture UI, so parsing never hard
//! fails: unknown tokens are dropped with a warning, and a spec that
//! resolves to zero keys is empty and matches nothing.

use crate::keys::KeyId;
use std::collections::BTreeSet;
use std::fmt;

/// A chord: a set of keys intended to be pressed together.
pub type Chord = BTreeSet<KeyId>;

/// Parsed shortcut specification.
///
/// A spec is either simultaneous or sequential, never both. An empty spec
/// is inert: it matches nothing and never blocks the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShortcutSpec {
    Empty,
    /// All keys must be down at once.
    Simultaneous(Chord),
    /// First chord pressed and fully released, then the second chord
    /// pressed within the timing window. `first == second` is a double-tap.
    Sequential { first: Chord, second: Chord },
}

impl ShortcutSpec {
    /// Parse a config-format shortcut string. Never fails: unrecognized
    /// tokens degrade to warnings and a fully unrecognized spec is Empty.
    pub fn parse(spec: &str) -> ShortcutSpec {
        let spec = spec.trim();
        if spec.is_empty() {
            return ShortcutSpec::Empty;
        }

        // Legacy double-tap form: 2x<token> == <token>,<token>
        if let Some(inner) = spec.strip_prefix("2x") {
            let chord = parse_chord(inner);
            if chord.is_empty() {
                return ShortcutSpec::Empty;
            }
            return ShortcutSpec::Sequential {
                first: chord.clone(),
                second: chord,
            };
        }

        if let Some((first_str, second_str)) = spec.split_once(',') {
            let first = parse_chord(first_str);
            let second = parse_chord(second_str);
            // A sequence with either half missing cannot fire; treat it as
            // empty rather than silently behaving like a plain chord.
            if first.is_empty() || second.is_empty() {
                if !first.is_empty() || !second.is_empty() {
                    tracing::warn!("Incomplete sequential shortcut {:?}, ignoring", spec);
                }
                return ShortcutSpec::Empty;
            }
            return ShortcutSpec::Sequential { first, second };
        }

        let chord = parse_chord(spec);
        if chord.is_empty() {
            ShortcutSpec::Empty
        } else {
            ShortcutSpec::Simultaneous(chord)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ShortcutSpec::Empty)
    }
}

/// Parse one chord: tokens joined by `+`.
fn parse_chord(chord: &str) -> Chord {
    let mut keys = Chord::new();
    for token in chord.split('+') {
        match resolve_token(token) {
            Some(key) => {
                keys.insert(key);
            }
            None => {
                let trimmed = token.trim();
                if !trimmed.is_empty() {
                    tracing::warn!("Unknown shortcut token: {:?}", trimmed);
                }
            }
        }
    }
    keys
}

/// Resolve a single token: `<name>` for symbolic keys, or one printable char.
fn resolve_token(token: &str) -> Option<KeyId> {
    let token = token.trim().to_lowercase();
    if let Some(name) = token.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
        return KeyId::from_symbol(name);
    }
    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => KeyId::from_char(c),
        _ => None,
    }
}

fn format_chord(chord: &Chord) -> String {
    chord
        .iter()
        .map(|k| k.symbol())
        .collect::<Vec<_>>()
        .join("+")
}

impl fmt::Display for ShortcutSpec {
    /// Canonical string form; `parse(format(spec)) == spec`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShortcutSpec::Empty => Ok(()),
            ShortcutSpec::Simultaneous(chord) => write!(f, "{}", format_chord(chord)),
            ShortcutSpec::Sequential { first, second } => {
                write!(f, "{},{}", format_chord(first), format_chord(second))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chord(keys: &[KeyId]) -> Chord {
        keys.iter().copied().collect()
    }

    #[test]
    fn test_parse_simultaneous() {
        let spec = ShortcutSpec::parse("<ctrl>+<shift>+v");
        assert_eq!(
            spec,
            ShortcutSpec::Simultaneous(chord(&[KeyId::Ctrl, KeyId::Shift, KeyId::Char('v')]))
        );
    }

    #[test]
    fn test_parse_sequential() {
        let spec = ShortcutSpec::parse("<ctrl>+a,b");
        assert_eq!(
            spec,
            ShortcutSpec::Sequential {
                first: chord(&[KeyId::Ctrl, KeyId::Char('a')]),
                second: chord(&[KeyId::Char('b')]),
            }
        );
    }

    #[test]
    fn test_parse_legacy_double_tap() {
        let spec = ShortcutSpec::parse("2x<ctrl>");
        assert_eq!(
            spec,
            ShortcutSpec::Sequential {
                first: chord(&[KeyId::Ctrl]),
                second: chord(&[KeyId::Ctrl]),
            }
        );
        // Equivalent to the explicit comma form
        assert_eq!(spec, ShortcutSpec::parse("<ctrl>,<ctrl>"));
    }

    #[test]
    fn test_parse_empty_and_whitespace() {
        assert_eq!(ShortcutSpec::parse(""), ShortcutSpec::Empty);
        assert_eq!(ShortcutSpec::parse("   "), ShortcutSpec::Empty);
        assert!(ShortcutSpec::parse("").is_empty());
    }

    #[test]
    fn test_unknown_tokens_are_dropped_not_fatal() {
        // The unknown token disappears, the rest of the chord survives.
        let spec = ShortcutSpec::parse("<ctrl>+<bogus>+v");
        assert_eq!(
            spec,
            ShortcutSpec::Simultaneous(chord(&[KeyId::Ctrl, KeyId::Char('v')]))
        );
        // A spec of only unknown tokens degrades to empty, not an error.
        assert_eq!(ShortcutSpec::parse("<bogus>+<junk>"), ShortcutSpec::Empty);
        assert_eq!(ShortcutSpec::parse("2x<bogus>"), ShortcutSpec::Empty);
    }

    #[test]
    fn test_half_empty_sequence_is_inert() {
        assert_eq!(ShortcutSpec::parse("<ctrl>,"), ShortcutSpec::Empty);
        assert_eq!(ShortcutSpec::parse(",<ctrl>"), ShortcutSpec::Empty);
    }

    #[test]
    fn test_case_insensitive_tokens() {
        assert_eq!(
            ShortcutSpec::parse("<CTRL>+V"),
            ShortcutSpec::Simultaneous(chord(&[KeyId::Ctrl, KeyId::Char('v')]))
        );
    }

    #[test]
    fn test_format_round_trip() {
        let specs = [
            ShortcutSpec::Simultaneous(chord(&[KeyId::Ctrl, KeyId::Shift, KeyId::Char('v')])),
            ShortcutSpec::Sequential {
                first: chord(&[KeyId::Ctrl]),
                second: chord(&[KeyId::Ctrl]),
            },
            ShortcutSpec::Sequential {
                first: chord(&[KeyId::Alt, KeyId::Char('x')]),
                second: chord(&[KeyId::F(5)]),
            },
            ShortcutSpec::Simultaneous(chord(&[KeyId::Meta, KeyId::Space])),
            ShortcutSpec::Empty,
        ];
        for spec in specs {
            assert_eq!(ShortcutSpec::parse(&spec.to_string()), spec);
        }
    }
}
