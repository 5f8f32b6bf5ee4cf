//! Canonical key identity space
//!
//! Every backend maps its platform key codes into [`KeyId`] before the
//! recognition engine sees them. Left/right modifier variants fold into a
//! single identity, so a combo configured with either variant matches a
//! physical press of both. The mapping tables are static matches validated
//! at compile time.

/// Canonical identity for a physical key after modifier normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyId {
    Ctrl,
    Shift,
    Alt,
    Meta,
    Space,
    Enter,
    Tab,
    Backspace,
    Delete,
    Escape,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
    Insert,
    Pause,
    PrintScreen,
    ScrollLock,
    CapsLock,
    NumLock,
    /// Function key F1..F24
    F(u8),
    /// Printable character key (lowercase / unshifted form)
    Char(char),
}

/// Symbolic names accepted in shortcut specs, e.g. `<ctrl>` or `<page_up>`.
/// `<cmd>` and `<meta>` are aliases for `<super>`.
const SYMBOL_TABLE: &[(&str, KeyId)] = &[
    ("ctrl", KeyId::Ctrl),
    ("shift", KeyId::Shift),
    ("alt", KeyId::Alt),
    ("super", KeyId::Meta),
    ("cmd", KeyId::Meta),
    ("meta", KeyId::Meta),
    ("space", KeyId::Space),
    ("enter", KeyId::Enter),
    ("tab", KeyId::Tab),
    ("backspace", KeyId::Backspace),
    ("delete", KeyId::Delete),
    ("escape", KeyId::Escape),
    ("esc", KeyId::Escape),
    ("home", KeyId::Home),
    ("end", KeyId::End),
    ("page_up", KeyId::PageUp),
    ("page_down", KeyId::PageDown),
    ("up", KeyId::Up),
    ("down", KeyId::Down),
    ("left", KeyId::Left),
    ("right", KeyId::Right),
    ("insert", KeyId::Insert),
    ("pause", KeyId::Pause),
    ("print_screen", KeyId::PrintScreen),
    ("scroll_lock", KeyId::ScrollLock),
    ("caps_lock", KeyId::CapsLock),
    ("num_lock", KeyId::NumLock),
];

/// Printable characters accepted as bare single-character tokens.
const CHAR_KEYS: &str = "abcdefghijklmnopqrstuvwxyz0123456789-=[];',./\\`";

impl KeyId {
    /// Resolve a symbolic name (without brackets) to a key, if known.
    pub fn from_symbol(name: &str) -> Option<KeyId> {
        if let Some((_, key)) = SYMBOL_TABLE.iter().find(|(n, _)| *n == name) {
            return Some(*key);
        }
        // F-keys: f1..f24
        if let Some(num) = name.strip_prefix('f') {
            if let Ok(n) = num.parse::<u8>() {
                if (1..=24).contains(&n) {
                    return Some(KeyId::F(n));
                }
            }
        }
        None
    }

    /// Resolve a bare printable character token.
    pub fn from_char(c: char) -> Option<KeyId> {
        let folded = c.to_ascii_lowercase();
        CHAR_KEYS.contains(folded).then_some(KeyId::Char(folded))
    }

    /// Canonical token form used by the shortcut formatter.
    pub fn symbol(&self) -> String {
        match self {
            KeyId::Ctrl => "<ctrl>".into(),
            KeyId::Shift => "<shift>".into(),
            KeyId::Alt => "<alt>".into(),
            KeyId::Meta => "<super>".into(),
            KeyId::Space => "<space>".into(),
            KeyId::Enter => "<enter>".into(),
            KeyId::Tab => "<tab>".into(),
            KeyId::Backspace => "<backspace>".into(),
            KeyId::Delete => "<delete>".into(),
            KeyId::Escape => "<escape>".into(),
            KeyId::Home => "<home>".into(),
            KeyId::End => "<end>".into(),
            KeyId::PageUp => "<page_up>".into(),
            KeyId::PageDown => "<page_down>".into(),
            KeyId::Up => "<up>".into(),
            KeyId::Down => "<down>".into(),
            KeyId::Left => "<left>".into(),
            KeyId::Right => "<right>".into(),
            KeyId::Insert => "<insert>".into(),
            KeyId::Pause => "<pause>".into(),
            KeyId::PrintScreen => "<print_screen>".into(),
            KeyId::ScrollLock => "<scroll_lock>".into(),
            KeyId::CapsLock => "<caps_lock>".into(),
            KeyId::NumLock => "<num_lock>".into(),
            KeyId::F(n) => format!("<f{}>", n),
            KeyId::Char(c) => c.to_string(),
        }
    }

    /// Map a Linux evdev key code to its canonical identity.
    ///
    /// Left and right modifier variants fold together. Keys the engine has
    /// no use for (media keys, keypad, etc.) map to None and are ignored.
    #[cfg(target_os = "linux")]
    pub fn from_evdev(key: evdev::Key) -> Option<KeyId> {
        use evdev::Key;
        let id = match key {
            Key::KEY_LEFTCTRL | Key::KEY_RIGHTCTRL => KeyId::Ctrl,
            Key::KEY_LEFTSHIFT | Key::KEY_RIGHTSHIFT => KeyId::Shift,
            Key::KEY_LEFTALT | Key::KEY_RIGHTALT => KeyId::Alt,
            Key::KEY_LEFTMETA | Key::KEY_RIGHTMETA => KeyId::Meta,

            Key::KEY_SPACE => KeyId::Space,
            Key::KEY_ENTER => KeyId::Enter,
            Key::KEY_TAB => KeyId::Tab,
            Key::KEY_BACKSPACE => KeyId::Backspace,
            Key::KEY_DELETE => KeyId::Delete,
            Key::KEY_ESC => KeyId::Escape,
            Key::KEY_HOME => KeyId::Home,
            Key::KEY_END => KeyId::End,
            Key::KEY_PAGEUP => KeyId::PageUp,
            Key::KEY_PAGEDOWN => KeyId::PageDown,
            Key::KEY_UP => KeyId::Up,
            Key::KEY_DOWN => KeyId::Down,
            Key::KEY_LEFT => KeyId::Left,
            Key::KEY_RIGHT => KeyId::Right,
            Key::KEY_INSERT => KeyId::Insert,
            Key::KEY_PAUSE => KeyId::Pause,
            Key::KEY_SYSRQ => KeyId::PrintScreen,
            Key::KEY_SCROLLLOCK => KeyId::ScrollLock,
            Key::KEY_CAPSLOCK => KeyId::CapsLock,
            Key::KEY_NUMLOCK => KeyId::NumLock,

            Key::KEY_F1 => KeyId::F(1),
            Key::KEY_F2 => KeyId::F(2),
            Key::KEY_F3 => KeyId::F(3),
            Key::KEY_F4 => KeyId::F(4),
            Key::KEY_F5 => KeyId::F(5),
            Key::KEY_F6 => KeyId::F(6),
            Key::KEY_F7 => KeyId::F(7),
            Key::KEY_F8 => KeyId::F(8),
            Key::KEY_F9 => KeyId::F(9),
            Key::KEY_F10 => KeyId::F(10),
            Key::KEY_F11 => KeyId::F(11),
            Key::KEY_F12 => KeyId::F(12),
            Key::KEY_F13 => KeyId::F(13),
            Key::KEY_F14 => KeyId::F(14),
            Key::KEY_F15 => KeyId::F(15),
            Key::KEY_F16 => KeyId::F(16),
            Key::KEY_F17 => KeyId::F(17),
            Key::KEY_F18 => KeyId::F(18),
            Key::KEY_F19 => KeyId::F(19),
            Key::KEY_F20 => KeyId::F(20),
            Key::KEY_F21 => KeyId::F(21),
            Key::KEY_F22 => KeyId::F(22),
            Key::KEY_F23 => KeyId::F(23),
            Key::KEY_F24 => KeyId::F(24),

            Key::KEY_A => KeyId::Char('a'),
            Key::KEY_B => KeyId::Char('b'),
            Key::KEY_C => KeyId::Char('c'),
            Key::KEY_D => KeyId::Char('d'),
            Key::KEY_E => KeyId::Char('e'),
            Key::KEY_F => KeyId::Char('f'),
            Key::KEY_G => KeyId::Char('g'),
            Key::KEY_H => KeyId::Char('h'),
            Key::KEY_I => KeyId::Char('i'),
            Key::KEY_J => KeyId::Char('j'),
            Key::KEY_K => KeyId::Char('k'),
            Key::KEY_L => KeyId::Char('l'),
            Key::KEY_M => KeyId::Char('m'),
            Key::KEY_N => KeyId::Char('n'),
            Key::KEY_O => KeyId::Char('o'),
            Key::KEY_P => KeyId::Char('p'),
            Key::KEY_Q => KeyId::Char('q'),
            Key::KEY_R => KeyId::Char('r'),
            Key::KEY_S => KeyId::Char('s'),
            Key::KEY_T => KeyId::Char('t'),
            Key::KEY_U => KeyId::Char('u'),
            Key::KEY_V => KeyId::Char('v'),
            Key::KEY_W => KeyId::Char('w'),
            Key::KEY_X => KeyId::Char('x'),
            Key::KEY_Y => KeyId::Char('y'),
            Key::KEY_Z => KeyId::Char('z'),

            Key::KEY_0 => KeyId::Char('0'),
            Key::KEY_1 => KeyId::Char('1'),
            Key::KEY_2 => KeyId::Char('2'),
            Key::KEY_3 => KeyId::Char('3'),
            Key::KEY_4 => KeyId::Char('4'),
            Key::KEY_5 => KeyId::Char('5'),
            Key::KEY_6 => KeyId::Char('6'),
            Key::KEY_7 => KeyId::Char('7'),
            Key::KEY_8 => KeyId::Char('8'),
            Key::KEY_9 => KeyId::Char('9'),

            Key::KEY_MINUS => KeyId::Char('-'),
            Key::KEY_EQUAL => KeyId::Char('='),
            Key::KEY_LEFTBRACE => KeyId::Char('['),
            Key::KEY_RIGHTBRACE => KeyId::Char(']'),
            Key::KEY_SEMICOLON => KeyId::Char(';'),
            Key::KEY_APOSTROPHE => KeyId::Char('\''),
            Key::KEY_COMMA => KeyId::Char(','),
            Key::KEY_DOT => KeyId::Char('.'),
            Key::KEY_SLASH => KeyId::Char('/'),
            Key::KEY_BACKSLASH => KeyId::Char('\\'),
            Key::KEY_GRAVE => KeyId::Char('`'),

            _ => return None,
        };
        Some(id)
    }

    /// Map an rdev (windowing hook) key to its canonical identity.
    ///
    /// AltGr folds to Alt, matching the raw-device table.
    pub fn from_rdev(key: rdev::Key) -> Option<KeyId> {
        use rdev::Key;
        let id = match key {
            Key::ControlLeft | Key::ControlRight => KeyId::Ctrl,
            Key::ShiftLeft | Key::ShiftRight => KeyId::Shift,
            Key::Alt | Key::AltGr => KeyId::Alt,
            Key::MetaLeft | Key::MetaRight => KeyId::Meta,

            Key::Space => KeyId::Space,
            Key::Return => KeyId::Enter,
            Key::Tab => KeyId::Tab,
            Key::Backspace => KeyId::Backspace,
            Key::Delete => KeyId::Delete,
            Key::Escape => KeyId::Escape,
            Key::Home => KeyId::Home,
            Key::End => KeyId::End,
            Key::PageUp => KeyId::PageUp,
            Key::PageDown => KeyId::PageDown,
            Key::UpArrow => KeyId::Up,
            Key::DownArrow => KeyId::Down,
            Key::LeftArrow => KeyId::Left,
            Key::RightArrow => KeyId::Right,
            Key::Insert => KeyId::Insert,
            Key::Pause => KeyId::Pause,
            Key::PrintScreen => KeyId::PrintScreen,
            Key::ScrollLock => KeyId::ScrollLock,
            Key::CapsLock => KeyId::CapsLock,
            Key::NumLock => KeyId::NumLock,

            Key::F1 => KeyId::F(1),
            Key::F2 => KeyId::F(2),
            Key::F3 => KeyId::F(3),
            Key::F4 => KeyId::F(4),
            Key::F5 => KeyId::F(5),
            Key::F6 => KeyId::F(6),
            Key::F7 => KeyId::F(7),
            Key::F8 => KeyId::F(8),
            Key::F9 => KeyId::F(9),
            Key::F10 => KeyId::F(10),
            Key::F11 => KeyId::F(11),
            Key::F12 => KeyId::F(12),

            Key::KeyA => KeyId::Char('a'),
            Key::KeyB => KeyId::Char('b'),
            Key::KeyC => KeyId::Char('c'),
            Key::KeyD => KeyId::Char('d'),
            Key::KeyE => KeyId::Char('e'),
            Key::KeyF => KeyId::Char('f'),
            Key::KeyG => KeyId::Char('g'),
            Key::KeyH => KeyId::Char('h'),
            Key::KeyI => KeyId::Char('i'),
            Key::KeyJ => KeyId::Char('j'),
            Key::KeyK => KeyId::Char('k'),
            Key::KeyL => KeyId::Char('l'),
            Key::KeyM => KeyId::Char('m'),
            Key::KeyN => KeyId::Char('n'),
            Key::KeyO => KeyId::Char('o'),
            Key::KeyP => KeyId::Char('p'),
            Key::KeyQ => KeyId::Char('q'),
            Key::KeyR => KeyId::Char('r'),
            Key::KeyS => KeyId::Char('s'),
            Key::KeyT => KeyId::Char('t'),
            Key::KeyU => KeyId::Char('u'),
            Key::KeyV => KeyId::Char('v'),
            Key::KeyW => KeyId::Char('w'),
            Key::KeyX => KeyId::Char('x'),
            Key::KeyY => KeyId::Char('y'),
            Key::KeyZ => KeyId::Char('z'),

            Key::Num0 => KeyId::Char('0'),
            Key::Num1 => KeyId::Char('1'),
            Key::Num2 => KeyId::Char('2'),
            Key::Num3 => KeyId::Char('3'),
            Key::Num4 => KeyId::Char('4'),
            Key::Num5 => KeyId::Char('5'),
            Key::Num6 => KeyId::Char('6'),
            Key::Num7 => KeyId::Char('7'),
            Key::Num8 => KeyId::Char('8'),
            Key::Num9 => KeyId::Char('9'),

            Key::Minus => KeyId::Char('-'),
            Key::Equal => KeyId::Char('='),
            Key::LeftBracket => KeyId::Char('['),
            Key::RightBracket => KeyId::Char(']'),
            Key::SemiColon => KeyId::Char(';'),
            Key::Quote => KeyId::Char('\''),
            Key::Comma => KeyId::Char(','),
            Key::Dot => KeyId::Char('.'),
            Key::Slash => KeyId::Char('/'),
            Key::BackSlash => KeyId::Char('\\'),
            Key::BackQuote => KeyId::Char('`'),

            _ => return None,
        };
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_lookup() {
        assert_eq!(KeyId::from_symbol("ctrl"), Some(KeyId::Ctrl));
        assert_eq!(KeyId::from_symbol("super"), Some(KeyId::Meta));
        assert_eq!(KeyId::from_symbol("cmd"), Some(KeyId::Meta));
        assert_eq!(KeyId::from_symbol("f5"), Some(KeyId::F(5)));
        assert_eq!(KeyId::from_symbol("f24"), Some(KeyId::F(24)));
        assert_eq!(KeyId::from_symbol("f25"), None);
        assert_eq!(KeyId::from_symbol("bogus"), None);
    }

    #[test]
    fn test_char_lookup_folds_case() {
        assert_eq!(KeyId::from_char('a'), Some(KeyId::Char('a')));
        assert_eq!(KeyId::from_char('A'), Some(KeyId::Char('a')));
        assert_eq!(KeyId::from_char(';'), Some(KeyId::Char(';')));
        assert_eq!(KeyId::from_char('€'), None);
    }

    #[test]
    fn test_symbol_round_trip() {
        // Every named key formats to a token that resolves back to itself.
        for (name, key) in SYMBOL_TABLE {
            let rendered = key.symbol();
            let inner = rendered.trim_matches(|c| c == '<' || c == '>');
            assert_eq!(
                KeyId::from_symbol(inner),
                Some(*key),
                "token {} did not round-trip",
                name
            );
        }
    }

    #[test]
    fn test_rdev_modifier_folding() {
        assert_eq!(KeyId::from_rdev(rdev::Key::ControlLeft), Some(KeyId::Ctrl));
        assert_eq!(KeyId::from_rdev(rdev::Key::ControlRight), Some(KeyId::Ctrl));
        assert_eq!(KeyId::from_rdev(rdev::Key::ShiftLeft), Some(KeyId::Shift));
        assert_eq!(KeyId::from_rdev(rdev::Key::ShiftRight), Some(KeyId::Shift));
        assert_eq!(KeyId::from_rdev(rdev::Key::AltGr), Some(KeyId::Alt));
        assert_eq!(KeyId::from_rdev(rdev::Key::MetaRight), Some(KeyId::Meta));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_evdev_modifier_folding() {
        use evdev::Key;
        assert_eq!(KeyId::from_evdev(Key::KEY_LEFTCTRL), Some(KeyId::Ctrl));
        assert_eq!(KeyId::from_evdev(Key::KEY_RIGHTCTRL), Some(KeyId::Ctrl));
        assert_eq!(KeyId::from_evdev(Key::KEY_LEFTSHIFT), Some(KeyId::Shift));
        assert_eq!(KeyId::from_evdev(Key::KEY_RIGHTSHIFT), Some(KeyId::Shift));
        assert_eq!(KeyId::from_evdev(Key::KEY_LEFTMETA), Some(KeyId::Meta));
        assert_eq!(KeyId::from_evdev(Key::KEY_RIGHTMETA), Some(KeyId::Meta));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_evdev_ignores_unmapped_keys() {
        assert_eq!(KeyId::from_evdev(evdev::Key::KEY_MUTE), None);
    }
}
