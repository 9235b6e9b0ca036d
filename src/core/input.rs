//! Key press model and legacy terminal sequence decoding.

const MOD_SHIFT: u8 = 1;
const MOD_ALT: u8 = 2;
const MOD_CTRL: u8 = 4;

const ESC: char = '\x1b';

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    PageUp,
    PageDown,
    Home,
    End,
    Esc,
    Enter,
    Insert,
    Tab,
    Backspace,
    Space,
    /// Anything else; printable input carries its character on the [`KeyPress`].
    Unknown,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub control: bool,
    pub alt: bool,
    pub shift: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        control: false,
        alt: false,
        shift: false,
    };

    pub const CONTROL: Self = Self {
        control: true,
        alt: false,
        shift: false,
    };

    pub const ALT: Self = Self {
        control: false,
        alt: true,
        shift: false,
    };

    pub const SHIFT: Self = Self {
        control: false,
        alt: false,
        shift: true,
    };

    /// Decodes an xterm modifier parameter (`1 + bitmask`).
    fn from_xterm_param(param: u32) -> Self {
        let bits = param.saturating_sub(1).min(u8::MAX as u32) as u8;
        Self {
            control: bits & MOD_CTRL != 0,
            alt: bits & MOD_ALT != 0,
            shift: bits & MOD_SHIFT != 0,
        }
    }
}

/// One key event as delivered by the terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KeyPress {
    pub key: Key,
    pub modifiers: Modifiers,
    pub character: Option<char>,
}

impl KeyPress {
    pub const fn new(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers::NONE,
            character: None,
        }
    }

    /// Printable character input.
    pub const fn character(ch: char) -> Self {
        Self {
            key: Key::Unknown,
            modifiers: Modifiers::NONE,
            character: Some(ch),
        }
    }

    pub const fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub const fn with_character(mut self, ch: char) -> Self {
        self.character = Some(ch);
        self
    }
}

impl From<Key> for KeyPress {
    fn from(key: Key) -> Self {
        Self::new(key)
    }
}

/// Decodes one complete input sequence (as split by the key decoder) into a key press.
///
/// Unrecognized sequences map to [`Key::Unknown`] without a character.
pub fn parse_key_sequence(sequence: &str) -> KeyPress {
    let mut chars = sequence.chars();
    let Some(first) = chars.next() else {
        return KeyPress::new(Key::Unknown);
    };
    let rest = chars.as_str();

    if first == ESC {
        return parse_escape(rest);
    }
    if rest.is_empty() {
        return parse_single(first);
    }
    KeyPress::new(Key::Unknown)
}

fn parse_single(ch: char) -> KeyPress {
    match ch {
        '\r' | '\n' => KeyPress::new(Key::Enter),
        '\t' => KeyPress::new(Key::Tab),
        ' ' => KeyPress::new(Key::Space).with_character(' '),
        '\x7f' | '\x08' => KeyPress::new(Key::Backspace),
        '\x00' => KeyPress::new(Key::Space).with_modifiers(Modifiers::CONTROL),
        '\x01'..='\x1a' => {
            let letter = (b'a' + (ch as u8 - 1)) as char;
            KeyPress::character(letter).with_modifiers(Modifiers::CONTROL)
        }
        ch if ch.is_control() => KeyPress::new(Key::Unknown),
        ch => KeyPress::character(ch),
    }
}

fn parse_escape(rest: &str) -> KeyPress {
    if rest.is_empty() {
        return KeyPress::new(Key::Esc);
    }
    if let Some(csi) = rest.strip_prefix('[') {
        return parse_csi(csi);
    }
    if let Some(ss3) = rest.strip_prefix('O') {
        return parse_ss3(ss3);
    }

    let mut chars = rest.chars();
    match (chars.next(), chars.next()) {
        (Some(ESC), None) => KeyPress::new(Key::Esc).with_modifiers(Modifiers::ALT),
        (Some(ch), None) => {
            let mut press = parse_single(ch);
            press.modifiers.alt = true;
            press
        }
        _ => KeyPress::new(Key::Unknown),
    }
}

fn parse_ss3(body: &str) -> KeyPress {
    let key = match body {
        "A" => Key::ArrowUp,
        "B" => Key::ArrowDown,
        "C" => Key::ArrowRight,
        "D" => Key::ArrowLeft,
        "H" => Key::Home,
        "F" => Key::End,
        _ => Key::Unknown,
    };
    KeyPress::new(key)
}

fn parse_csi(body: &str) -> KeyPress {
    if body == "Z" {
        return KeyPress::new(Key::Tab).with_modifiers(Modifiers::SHIFT);
    }

    let Some(final_byte) = body.chars().last() else {
        return KeyPress::new(Key::Unknown);
    };
    let params: Vec<u32> = body[..body.len() - final_byte.len_utf8()]
        .split(';')
        .map(|param| param.parse().unwrap_or(0))
        .collect();
    let modifiers = params
        .get(1)
        .copied()
        .map(Modifiers::from_xterm_param)
        .unwrap_or_default();

    let key = match final_byte {
        'A' => Key::ArrowUp,
        'B' => Key::ArrowDown,
        'C' => Key::ArrowRight,
        'D' => Key::ArrowLeft,
        'H' => Key::Home,
        'F' => Key::End,
        '~' => match params.first().copied().unwrap_or(0) {
            1 | 7 => Key::Home,
            2 => Key::Insert,
            4 | 8 => Key::End,
            5 => Key::PageUp,
            6 => Key::PageDown,
            _ => Key::Unknown,
        },
        _ => Key::Unknown,
    };
    KeyPress::new(key).with_modifiers(modifiers)
}
