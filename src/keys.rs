//! Key identities, the six-bit [`KeyMask`] set type, and the fixed table
//! that translates a `REPORT_KEY` payload byte into a [`KeyEvent`].

/// One of the six physical keys on a CFA635 panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Up,
    Enter,
    Cancel,
    Left,
    Right,
    Down,
}

impl Key {
    const ALL: [Key; 6] = [
        Key::Up,
        Key::Enter,
        Key::Cancel,
        Key::Left,
        Key::Right,
        Key::Down,
    ];

    fn bit(self) -> u8 {
        match self {
            Key::Up => 0x01,
            Key::Enter => 0x02,
            Key::Cancel => 0x04,
            Key::Left => 0x08,
            Key::Right => 0x10,
            Key::Down => 0x20,
        }
    }
}

/// Whether a key event is the start or the end of a keypress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTransition {
    Pressed,
    Released,
}

/// A single unsolicited key report from the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub transition: KeyTransition,
}

/// Decodes a `REPORT_KEY` (command 0x00) payload byte into a [`KeyEvent`].
///
/// The panel encodes this as a single byte 0..12: 0 is invalid (no event),
/// 1..6 are presses of UP/DOWN/LEFT/RIGHT/ENTER/CANCEL in that order, and
/// 7..12 are the corresponding releases.
pub fn decode_key_report(byte: u8) -> Option<KeyEvent> {
    const TABLE: [Option<(Key, KeyTransition)>; 13] = [
        None,
        Some((Key::Up, KeyTransition::Pressed)),
        Some((Key::Down, KeyTransition::Pressed)),
        Some((Key::Left, KeyTransition::Pressed)),
        Some((Key::Right, KeyTransition::Pressed)),
        Some((Key::Enter, KeyTransition::Pressed)),
        Some((Key::Cancel, KeyTransition::Pressed)),
        Some((Key::Up, KeyTransition::Released)),
        Some((Key::Down, KeyTransition::Released)),
        Some((Key::Left, KeyTransition::Released)),
        Some((Key::Right, KeyTransition::Released)),
        Some((Key::Enter, KeyTransition::Released)),
        Some((Key::Cancel, KeyTransition::Released)),
    ];
    TABLE
        .get(byte as usize)
        .copied()
        .flatten()
        .map(|(key, transition)| KeyEvent { key, transition })
}

/// A six-bit set over [`Key`], as used by `set_key_reporting` and the
/// `poll_keys` result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyMask(u8);

impl KeyMask {
    pub const NONE: KeyMask = KeyMask(0x00);
    pub const ALL: KeyMask = KeyMask(0x3F);

    pub fn from_raw(raw: u8) -> Self {
        KeyMask(raw & 0x3F)
    }

    pub fn raw(self) -> u8 {
        self.0
    }

    pub fn has(self, key: Key) -> bool {
        self.0 & key.bit() != 0
    }

    pub fn add(self, key: Key) -> Self {
        KeyMask(self.0 | key.bit())
    }

    pub fn remove(self, key: Key) -> Self {
        KeyMask(self.0 & !key.bit())
    }

    /// Iterates the keys currently set in this mask.
    pub fn iter(self) -> impl Iterator<Item = Key> {
        Key::ALL.into_iter().filter(move |&key| self.has(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels() {
        assert_eq!(KeyMask::NONE.raw(), 0x00);
        assert_eq!(KeyMask::ALL.raw(), 0x3F);
    }

    #[test]
    fn add_then_has_and_remove_then_not_has() {
        for key in Key::ALL {
            let mask = KeyMask::NONE.add(key);
            assert!(mask.has(key));
            let mask = mask.remove(key);
            assert!(!mask.has(key));
        }
    }

    #[test]
    fn add_is_idempotent_and_does_not_disturb_other_bits() {
        let mask = KeyMask::NONE.add(Key::Up).add(Key::Down).add(Key::Up);
        assert!(mask.has(Key::Up));
        assert!(mask.has(Key::Down));
        assert!(!mask.has(Key::Left));
        assert_eq!(mask.raw(), Key::Up.bit() | Key::Down.bit());
    }

    #[test]
    fn decode_table_matches_spec() {
        assert_eq!(decode_key_report(0), None);
        assert_eq!(
            decode_key_report(1),
            Some(KeyEvent {
                key: Key::Up,
                transition: KeyTransition::Pressed
            })
        );
        assert_eq!(
            decode_key_report(2),
            Some(KeyEvent {
                key: Key::Down,
                transition: KeyTransition::Pressed
            })
        );
        assert_eq!(
            decode_key_report(7),
            Some(KeyEvent {
                key: Key::Up,
                transition: KeyTransition::Released
            })
        );
        assert_eq!(
            decode_key_report(12),
            Some(KeyEvent {
                key: Key::Cancel,
                transition: KeyTransition::Released
            })
        );
        assert_eq!(decode_key_report(13), None);
    }
}
