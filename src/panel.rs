//! Panel API (component C4): a thin typed layer over [`PanelLink::send`].

use thiserror::Error;

use crate::keys::{KeyEvent, KeyMask};
use crate::latin1;
use crate::link::{LinkError, PanelLink};
use crate::packet::MAX_DATA_LEN;

/// Panel geometry. The CFA635 family is fixed at 20x4 characters, 4 LEDs.
pub const WIDTH: usize = 20;
pub const HEIGHT: usize = 4;
pub const LED_COUNT: usize = 4;
pub const USER_FLASH_LEN: usize = 16;

/// Largest number of cells one `write_cells` call can carry: the leading
/// col/row bytes eat into the packet's data budget.
const MAX_WRITE_LEN: usize = MAX_DATA_LEN - 2;

const CMD_PING: u8 = 0x00;
const CMD_VERSION: u8 = 0x01;
const CMD_WRITE_USER_FLASH: u8 = 0x02;
const CMD_READ_USER_FLASH: u8 = 0x03;
const CMD_SAVE_AS_DEFAULT: u8 = 0x04;
const CMD_CLEAR: u8 = 0x06;
const CMD_SET_SPECIAL_CHAR: u8 = 0x09;
const CMD_SET_CURSOR: u8 = 0x0B;
const CMD_SET_CURSOR_STYLE: u8 = 0x0C;
const CMD_SET_CONTRAST: u8 = 0x0D;
const CMD_SET_BACKLIGHT: u8 = 0x0E;
const CMD_SET_KEY_REPORTING: u8 = 0x17;
const CMD_POLL_KEYS: u8 = 0x18;
const CMD_WRITE_CELLS: u8 = 0x1F;
const CMD_WRITE_GPIO: u8 = 0x22;
const CMD_READ_GPIO: u8 = 0x23;

/// GPIO pin pairs `(red, green)` backing each of the four LEDs.
const LED_GPIOS: [(u8, u8); LED_COUNT] = [(12, 11), (10, 9), (8, 7), (6, 5)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorStyle {
    None,
    BlinkingBlock,
    SolidUnderscore,
    BlinkingBlockAndUnderscore,
    BlinkingUnderscore,
}

impl CursorStyle {
    fn code(self) -> u8 {
        match self {
            CursorStyle::None => 0,
            CursorStyle::BlinkingBlock => 1,
            CursorStyle::SolidUnderscore => 2,
            CursorStyle::BlinkingBlockAndUnderscore => 3,
            CursorStyle::BlinkingUnderscore => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPoll {
    pub current: KeyMask,
    pub pressed: KeyMask,
    pub released: KeyMask,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PanelError {
    #[error(transparent)]
    Link(#[from] LinkError),

    #[error("text is not representable in Latin-1: {0:?}")]
    NotLatin1(String),

    #[error("text longer than a single write can carry ({max} cells): got {len}")]
    LineTooWide { max: usize, len: usize },

    #[error("LED index {0} out of range (0..{LED_COUNT})")]
    LedIndexOutOfRange(usize),

    #[error("short response: expected at least {expected} bytes, got {got}")]
    ShortResponse { expected: usize, got: usize },
}

/// Typed operations layered over the raw [`PanelLink::send`] protocol.
pub struct Panel {
    link: PanelLink,
}

impl Panel {
    pub fn open(path: &str) -> Result<Self, PanelError> {
        Ok(Self {
            link: PanelLink::open(path)?,
        })
    }

    pub fn port_name(&self) -> &str {
        self.link.port_name()
    }

    pub fn register_key_handler(&self, handler: impl Fn(KeyEvent) + Send + 'static) {
        self.link.register_key_handler(handler);
    }

    pub fn ping(&self) -> Result<(), PanelError> {
        self.link.send(CMD_PING, &[])?;
        Ok(())
    }

    pub fn version(&self) -> Result<String, PanelError> {
        let data = self.link.send(CMD_VERSION, &[])?;
        Ok(latin1::decode(&data))
    }

    pub fn write_user_flash(&self, blob: &[u8; USER_FLASH_LEN]) -> Result<(), PanelError> {
        self.link.send(CMD_WRITE_USER_FLASH, blob)?;
        Ok(())
    }

    pub fn read_user_flash(&self) -> Result<[u8; USER_FLASH_LEN], PanelError> {
        let data = self.link.send(CMD_READ_USER_FLASH, &[])?;
        if data.len() < USER_FLASH_LEN {
            return Err(PanelError::ShortResponse {
                expected: USER_FLASH_LEN,
                got: data.len(),
            });
        }
        let mut blob = [0u8; USER_FLASH_LEN];
        blob.copy_from_slice(&data[..USER_FLASH_LEN]);
        Ok(blob)
    }

    pub fn save_as_default(&self) -> Result<(), PanelError> {
        self.link.send(CMD_SAVE_AS_DEFAULT, &[])?;
        Ok(())
    }

    pub fn clear(&self) -> Result<(), PanelError> {
        self.link.send(CMD_CLEAR, &[])?;
        Ok(())
    }

    pub fn set_special_char(&self, idx: u8, glyph: &[u8; 8]) -> Result<(), PanelError> {
        let mut data = Vec::with_capacity(9);
        data.push(idx);
        data.extend_from_slice(glyph);
        self.link.send(CMD_SET_SPECIAL_CHAR, &data)?;
        Ok(())
    }

    pub fn set_cursor(&self, col: u8, row: u8) -> Result<(), PanelError> {
        self.link.send(CMD_SET_CURSOR, &[col, row])?;
        Ok(())
    }

    pub fn set_cursor_style(&self, style: CursorStyle) -> Result<(), PanelError> {
        self.link.send(CMD_SET_CURSOR_STYLE, &[style.code()])?;
        Ok(())
    }

    pub fn set_contrast(&self, level: u8) -> Result<(), PanelError> {
        self.link.send(CMD_SET_CONTRAST, &[level])?;
        Ok(())
    }

    pub fn set_backlight(&self, level: u8) -> Result<(), PanelError> {
        self.link.send(CMD_SET_BACKLIGHT, &[level])?;
        Ok(())
    }

    pub fn set_key_reporting(&self, press: KeyMask, release: KeyMask) -> Result<(), PanelError> {
        self.link
            .send(CMD_SET_KEY_REPORTING, &[press.raw(), release.raw()])?;
        Ok(())
    }

    pub fn poll_keys(&self) -> Result<KeyPoll, PanelError> {
        let data = self.link.send(CMD_POLL_KEYS, &[])?;
        if data.len() < 3 {
            return Err(PanelError::ShortResponse {
                expected: 3,
                got: data.len(),
            });
        }
        Ok(KeyPoll {
            current: KeyMask::from_raw(data[0]),
            pressed: KeyMask::from_raw(data[1]),
            released: KeyMask::from_raw(data[2]),
        })
    }

    /// Writes `text` starting at `(col, row)`. `text` must be representable
    /// in Latin-1; the firmware wraps onto the following line if it runs
    /// past the end of the current one, so no per-row width check happens
    /// here (callers that want a hard per-line limit use `Shadow::set_line`).
    pub fn write_cells(&self, col: u8, row: u8, text: &str) -> Result<(), PanelError> {
        let encoded = latin1::encode(text).ok_or_else(|| PanelError::NotLatin1(text.to_owned()))?;
        if encoded.len() > MAX_WRITE_LEN {
            return Err(PanelError::LineTooWide {
                max: MAX_WRITE_LEN,
                len: encoded.len(),
            });
        }
        let mut data = Vec::with_capacity(2 + encoded.len());
        data.push(col);
        data.push(row);
        data.extend_from_slice(&encoded);
        self.link.send(CMD_WRITE_CELLS, &data)?;
        Ok(())
    }

    pub fn write_gpio(&self, idx: u8, value: u8, drive: Option<u8>) -> Result<(), PanelError> {
        match drive {
            Some(drive) => self.link.send(CMD_WRITE_GPIO, &[idx, value, drive])?,
            None => self.link.send(CMD_WRITE_GPIO, &[idx, value])?,
        };
        Ok(())
    }

    pub fn read_gpio(&self, idx: u8) -> Result<Vec<u8>, PanelError> {
        Ok(self.link.send(CMD_READ_GPIO, &[idx])?)
    }

    /// Derived operation: sets LED `idx`'s red/green intensities (0..100)
    /// by writing its two backing GPIO pins.
    pub fn set_led(&self, idx: usize, red: u8, green: u8) -> Result<(), PanelError> {
        let (red_gpio, green_gpio) = *LED_GPIOS
            .get(idx)
            .ok_or(PanelError::LedIndexOutOfRange(idx))?;
        self.write_gpio(red_gpio, red, None)?;
        self.write_gpio(green_gpio, green, None)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_cells_encoding_rejects_non_latin1() {
        // Can't exercise the link without real hardware; this only checks
        // the pure validation helper paths compile the way callers expect.
        assert!(latin1::encode("日本語").is_none());
        assert_eq!(latin1::encode("hello").unwrap(), b"hello");
    }

    #[test]
    fn led_gpio_table_matches_spec() {
        assert_eq!(LED_GPIOS[0], (12, 11));
        assert_eq!(LED_GPIOS[1], (10, 9));
        assert_eq!(LED_GPIOS[2], (8, 7));
        assert_eq!(LED_GPIOS[3], (6, 5));
    }
}
