//! Wire packet representation shared by the framer (C2) and panel link (C3).

use crate::crc::crc16;

/// Maximum number of data bytes a single packet may carry.
pub const MAX_DATA_LEN: usize = 22;

/// The four packet kinds multiplexed onto the high two bits of the first
/// wire byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// Host-to-panel command.
    Request,
    /// Panel's reply to a `Request`.
    Response,
    /// Unsolicited panel-to-host notification (keys, fan, temperature).
    Report,
    /// Panel's reply to a `Request` it rejected.
    Error,
}

impl PacketType {
    fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => PacketType::Request,
            0b01 => PacketType::Response,
            0b10 => PacketType::Report,
            0b11 => PacketType::Error,
            _ => unreachable!(),
        }
    }

    fn bits(self) -> u8 {
        match self {
            PacketType::Request => 0b00,
            PacketType::Response => 0b01,
            PacketType::Report => 0b10,
            PacketType::Error => 0b11,
        }
    }
}

/// One atomic unit on the serial wire: a type/command byte, a length-prefixed
/// data payload and a trailing little-endian CRC-16.
#[derive(Debug, Clone)]
pub struct Packet {
    packet_type: PacketType,
    command: u8,
    data: Vec<u8>,
}

impl Packet {
    /// Builds a packet, panicking if `data` exceeds [`MAX_DATA_LEN`] or
    /// `command` doesn't fit in 6 bits. Both are programmer errors at every
    /// call site in this crate, never attacker- or wire-controlled.
    pub fn new(packet_type: PacketType, command: u8, data: &[u8]) -> Self {
        assert!(command <= 0x3F, "command does not fit in 6 bits");
        assert!(data.len() <= MAX_DATA_LEN, "packet data is too large");
        Self {
            packet_type,
            command,
            data: data.to_vec(),
        }
    }

    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    pub fn command(&self) -> u8 {
        self.command
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The leading type/command byte as it appears on the wire.
    fn type_command_byte(&self) -> u8 {
        (self.packet_type.bits() << 6) | self.command
    }

    /// Serializes this packet to wire bytes: `[type|cmd][len][data...][crc_lo][crc_hi]`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.data.len());
        out.push(self.type_command_byte());
        out.push(self.data.len() as u8);
        out.extend_from_slice(&self.data);
        let crc = crc16(&out);
        out.extend_from_slice(&crc);
        out
    }

    /// Parses a packet from a byte slice that is exactly the size of one
    /// frame (`4 + data_len`), trusting the caller to have already located
    /// frame boundaries (see [`crate::framer::Framer`]).
    ///
    /// Returns `None` if the CRC doesn't match.
    pub fn from_frame(frame: &[u8]) -> Option<Self> {
        if frame.len() < 4 {
            return None;
        }
        let data_len = frame[1] as usize;
        if frame.len() != 4 + data_len {
            return None;
        }
        let header_and_data = &frame[..2 + data_len];
        let crc = crc16(header_and_data);
        if crc != frame[2 + data_len..4 + data_len] {
            return None;
        }
        let type_command = frame[0];
        Some(Self {
            packet_type: PacketType::from_bits(type_command >> 6),
            command: type_command & 0x3F,
            data: frame[2..2 + data_len].to_vec(),
        })
    }
}

impl PartialEq for Packet {
    fn eq(&self, other: &Self) -> bool {
        self.packet_type == other.packet_type
            && self.command == other.command
            && self.data == other.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_every_command_and_type() {
        for command in 0u8..64 {
            for packet_type in [
                PacketType::Request,
                PacketType::Response,
                PacketType::Report,
                PacketType::Error,
            ] {
                for len in [0usize, 1, 11, 22] {
                    let data: Vec<u8> = (0..len as u8).map(|i| i.wrapping_mul(7)).collect();
                    let packet = Packet::new(packet_type, command, &data);
                    let bytes = packet.to_bytes();
                    assert_eq!(bytes.len(), 4 + len);
                    let decoded = Packet::from_frame(&bytes).expect("valid frame");
                    assert_eq!(decoded, packet);
                }
            }
        }
    }

    #[test]
    fn corrupted_crc_is_rejected() {
        let packet = Packet::new(PacketType::Request, 0x00, b"Hello World");
        let mut bytes = packet.to_bytes();
        *bytes.last_mut().unwrap() ^= 0xFF;
        assert!(Packet::from_frame(&bytes).is_none());
    }
}
