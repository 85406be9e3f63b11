//! Packet framer (component C2).
//!
//! Consumes an append-only byte buffer fed by the panel link's reader task
//! and yields complete, CRC-verified packets, resynchronising past garbage
//! bytes (dropped bytes, a reconnect mid-frame, a corrupted length byte)
//! one byte at a time.

use crate::packet::{Packet, MAX_DATA_LEN};

/// Buffers bytes read from the wire and extracts complete packets from them.
#[derive(Debug, Default)]
pub struct Framer {
    buffer: Vec<u8>,
}

impl Framer {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Appends newly-read bytes to the internal buffer.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Attempts to extract one packet from the buffer, resynchronising past
    /// any garbage bytes. Returns `None` if there isn't a full frame
    /// buffered yet; call again after more bytes arrive, or repeatedly to
    /// drain several queued frames (it only ever returns at most one packet
    /// per call).
    pub fn next_packet(&mut self) -> Option<Packet> {
        loop {
            if self.buffer.len() < 4 {
                return None;
            }

            let data_len = self.buffer[1] as usize;
            if data_len > MAX_DATA_LEN {
                log::debug!("framer resync: implausible data_len {data_len}, dropping a byte");
                self.buffer.remove(0);
                continue;
            }

            let frame_len = 4 + data_len;
            if self.buffer.len() < frame_len {
                return None;
            }

            match Packet::from_frame(&self.buffer[..frame_len]) {
                Some(packet) => {
                    self.buffer.drain(..frame_len);
                    return Some(packet);
                }
                None => {
                    log::debug!("framer resync: CRC mismatch, dropping a byte");
                    self.buffer.remove(0);
                    continue;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PacketType;

    #[test]
    fn empty_buffer_yields_nothing() {
        let mut framer = Framer::new();
        assert!(framer.next_packet().is_none());
    }

    #[test]
    fn partial_frame_yields_nothing_until_complete() {
        let packet = Packet::new(PacketType::Request, 0x00, b"hi");
        let bytes = packet.to_bytes();
        let mut framer = Framer::new();
        framer.push_bytes(&bytes[..bytes.len() - 1]);
        assert!(framer.next_packet().is_none());
        framer.push_bytes(&bytes[bytes.len() - 1..]);
        assert_eq!(framer.next_packet(), Some(packet));
    }

    #[test]
    fn resyncs_past_arbitrary_garbage_prefix() {
        for garbage_len in 0..40 {
            let packet = Packet::new(PacketType::Response, 0x1F, b"FoxDenHome");
            let mut bytes: Vec<u8> = (0..garbage_len as u8).map(|i| i.wrapping_mul(31)).collect();
            bytes.extend_from_slice(&packet.to_bytes());

            let mut framer = Framer::new();
            framer.push_bytes(&bytes);
            assert_eq!(
                framer.next_packet(),
                Some(packet),
                "garbage_len={garbage_len}"
            );
        }
    }

    #[test]
    fn trailing_bytes_remain_for_next_call() {
        let a = Packet::new(PacketType::Request, 0x00, b"a");
        let b = Packet::new(PacketType::Request, 0x01, b"bb");
        let mut bytes = a.to_bytes();
        bytes.extend_from_slice(&b.to_bytes());

        let mut framer = Framer::new();
        framer.push_bytes(&bytes);
        assert_eq!(framer.next_packet(), Some(a));
        assert_eq!(framer.next_packet(), Some(b));
        assert_eq!(framer.next_packet(), None);
    }

    #[test]
    fn resyncs_past_corrupted_length_byte() {
        let packet = Packet::new(PacketType::Request, 0x00, b"ok");
        let mut bytes = vec![0x00u8, 0xFF]; // implausible data_len
        bytes.extend_from_slice(&packet.to_bytes());

        let mut framer = Framer::new();
        framer.push_bytes(&bytes);
        assert_eq!(framer.next_packet(), Some(packet));
    }
}
