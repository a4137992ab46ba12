//! Frame layouts
//!
//! ```text
//! single       0L dd dd dd dd dd dd dd     L = 1..7
//! first        1H LL dd dd dd dd dd dd     length = H<<8 | LL, 8..4095
//! consecutive  2N dd dd dd dd dd dd dd     N = 1..15, 0, 1, ...
//! flow control 3S BS ST pp pp pp pp pp     S = 0 continue, 1 wait, 2 overflow
//! ```
//!
//! Every frame goes out as a full 8-byte frame padded with the configured
//! filler.

use crate::transport::MAX_FRAME_DATA;

use super::flow::FlowStatus;

/// Largest logical message the 12-bit length field can describe
pub const MAX_MESSAGE_LEN: usize = 0x0FFF;
/// Payload carried by a single frame
pub const SINGLE_FRAME_DATA: usize = 7;
/// Payload carried by a first frame
pub const FIRST_FRAME_DATA: usize = 6;
/// Payload carried by a consecutive frame
pub const CONSECUTIVE_FRAME_DATA: usize = 7;

/// Frame type from the upper nibble of the first byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Single,
    First,
    Consecutive,
    FlowControl,
}

impl FrameKind {
    pub fn from_pci(pci: u8) -> Option<Self> {
        match pci >> 4 {
            0x0 => Some(FrameKind::Single),
            0x1 => Some(FrameKind::First),
            0x2 => Some(FrameKind::Consecutive),
            0x3 => Some(FrameKind::FlowControl),
            _ => None,
        }
    }
}

/// Consecutive-frame sequence numbers: 1..=15, then 0, 1, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceCounter {
    next: u8,
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceCounter {
    /// Counter positioned at the first consecutive frame
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Sequence number the next frame must carry
    pub fn peek(&self) -> u8 {
        self.next
    }

    /// Return the current number and step to the next one
    pub fn advance(&mut self) -> u8 {
        let current = self.next;
        self.next = (self.next + 1) & 0x0F;
        current
    }
}

fn padded(padding: u8) -> [u8; MAX_FRAME_DATA] {
    [padding; MAX_FRAME_DATA]
}

/// Single frame for a payload of 1..=7 bytes
pub fn single(payload: &[u8], padding: u8) -> [u8; MAX_FRAME_DATA] {
    debug_assert!(!payload.is_empty() && payload.len() <= SINGLE_FRAME_DATA);
    let mut frame = padded(padding);
    frame[0] = payload.len() as u8;
    frame[1..=payload.len()].copy_from_slice(payload);
    frame
}

/// First frame announcing `total_len`, carrying the first 6 payload bytes
pub fn first(total_len: usize, head: &[u8], padding: u8) -> [u8; MAX_FRAME_DATA] {
    debug_assert!(total_len <= MAX_MESSAGE_LEN && head.len() <= FIRST_FRAME_DATA);
    let mut frame = padded(padding);
    frame[0] = 0x10 | ((total_len >> 8) as u8 & 0x0F);
    frame[1] = (total_len & 0xFF) as u8;
    frame[2..2 + head.len()].copy_from_slice(head);
    frame
}

/// Consecutive frame with sequence number `seq` (low nibble)
pub fn consecutive(seq: u8, chunk: &[u8], padding: u8) -> [u8; MAX_FRAME_DATA] {
    debug_assert!(chunk.len() <= CONSECUTIVE_FRAME_DATA);
    let mut frame = padded(padding);
    frame[0] = 0x20 | (seq & 0x0F);
    frame[1..=chunk.len()].copy_from_slice(chunk);
    frame
}

/// Flow-control frame
pub fn flow_control(
    status: FlowStatus,
    block_size: u8,
    separation_time: u8,
    padding: u8,
) -> [u8; MAX_FRAME_DATA] {
    let mut frame = padded(padding);
    frame[0] = 0x30 | status as u8;
    frame[1] = block_size;
    frame[2] = separation_time;
    frame
}

/// Split a whole message into the frames a sender would put on the bus
///
/// Flow control is not modelled; this is the frame sequence seen after a
/// "continue, block size 0" reply.
pub fn segment(payload: &[u8], padding: u8) -> Vec<[u8; MAX_FRAME_DATA]> {
    if payload.is_empty() || payload.len() > MAX_MESSAGE_LEN {
        return Vec::new();
    }
    if payload.len() <= SINGLE_FRAME_DATA {
        return vec![single(payload, padding)];
    }

    let (head, rest) = payload.split_at(FIRST_FRAME_DATA);
    let mut frames = vec![first(payload.len(), head, padding)];
    let mut seq = SequenceCounter::new();
    for chunk in rest.chunks(CONSECUTIVE_FRAME_DATA) {
        frames.push(consecutive(seq.advance(), chunk, padding));
    }
    frames
}

/// `03 7F <sid> 78`: the target needs more time
pub fn is_response_pending(data: &[u8]) -> bool {
    data.len() >= 4 && data[0] == 0x03 && data[1] == 0x7F && data[3] == 0x78
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sequence_wraps_from_fifteen_to_zero() {
        let mut seq = SequenceCounter::new();
        let numbers: Vec<u8> = (0..18).map(|_| seq.advance()).collect();
        assert_eq!(
            numbers,
            vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 0, 1, 2]
        );
    }

    #[test]
    fn single_frame_is_padded() {
        assert_eq!(
            single(&[0x1A, 0x90], 0xAA),
            [0x02, 0x1A, 0x90, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA]
        );
    }

    #[test]
    fn first_frame_carries_twelve_bit_length() {
        let frame = first(0x0FFF, &[1, 2, 3, 4, 5, 6], 0);
        assert_eq!(frame, [0x1F, 0xFF, 1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn segment_twenty_bytes() {
        let payload: Vec<u8> = (1..=20).collect();
        let frames = segment(&payload, 0x00);
        assert_eq!(
            frames,
            vec![
                [0x10, 0x14, 1, 2, 3, 4, 5, 6],
                [0x21, 7, 8, 9, 10, 11, 12, 13],
                [0x22, 14, 15, 16, 17, 18, 19, 20],
            ]
        );
    }

    #[test]
    fn segment_rejects_out_of_range_lengths() {
        assert!(segment(&[], 0).is_empty());
        assert!(segment(&vec![0u8; MAX_MESSAGE_LEN + 1], 0).is_empty());
        assert_eq!(segment(&vec![0u8; MAX_MESSAGE_LEN], 0).len(), 586);
    }

    #[test]
    fn response_pending_pattern() {
        assert!(is_response_pending(&[0x03, 0x7F, 0x34, 0x78, 0, 0, 0, 0]));
        assert!(!is_response_pending(&[0x03, 0x7F, 0x34, 0x31]));
        assert!(!is_response_pending(&[0x02, 0x7F, 0x34]));
    }

    #[test]
    fn frame_kind_from_pci() {
        assert_eq!(FrameKind::from_pci(0x07), Some(FrameKind::Single));
        assert_eq!(FrameKind::from_pci(0x1F), Some(FrameKind::First));
        assert_eq!(FrameKind::from_pci(0x20), Some(FrameKind::Consecutive));
        assert_eq!(FrameKind::from_pci(0x30), Some(FrameKind::FlowControl));
        assert_eq!(FrameKind::from_pci(0x40), None);
    }
}
