//! BLE transport framing: APDUs are cut into MTU-sized frames tagged 0x05
//! with a running sequence number; the first frame carries the total length.

use thiserror::Error;

pub const TAG_APDU: u8 = 0x05;
const FIRST_HEADER: usize = 5;
const NEXT_HEADER: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    #[error("mtu {0} too small for framing")]
    MtuTooSmall(usize),
    #[error("apdu of {0} bytes exceeds frame length field")]
    TooLong(usize),
    #[error("unexpected frame tag {0:#04x}")]
    BadTag(u8),
    #[error("frame out of sequence: expected {expected}, got {got}")]
    OutOfSequence { expected: u16, got: u16 },
    #[error("truncated frame")]
    Truncated,
}

pub fn frame_apdu(apdu: &[u8], mtu: usize) -> Result<Vec<Vec<u8>>, FramingError> {
    if mtu <= FIRST_HEADER {
        return Err(FramingError::MtuTooSmall(mtu));
    }
    let total = u16::try_from(apdu.len()).map_err(|_| FramingError::TooLong(apdu.len()))?;

    let mut frames = Vec::new();
    let mut rest = apdu;
    let mut seq: u16 = 0;
    loop {
        let mut frame = vec![TAG_APDU];
        frame.extend_from_slice(&seq.to_be_bytes());
        if seq == 0 {
            frame.extend_from_slice(&total.to_be_bytes());
        }
        let room = mtu - frame.len();
        let take = room.min(rest.len());
        frame.extend_from_slice(&rest[..take]);
        rest = &rest[take..];
        frames.push(frame);
        if rest.is_empty() {
            break;
        }
        seq = seq.wrapping_add(1);
    }
    Ok(frames)
}

/// Reassembles one response APDU from inbound frames.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    expected_len: Option<usize>,
    next_seq: u16,
    buf: Vec<u8>,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: &[u8]) -> Result<Option<Vec<u8>>, FramingError> {
        if frame.len() < NEXT_HEADER {
            return Err(FramingError::Truncated);
        }
        if frame[0] != TAG_APDU {
            return Err(FramingError::BadTag(frame[0]));
        }
        let seq = u16::from_be_bytes([frame[1], frame[2]]);
        if seq != self.next_seq {
            return Err(FramingError::OutOfSequence {
                expected: self.next_seq,
                got: seq,
            });
        }
        let body = if seq == 0 {
            if frame.len() < FIRST_HEADER {
                return Err(FramingError::Truncated);
            }
            self.expected_len = Some(usize::from(u16::from_be_bytes([frame[3], frame[4]])));
            &frame[FIRST_HEADER..]
        } else {
            &frame[NEXT_HEADER..]
        };
        self.buf.extend_from_slice(body);
        self.next_seq = self.next_seq.wrapping_add(1);

        match self.expected_len {
            Some(len) if self.buf.len() >= len => {
                let mut out = std::mem::take(&mut self.buf);
                out.truncate(len);
                self.expected_len = None;
                self.next_seq = 0;
                Ok(Some(out))
            }
            _ => Ok(None),
        }
    }
}
