use std::iter::FusedIterator;

const START_CODE_4: [u8; 4] = [0x00, 0x00, 0x00, 0x01];
const START_CODE_3: [u8; 3] = [0x00, 0x00, 0x01];

/// Splits an Annex B byte stream into NAL units.
///
/// A unit spans from the end of one start code (`00 00 01` or `00 00 00 01`) to the
/// beginning of the next, or to the end of the buffer. Bytes before the first start code
/// are skipped. Units may be empty when two start codes are adjacent.
///
/// The scanner borrows its input and keeps no state between buffers, so a new one is
/// created for every reassembled PES payload.
///
/// ```
/// use tsgate::codec::h264::AnnexBScanner;
///
/// let stream = [0, 0, 0, 1, 0x67, 0x42, 0, 0, 1, 0x68, 0xCE];
/// let nalus: Vec<&[u8]> = AnnexBScanner::new(&stream).collect();
/// assert_eq!(nalus, vec![&[0x67, 0x42][..], &[0x68, 0xCE][..]]);
/// ```
#[derive(Debug, Clone)]
pub struct AnnexBScanner<'a> {
    data: &'a [u8],
    pos: usize,
    start: Option<usize>,
    finished: bool,
}

impl<'a> AnnexBScanner<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            start: None,
            finished: false,
        }
    }

    /// Length of the start code at `pos`, if any. The 4-byte form wins when both match.
    fn start_code_at(&self, pos: usize) -> Option<usize> {
        let rest = &self.data[pos..];
        if rest.starts_with(&START_CODE_4) {
            Some(START_CODE_4.len())
        } else if rest.starts_with(&START_CODE_3) {
            Some(START_CODE_3.len())
        } else {
            None
        }
    }
}

impl<'a> Iterator for AnnexBScanner<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.data.len() {
            let marker = self.pos;
            match self.start_code_at(marker) {
                Some(len) => {
                    self.pos += len;
                    if let Some(start) = self.start.replace(self.pos) {
                        return Some(&self.data[start..marker]);
                    }
                }
                None => self.pos += 1,
            }
        }

        if self.finished {
            return None;
        }
        self.finished = true;

        match self.start.take() {
            Some(start) if start < self.data.len() => Some(&self.data[start..]),
            _ => None,
        }
    }
}

impl FusedIterator for AnnexBScanner<'_> {}

/// Convenience wrapper collecting every NAL unit of `data`.
pub fn split_nal_units(data: &[u8]) -> Vec<&[u8]> {
    AnnexBScanner::new(data).collect()
}
