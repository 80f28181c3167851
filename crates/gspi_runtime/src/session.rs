use crate::compare::compare_masked;
use crate::error::LoopbackError;

pub const GSPI_BUFFER_SIZE: usize = 1024;

/// Frames wider than one byte occupy two bytes of the buffer.
pub fn division_factor_for(frame_bit_width: u8) -> usize {
    if frame_bit_width > 8 { 2 } else { 1 }
}

/// Working buffers of one loop-back run and the bus parameters they were sized for.
#[derive(Debug, Clone)]
pub struct TransferSession<const N: usize = GSPI_BUFFER_SIZE> {
    pub outbound: [u8; N],
    pub inbound: [u8; N],
    division_factor: usize,
    frame_bit_width: u8,
}

impl<const N: usize> TransferSession<N> {
    pub fn new(frame_bit_width: u8) -> Self {
        Self {
            outbound: [0; N],
            inbound: [0; N],
            division_factor: division_factor_for(frame_bit_width),
            frame_bit_width,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn division_factor(&self) -> usize {
        self.division_factor
    }

    pub fn frame_bit_width(&self) -> u8 {
        self.frame_bit_width
    }

    /// Number of bus words covering the whole buffer.
    pub fn word_count(&self) -> usize {
        N / self.division_factor
    }

    /// Adopt a newly negotiated width. The division factor follows it.
    pub fn renegotiate(&mut self, frame_bit_width: u8) {
        self.frame_bit_width = frame_bit_width;
        self.division_factor = division_factor_for(frame_bit_width);
    }

    /// Track the width the comparator masks with, leaving the word count alone.
    pub fn set_frame_bit_width(&mut self, frame_bit_width: u8) {
        self.frame_bit_width = frame_bit_width;
    }

    /// Fill `outbound` with 1, 2, ..., 255, 0, 1, ...
    pub fn fill_pattern(&mut self) {
        for (i, byte) in self.outbound.iter_mut().enumerate() {
            *byte = (i + 1) as u8;
        }
    }

    pub fn compare(&mut self) -> Result<(), LoopbackError> {
        compare_masked(&mut self.outbound, &mut self.inbound, self.frame_bit_width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_wraps_at_256() {
        let mut session = TransferSession::<1024>::new(8);
        session.fill_pattern();
        assert_eq!(session.outbound[0], 1);
        assert_eq!(session.outbound[254], 255);
        assert_eq!(session.outbound[255], 0);
        assert_eq!(session.outbound[256], 1);
        assert_eq!(session.outbound[1023], 0);
        assert!(session.inbound.iter().all(|&b| b == 0));
    }

    #[test]
    fn word_count_halves_for_wide_frames() {
        let narrow = TransferSession::<1024>::new(8);
        assert_eq!(narrow.division_factor(), 1);
        assert_eq!(narrow.word_count(), 1024);

        let mut session = TransferSession::<1024>::new(8);
        session.renegotiate(16);
        assert_eq!(session.division_factor(), 2);
        assert_eq!(session.word_count(), 512);
    }

    #[test]
    fn width_change_keeps_word_count() {
        let mut session = TransferSession::<64>::new(8);
        session.set_frame_bit_width(12);
        assert_eq!(session.frame_bit_width(), 12);
        assert_eq!(session.word_count(), 64);
    }

    #[test]
    fn default_capacity_matches_buffer_size() {
        let session: TransferSession = TransferSession::new(8);
        assert_eq!(session.capacity(), GSPI_BUFFER_SIZE);
    }
}
