use crate::error::LoopbackError;

pub const MAX_FRAME_BIT_WIDTH: u8 = 16;

/// Mask with the low `frame_bit_width` bits set, or `None` outside `1..=16`.
pub fn frame_mask(frame_bit_width: u8) -> Option<u16> {
    if !(1..=MAX_FRAME_BIT_WIDTH).contains(&frame_bit_width) {
        return None;
    }
    Some(u16::MAX >> (MAX_FRAME_BIT_WIDTH - frame_bit_width))
}

/// Mask both buffers in place and compare them element by element.
///
/// The scan stops at the first mismatch: only the prefix up to and including
/// that index is masked, everything after it is left untouched.
pub fn compare_masked<const N: usize>(
    outbound: &mut [u8; N],
    inbound: &mut [u8; N],
    frame_bit_width: u8,
) -> Result<(), LoopbackError> {
    let mask = frame_mask(frame_bit_width).ok_or_else(|| {
        LoopbackError::ConfigurationError(format!(
            "frame bit width {frame_bit_width} outside 1..={MAX_FRAME_BIT_WIDTH}"
        ))
    })?;
    // Buffers hold bytes; wider frames keep the whole byte.
    let mask = mask as u8;

    for (index, (out, inb)) in outbound.iter_mut().zip(inbound.iter_mut()).enumerate() {
        *inb &= mask;
        *out &= mask;
        if *inb != *out {
            return Err(LoopbackError::DataMismatch { index });
        }
    }
    Ok(())
}
