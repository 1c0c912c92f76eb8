
#[cfg(feature = "internal-no-panic")]
use no_panic::no_panic;

use crate::clamp::{clamp, clamp_to_i16};
use crate::Error;

/// Step index adjustments, indexed by the 4-bit encoded value.
pub const INDEX_TABLE: &[i8; 16] = &[
    -1, -1, -1, -1, 2, 4, 6, 8,
    -1, -1, -1, -1, 2, 4, 6, 8
];

/// Quantizer step sizes, indexed by the step index.
pub const STEP_TABLE: &[u16; 89] = &[
    7, 8, 9, 10, 11, 12, 13, 14, 16, 17,
    19, 21, 23, 25, 28, 31, 34, 37, 41, 45,
    50, 55, 60, 66, 73, 80, 88, 97, 107, 118,
    130, 143, 157, 173, 190, 209, 230, 253, 279, 307,
    337, 371, 408, 449, 494, 544, 598, 658, 724, 796,
    876, 963, 1060, 1166, 1282, 1411, 1552, 1707, 1878, 2066,
    2272, 2499, 2749, 3024, 3327, 3660, 4026, 4428, 4871, 5358,
    5894, 6484, 7132, 7845, 8630, 9493, 10442, 11487, 12635, 13899,
    15289, 16818, 18500, 20350, 22385, 24623, 27086, 29794, 32767
];

/// The largest valid step index.
pub const MAX_STEP_INDEX: u8 = 88;

/// Predictor state for the ADP4 encoder and decoder.
///
/// A new stream starts from [`Adp4State::new()`]. To continue a stream, pass the state
/// from the previous call to the next call. The state is never reset implicitly.
///
/// The step size isn't stored: it is always `STEP_TABLE[step_index]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adp4State {
    pub predicted_sample: i16,
    pub step_index: u8,
}

impl Adp4State {
    /// Creates a state for the start of a stream: predicted sample 0, step index 0 (step size 7).
    pub fn new() -> Adp4State {
        Adp4State {
            predicted_sample: 0,
            step_index: 0,
        }
    }

    /// Returns the current quantizer step size.
    ///
    /// A step index above 88 is treated as 88.
    #[cfg_attr(feature = "internal-no-panic", no_panic)]
    #[inline(always)]
    pub fn step_size(&self) -> u16 {
        STEP_TABLE[usize::from(self.step_index.min(MAX_STEP_INDEX))]
    }
}

impl Default for Adp4State {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the number of bytes needed to hold `sample_count` ADP4 samples.
pub fn adp4_encoded_len(sample_count: usize) -> usize {
    sample_count.div_ceil(2)
}

/// Computes the signed predictor change for `nibble`: `(magnitude + 0.5) * step / 4`
/// using shifts so that encoder and decoder round identically.
#[cfg_attr(feature = "internal-no-panic", no_panic)]
#[inline(always)]
fn reconstruct_difference(step_size: i32, nibble: u8) -> i32 {
    let mut diff = step_size >> 3;
    if (nibble & 4) != 0 { diff += step_size; }
    if (nibble & 2) != 0 { diff += step_size >> 1; }
    if (nibble & 1) != 0 { diff += step_size >> 2; }
    if (nibble & 8) != 0 {
        -diff
    } else {
        diff
    }
}

/// Applies a 4-bit value to the state. Both directions go through here.
#[cfg_attr(feature = "internal-no-panic", no_panic)]
#[inline(always)]
fn apply_nibble(nibble: u8, state: &mut Adp4State) {
    let step_size = i32::from(state.step_size());
    let predicted = i64::from(state.predicted_sample)
        + i64::from(reconstruct_difference(step_size, nibble));
    state.predicted_sample = clamp_to_i16(predicted);

    let step_index = i64::from(state.step_index)
        + i64::from(INDEX_TABLE[usize::from(nibble & 0x0f)]);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // clamped to 0..=88
    {
    state.step_index = clamp(step_index, 0, i64::from(MAX_STEP_INDEX)) as u8;
    }
}

/// Decodes a 4-bit ADP4 value to a linear 16-bit signed integer sample value.
///
/// Only the lowest 4 bits of `encoded_nibble` are used and the top-most bits are ignored.
/// This method updates `state` with new values.
#[cfg_attr(feature = "internal-no-panic", no_panic)]
#[inline(always)]
pub fn decode_adp4_nibble(encoded_nibble: u8, state: &mut Adp4State) -> i16 {
    state.step_index = state.step_index.min(MAX_STEP_INDEX);
    apply_nibble(encoded_nibble & 0x0f, state);
    state.predicted_sample
}

/// Encodes a linear 16-bit signed integer sample value to a 4-bit ADP4 value.
///
/// The state is updated from the decoded value of the returned nibble, not from
/// `sample_value`, so it stays identical to the decoder's state.
#[cfg_attr(feature = "internal-no-panic", no_panic)]
#[inline(always)]
pub fn encode_adp4_sample(sample_value: i16, state: &mut Adp4State) -> u8 {
    state.step_index = state.step_index.min(MAX_STEP_INDEX);

    let diff = clamp(i64::from(sample_value) - i64::from(state.predicted_sample),
        i64::from(i16::MIN), i64::from(i16::MAX));
    let (mut nibble, mut remainder) = if diff < 0 {
        (8u8, -diff)
    } else {
        (0u8, diff)
    };
    // 3-bit magnitude by repeated subtraction: step, step/2, step/4
    let mut comparator = i64::from(state.step_size());
    let mut mask = 4u8;
    while mask != 0 {
        if remainder >= comparator {
            nibble |= mask;
            remainder -= comparator;
        }
        comparator >>= 1;
        mask >>= 1;
    }

    apply_nibble(nibble, state);
    nibble
}

/// Decodes ADP4 bytes to 16-bit signed integer samples.
///
/// Each byte holds two samples, the high nibble is the earlier sample.
/// `out_samples.len()` samples are decoded, so `buf` must contain at least
/// `ceil(out_samples.len() / 2)` bytes. When the sample count is odd, the low nibble
/// of the last used byte is ignored.
///
/// An error is returned if `buf` is too short. If an error is returned,
/// `out_samples` and `state` are left unmodified.
pub fn decode_adp4(buf: &[u8], state: &mut Adp4State, out_samples: &mut [i16])
    -> Result<(), Error> {

    let needed = adp4_encoded_len(out_samples.len());
    if buf.len() < needed {
        return Err(Error::InvalidBufferSize { needed, actual: buf.len() });
    }
    for (pair, b) in out_samples.chunks_mut(2).zip(buf) {
        for (out, nibble) in pair.iter_mut().zip([*b >> 4, *b & 0x0f]) {
            *out = decode_adp4_nibble(nibble, state);
        }
    }
    log::trace!("decoded {} ADP4 samples, state {:?}", out_samples.len(), state);
    Ok(())
}

/// Encodes 16-bit signed integer samples to ADP4 bytes.
///
/// The whole of `samples` is treated as complete: if the sample count is odd, the last
/// byte is written with the final sample in its high nibble and zero in its low nibble.
/// Use [`Adp4Encoder`] when the input arrives in chunks of arbitrary length.
///
/// `out_buf` must be at least `ceil(samples.len() / 2)` bytes. Bytes after that are not
/// touched, so the caller may pad the buffer (e.g. to a 4-byte boundary) beforehand.
/// Returns the number of bytes written.
///
/// An error is returned if `out_buf` is too short. If an error is returned,
/// `out_buf` and `state` are left unmodified.
pub fn encode_adp4(samples: &[i16], state: &mut Adp4State, out_buf: &mut [u8])
    -> Result<usize, Error> {

    let needed = adp4_encoded_len(samples.len());
    if out_buf.len() < needed {
        return Err(Error::InvalidBufferSize { needed, actual: out_buf.len() });
    }
    for (pair, out_b) in samples.chunks(2).zip(out_buf.iter_mut()) {
        let mut packed = 0u8;
        for (sample, shift) in pair.iter().zip([4, 0]) {
            packed |= encode_adp4_sample(*sample, state) << shift;
        }
        *out_b = packed;
    }
    log::trace!("encoded {} ADP4 samples to {} bytes, state {:?}", samples.len(), needed, state);
    Ok(needed)
}

/// Streaming ADP4 encoder.
///
/// Keeps the predictor state and a pending half byte between calls, so feeding the
/// input in chunks of any length gives the same bytes as one [`encode_adp4()`] call
/// over the whole input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Adp4Encoder {
    state: Adp4State,
    pending: Option<u8>,
}

impl Adp4Encoder {
    /// Creates an encoder for the start of a stream.
    pub fn new() -> Adp4Encoder {
        Self::with_state(Adp4State::new())
    }

    /// Creates an encoder which continues from `state`.
    pub fn with_state(state: Adp4State) -> Adp4Encoder {
        Adp4Encoder {
            state,
            pending: None,
        }
    }

    /// Current predictor state.
    pub fn state(&self) -> &Adp4State {
        &self.state
    }

    /// Returns the number of bytes [`Adp4Encoder::push()`] writes for `sample_count` samples.
    pub fn pushed_len(&self, sample_count: usize) -> usize {
        (sample_count + usize::from(self.pending.is_some())) / 2
    }

    /// Encodes `samples` and writes every completed byte to `out_buf`.
    ///
    /// Returns the number of bytes written. A trailing odd sample is held back until the
    /// next call or [`Adp4Encoder::finish()`].
    ///
    /// An error is returned if `out_buf` is shorter than
    /// [`pushed_len(samples.len())`](Adp4Encoder::pushed_len).
    pub fn push(&mut self, samples: &[i16], out_buf: &mut [u8]) -> Result<usize, Error> {
        let needed = self.pushed_len(samples.len());
        if out_buf.len() < needed {
            return Err(Error::InvalidBufferSize { needed, actual: out_buf.len() });
        }
        let mut out_iter = out_buf.iter_mut();
        for sample in samples {
            let nibble = encode_adp4_sample(*sample, &mut self.state);
            match self.pending.take() {
                None => self.pending = Some(nibble << 4),
                Some(high) => {
                    if let Some(out_b) = out_iter.next() {
                        *out_b = high | nibble;
                    }
                }
            }
        }
        Ok(needed)
    }

    /// Writes the held back half byte, if any, and returns the number of bytes written
    /// (0 or 1). The encoder can be used for more samples afterwards.
    pub fn finish(&mut self, out_buf: &mut [u8]) -> Result<usize, Error> {
        let Some(high) = self.pending else {
            return Ok(0);
        };
        let Some(out_b) = out_buf.first_mut() else {
            return Err(Error::InvalidBufferSize { needed: 1, actual: 0 });
        };
        *out_b = high;
        self.pending = None;
        Ok(1)
    }
}
