//!
//! This crate contains the audio codecs of the 3DO platform:
//!  - ADP4, 4-bit [IMA/DVI ADPCM](https://en.wikipedia.org/wiki/Interactive_Multimedia_Association)
//!    with two samples per byte, high nibble first
//!  - SDX2, 8-bit square-law DPCM with an exact mode and a delta mode per byte
//!
//! All functions work on caller-provided buffers and an explicit state value, so the crate
//! doesn't allocate. A stream can be processed in one call or in chunks by passing the same
//! state to each call.
//!
//! ```
//! use tdo_audio_codecs::{decode_adp4, encode_adp4, adp4_encoded_len, Adp4State};
//!
//! let samples = [0i16, 1000, 2000, 3000, 2000];
//! let mut encoded = [0u8; 3];
//! assert_eq!(adp4_encoded_len(samples.len()), 3);
//! encode_adp4(&samples, &mut Adp4State::new(), &mut encoded)?;
//!
//! let mut decoded = [0i16; 5];
//! decode_adp4(&encoded, &mut Adp4State::new(), &mut decoded)?;
//! # Ok::<(), tdo_audio_codecs::Error>(())
//! ```
//!

#![no_std]

#![forbid(
    unsafe_code,
    clippy::panic,
    clippy::exit,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::unimplemented,
    clippy::todo,
    clippy::unreachable,
)]
#![deny(
    clippy::cast_ptr_alignment,
    clippy::char_lit_as_u8,
    clippy::unnecessary_cast,
    clippy::cast_lossless,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::checked_conversions,
)]
#![allow(clippy::manual_range_contains)]

mod clamp;
pub use clamp::{clamp, clamp_to_i16};

mod adp4;
pub use adp4::{Adp4Encoder, Adp4State, INDEX_TABLE, MAX_STEP_INDEX, STEP_TABLE};
pub use adp4::{adp4_encoded_len, decode_adp4, decode_adp4_nibble, encode_adp4, encode_adp4_sample};

mod sdx2;
pub use sdx2::{Channels, Sdx2State, SquareRule};
pub use sdx2::{decode_sdx2, decode_sdx2_byte, encode_sdx2, encode_sdx2_sample};

/// Error values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Invalid number of channels. Only 1 and 2 channels are supported.
    #[error("unsupported channel count {0}, expected 1 or 2")]
    InvalidChannels(usize),

    /// Buffer is too short for the operation.
    #[error("buffer too short: {needed} items needed, {actual} given")]
    InvalidBufferSize {
        needed: usize,
        actual: usize,
    },
}
