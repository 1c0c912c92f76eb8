//! Subcommand implementations
//!
//! Every subcommand works through its file list one file at a time. A failing file is
//! reported and skipped, the remaining files are still processed.

use anyhow::{ensure, Result};
use clap::ValueEnum;
use colored::Colorize;
use std::path::{Path, PathBuf};

use tdo_audio_codecs::{adp4_encoded_len, decode_adp4, decode_sdx2, encode_adp4, encode_sdx2};
use tdo_audio_codecs::{Adp4State, Channels, Sdx2State, SquareRule};

use crate::ffmpeg::{RawFormat, Tools};
use crate::pcm;

/// How input audio files are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InputType {
    /// Decode with ffmpeg, read as raw s16le if ffmpeg can't
    Auto,
    /// Raw signed 16-bit little endian PCM
    Raw,
}

/// Container for encoded output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EncodedOutput {
    Raw,
    Aifc,
}

impl EncodedOutput {
    fn extension(self) -> &'static str {
        match self {
            EncodedOutput::Raw => "raw",
            EncodedOutput::Aifc => "aifc",
        }
    }
}

/// Container for decoded PCM output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PcmOutput {
    Raw,
    Wav,
    Aiff,
}

impl PcmOutput {
    fn extension(self) -> &'static str {
        match self {
            PcmOutput::Raw => "raw",
            PcmOutput::Wav => "wav",
            PcmOutput::Aiff => "aiff",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Codec {
    Adp4,
    Sdx2,
}

/// Settings shared by the encoding subcommands.
#[derive(Debug, Clone, Copy)]
pub struct EncodeOptions {
    pub input_type: InputType,
    pub output_type: EncodedOutput,
    pub channels: Channels,
    pub freq: u32,
    pub rule: SquareRule,
}

/// Settings shared by the decoding subcommands.
#[derive(Debug, Clone, Copy)]
pub struct DecodeOptions {
    pub output_type: PcmOutput,
    pub channels: Channels,
    pub freq: u32,
    pub rule: SquareRule,
}

/// What one converted file produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub output: PathBuf,
    pub sample_count: usize,
    pub input_size: usize,
    pub output_size: usize,
}

impl Summary {
    fn print(&self) {
        println!(" - output file name: {}", self.output.display());
        println!(" - sample count: {}", self.sample_count);
        println!(" - input data size: {}b", self.input_size);
        println!(" - output data size: {}b", self.output_size);
    }
}

fn with_suffix(input: &Path, suffix: &str) -> PathBuf {
    let mut name = input.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// `song.wav` -> `song.wav.adp4.1ch.22050hz.raw`
pub fn adp4_output_path(input: &Path, freq: u32, output_type: EncodedOutput) -> PathBuf {
    with_suffix(input, &format!("adp4.1ch.{}hz.{}", freq, output_type.extension()))
}

/// `song.wav` -> `song.wav.sdx2.2ch.22050hz.raw`
pub fn sdx2_output_path(input: &Path, channels: Channels, freq: u32, output_type: EncodedOutput)
    -> PathBuf {
    with_suffix(input, &format!("sdx2.{}ch.{}hz.{}", channels.count(), freq, output_type.extension()))
}

/// `song.adp4` -> `song.adp4.wav`
pub fn pcm_output_path(input: &Path, output_type: PcmOutput) -> PathBuf {
    with_suffix(input, output_type.extension())
}

/// Runs `convert` for every file. Returns the number of files which failed.
pub fn run_batch<F>(files: &[PathBuf], quiet: bool, mut convert: F) -> usize
where
    F: FnMut(&Path) -> Result<Option<Summary>>,
{
    let mut failures = 0;
    for file in files {
        if !quiet {
            println!("{}:", file.display());
        }
        match convert(file) {
            Ok(Some(summary)) if !quiet => summary.print(),
            Ok(_) => (),
            Err(err) => {
                failures += 1;
                log::debug!("{}: {:?}", file.display(), err);
                println!("{}", format!(" - ERROR - {} - {:#}", file.display(), err).red());
            }
        }
    }
    failures
}

fn load_samples(tools: &Tools, input: &Path, input_type: InputType, channels: Channels, freq: u32)
    -> Result<Vec<i16>> {
    let samples = match input_type {
        InputType::Raw => pcm::load_s16(input)?,
        InputType::Auto => match tools.to_s16le(input, channels.count(), freq) {
            Ok(samples) => samples,
            Err(err) => {
                log::info!("{}: {:#}, reading it as raw s16le", input.display(), err);
                pcm::load_s16(input)?
            }
        },
    };
    ensure!(!samples.is_empty(), "no audio samples in {}", input.display());
    Ok(samples)
}

fn write_encoded(tools: &Tools, data: &[u8], format: &RawFormat, output: &Path,
    output_type: EncodedOutput) -> Result<()> {
    match output_type {
        EncodedOutput::Raw => pcm::write(output, data),
        EncodedOutput::Aifc => tools.write(data, format, output, true),
    }
}

fn write_pcm(tools: &Tools, samples: &[i16], channels: Channels, freq: u32, output: &Path,
    output_type: PcmOutput) -> Result<usize> {
    let data = pcm::s16_to_bytes(samples);
    match output_type {
        PcmOutput::Raw => pcm::write(output, &data)?,
        PcmOutput::Wav | PcmOutput::Aiff => {
            tools.write(&data, &RawFormat::pcm_s16le(channels.count(), freq), output, false)?;
        }
    }
    Ok(data.len())
}

/// Encodes one file to mono ADP4.
pub fn to_adp4(tools: &Tools, input: &Path, options: &EncodeOptions) -> Result<Summary> {
    let samples = load_samples(tools, input, options.input_type, Channels::Mono, options.freq)?;

    let mut data = vec![0u8; pcm::word_aligned(adp4_encoded_len(samples.len()))];
    encode_adp4(&samples, &mut Adp4State::new(), &mut data)?;

    let output = adp4_output_path(input, options.freq, options.output_type);
    write_encoded(tools, &data, &RawFormat::adp4(options.freq), &output, options.output_type)?;
    Ok(Summary {
        output,
        sample_count: samples.len(),
        input_size: samples.len() * 2,
        output_size: data.len(),
    })
}

/// Decodes one raw mono ADP4 file. Every byte holds two samples.
pub fn from_adp4(tools: &Tools, input: &Path, options: &DecodeOptions) -> Result<Summary> {
    let data = pcm::load_u8(input)?;

    let mut samples = vec![0i16; data.len() * 2];
    decode_adp4(&data, &mut Adp4State::new(), &mut samples)?;

    let output = pcm_output_path(input, options.output_type);
    let output_size =
        write_pcm(tools, &samples, Channels::Mono, options.freq, &output, options.output_type)?;
    Ok(Summary { output, sample_count: samples.len(), input_size: data.len(), output_size })
}

/// Encodes one file to SDX2 with the requested channel count.
pub fn to_sdx2(tools: &Tools, input: &Path, options: &EncodeOptions) -> Result<Summary> {
    let samples = load_samples(tools, input, options.input_type, options.channels, options.freq)?;

    let mut data = vec![0u8; pcm::word_aligned(samples.len())];
    let mut state = Sdx2State::for_channels(options.channels, options.rule);
    encode_sdx2(&samples, &mut state, &mut data)?;

    let output = sdx2_output_path(input, options.channels, options.freq, options.output_type);
    let format = RawFormat::sdx2(options.channels.count(), options.freq);
    write_encoded(tools, &data, &format, &output, options.output_type)?;
    Ok(Summary {
        output,
        sample_count: samples.len(),
        input_size: samples.len() * 2,
        output_size: data.len(),
    })
}

/// Decodes one raw SDX2 file. Every byte holds one sample.
pub fn from_sdx2(tools: &Tools, input: &Path, options: &DecodeOptions) -> Result<Summary> {
    let data = pcm::load_u8(input)?;

    let mut samples = vec![0i16; data.len()];
    let mut state = Sdx2State::for_channels(options.channels, options.rule);
    decode_sdx2(&data, &mut state, &mut samples)?;

    let output = pcm_output_path(input, options.output_type);
    let output_size =
        write_pcm(tools, &samples, options.channels, options.freq, &output, options.output_type)?;
    Ok(Summary { output, sample_count: samples.len(), input_size: data.len(), output_size })
}

/// Plays one raw codec file with ffplay.
pub fn play(tools: &Tools, input: &Path, codec: Codec, channels: Channels, freq: u32)
    -> Result<()> {
    ensure!(input.is_file(), "no such file");
    let format = match codec {
        Codec::Adp4 => RawFormat::adp4(freq),
        Codec::Sdx2 => RawFormat::sdx2(channels.count(), freq),
    };
    tools.play(&format, input)
}
