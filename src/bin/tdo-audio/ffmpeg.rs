//! ffmpeg / ffplay subprocesses
//!
//! Everything that involves containers, resampling or channel mixing is done by ffmpeg.
//! The codecs themselves only ever see flat sample and byte buffers.

use anyhow::{bail, Context, Result};
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::thread;

/// Names (or paths) of the external executables.
#[derive(Debug, Clone)]
pub struct Tools {
    pub ffmpeg: String,
    pub ffplay: String,
}

/// Input format description for raw data piped into ffmpeg or read by ffplay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFormat {
    pub format: &'static str,
    pub codec: &'static str,
    pub channels: usize,
    pub freq: u32,
}

impl RawFormat {
    pub fn pcm_s16le(channels: usize, freq: u32) -> RawFormat {
        RawFormat { format: "s16le", codec: "pcm_s16le", channels, freq }
    }

    pub fn adp4(freq: u32) -> RawFormat {
        RawFormat { format: "u8", codec: "adpcm_ima_ws", channels: 1, freq }
    }

    pub fn sdx2(channels: usize, freq: u32) -> RawFormat {
        RawFormat { format: "u8", codec: "sdx2_dpcm", channels, freq }
    }

    fn args(&self) -> Vec<OsString> {
        let channels = self.channels.to_string();
        let freq = self.freq.to_string();
        os(&["-f", self.format, "-acodec", self.codec, "-ac", &channels, "-ar", &freq])
    }
}

fn os(args: &[&str]) -> Vec<OsString> {
    args.iter().map(OsString::from).collect()
}

fn file_arg(path: &Path) -> OsString {
    // "file:" keeps ffmpeg from reading a ':' in the name as a protocol
    let mut arg = OsString::from("file:");
    arg.push(path.as_os_str());
    arg
}

/// Arguments for decoding any input ffmpeg understands to s16le on stdout.
pub fn decode_args(input: &Path, channels: usize, freq: u32) -> Vec<OsString> {
    let channels = channels.to_string();
    let freq = freq.to_string();
    let mut args = os(&["-hide_banner", "-loglevel", "error", "-i"]);
    args.push(file_arg(input));
    args.extend(os(&["-vn", "-dn", "-sn", "-ac", &channels, "-ar", &freq]));
    args.extend(os(&["-f", "s16le", "-acodec", "pcm_s16le", "pipe:1"]));
    args
}

/// Arguments for wrapping raw data from stdin into the container implied by `output`.
pub fn write_args(format: &RawFormat, output: &Path, copy_codec: bool) -> Vec<OsString> {
    let mut args = os(&["-y", "-hide_banner", "-loglevel", "error"]);
    args.extend(format.args());
    args.extend(os(&["-i", "pipe:0"]));
    if copy_codec {
        args.extend(os(&["-c:a", "copy"]));
    }
    args.push(file_arg(output));
    args
}

/// Arguments for playing a raw codec file.
pub fn play_args(format: &RawFormat, input: &Path) -> Vec<OsString> {
    let mut args = os(&["-hide_banner", "-autoexit", "-nodisp", "-volume", "100"]);
    args.extend(format.args());
    args.push(input.as_os_str().to_owned());
    args
}

/// Runs `command` with `data` on its stdin and collects its stderr.
///
/// The input is written from a separate thread while stderr is drained, so a child that
/// logs a lot before reading its input can't block on a full pipe.
fn pipe_through(command: &mut Command, data: &[u8]) -> Result<(Output, io::Result<()>)> {
    let program = command.get_program().to_string_lossy().into_owned();
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to run {program}"))?;
    let mut stdin = child.stdin.take().with_context(|| format!("no stdin pipe to {program}"))?;

    let (written, output) = thread::scope(|scope| {
        // stdin is dropped when the writer returns, which closes the pipe
        let writer = scope.spawn(move || stdin.write_all(data));
        let output = child.wait_with_output();
        (writer.join(), output)
    });
    let output = output.with_context(|| format!("failed to wait for {program}"))?;
    let Ok(written) = written else {
        bail!("writer thread for {program} panicked");
    };
    Ok((output, written))
}

impl Tools {
    fn available(executable: &str) -> bool {
        let status = Command::new(executable)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        matches!(status, Ok(s) if s.success())
    }

    pub fn ffmpeg_available(&self) -> bool {
        Self::available(&self.ffmpeg)
    }

    pub fn ffplay_available(&self) -> bool {
        Self::available(&self.ffplay)
    }

    /// Decodes `input` with ffmpeg to interleaved s16 samples.
    pub fn to_s16le(&self, input: &Path, channels: usize, freq: u32) -> Result<Vec<i16>> {
        let args = decode_args(input, channels, freq);
        log::debug!("running {} {:?}", self.ffmpeg, args);
        let output = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("failed to run {}", self.ffmpeg))?;
        if !output.status.success() {
            bail!("{} failed ({}): {}", self.ffmpeg, output.status,
                String::from_utf8_lossy(&output.stderr).trim());
        }
        if output.stdout.is_empty() {
            bail!("{} produced no audio", self.ffmpeg);
        }
        Ok(crate::pcm::bytes_to_s16(&output.stdout))
    }

    /// Pipes `data` into ffmpeg, which writes it to `output`.
    pub fn write(&self, data: &[u8], format: &RawFormat, output: &Path, copy_codec: bool)
        -> Result<()> {
        let args = write_args(format, output, copy_codec);
        log::debug!("running {} {:?}", self.ffmpeg, args);
        let (output, written) = pipe_through(Command::new(&self.ffmpeg).args(&args), data)?;
        if !output.status.success() {
            bail!("{} failed ({}): {}", self.ffmpeg, output.status,
                String::from_utf8_lossy(&output.stderr).trim());
        }
        written.with_context(|| format!("short write to {}", self.ffmpeg))
    }

    /// Plays a raw codec file with ffplay and waits until it is done.
    pub fn play(&self, format: &RawFormat, input: &Path) -> Result<()> {
        let args = play_args(format, input);
        log::debug!("running {} {:?}", self.ffplay, args);
        let status = Command::new(&self.ffplay)
            .args(&args)
            .stdin(Stdio::null())
            .status()
            .with_context(|| format!("failed to run {}", self.ffplay))?;
        if !status.success() {
            bail!("{} failed ({})", self.ffplay, status);
        }
        Ok(())
    }
}
