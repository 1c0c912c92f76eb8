//! tdo-audio - 3DO audio tool
//!
//! Converts audio to and from the 3DO ADP4 and SDX2 formats. Anything beyond raw
//! sample data (containers, resampling, channel mixing, playback) is left to ffmpeg.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use tdo_audio_codecs::{Channels, SquareRule};

mod commands;
mod ffmpeg;
mod pcm;

use commands::{Codec, DecodeOptions, EncodeOptions, EncodedOutput, InputType, PcmOutput};
use ffmpeg::Tools;

#[derive(Parser)]
#[command(
    name = "tdo-audio",
    about = "3DO audio tool: ADP4 and SDX2 encoder and decoder",
    long_about = None,
    after_help = "EXAMPLES:
    # Encode a file to raw mono ADP4 at 22050 Hz
    tdo-audio to-adp4 music.flac

    # Encode raw s16le stereo PCM to SDX2 in an AIFC container
    tdo-audio to-sdx2 -c 2 -i raw -o aifc music.raw

    # Decode SDX2 back to a wav file
    tdo-audio from-sdx2 -c 2 -o wav music.raw.sdx2.2ch.22050hz.raw

    # Listen to an encoded file
    tdo-audio play --codec sdx2 -c 2 music.raw.sdx2.2ch.22050hz.raw"
)]
#[command(version)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(global = true, short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(global = true, short = 'q', long, conflicts_with = "verbose")]
    quiet: bool,

    /// Disable colored output
    #[arg(global = true, long)]
    no_color: bool,

    /// ffmpeg executable
    #[arg(global = true, long, env = "FFMPEG", default_value = "ffmpeg")]
    ffmpeg: String,

    /// ffplay executable
    #[arg(global = true, long, env = "FFPLAY", default_value = "ffplay")]
    ffplay: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode audio files to mono ADP4
    ToAdp4 {
        /// Files to encode
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// How input files are read
        #[arg(short, long, value_enum, default_value = "auto")]
        input_type: InputType,
        /// Output container
        #[arg(short, long, value_enum, default_value = "raw")]
        output_type: EncodedOutput,
        /// Sample rate in Hz
        #[arg(short, long, default_value_t = 22050, value_parser = clap::value_parser!(u32).range(1..))]
        freq: u32,
    },
    /// Decode raw mono ADP4 files
    FromAdp4 {
        /// Files to decode
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Output container
        #[arg(short, long, value_enum, default_value = "raw")]
        output_type: PcmOutput,
        /// Sample rate in Hz
        #[arg(short, long, default_value_t = 22050, value_parser = clap::value_parser!(u32).range(1..))]
        freq: u32,
    },
    /// Encode audio files to SDX2
    ToSdx2 {
        /// Files to encode
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Number of channels (1 or 2)
        #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=2))]
        channels: u8,
        /// How input files are read
        #[arg(short, long, value_enum, default_value = "auto")]
        input_type: InputType,
        /// Output container
        #[arg(short, long, value_enum, default_value = "raw")]
        output_type: EncodedOutput,
        /// Sample rate in Hz
        #[arg(short, long, default_value_t = 22050, value_parser = clap::value_parser!(u32).range(1..))]
        freq: u32,
        /// Square the whole byte including the mode bit, like legacy decoders do
        #[arg(long)]
        whole_byte_squares: bool,
    },
    /// Decode raw SDX2 files
    FromSdx2 {
        /// Files to decode
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Number of channels (1 or 2)
        #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=2))]
        channels: u8,
        /// Output container
        #[arg(short, long, value_enum, default_value = "raw")]
        output_type: PcmOutput,
        /// Sample rate in Hz
        #[arg(short, long, default_value_t = 22050, value_parser = clap::value_parser!(u32).range(1..))]
        freq: u32,
        /// Square the whole byte including the mode bit, like legacy decoders do
        #[arg(long)]
        whole_byte_squares: bool,
    },
    /// Play raw ADP4 or SDX2 files with ffplay
    Play {
        /// Files to play
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Codec of the files
        #[arg(long, value_enum, default_value = "adp4")]
        codec: Codec,
        /// Number of channels (1 or 2, SDX2 only)
        #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=2))]
        channels: u8,
        /// Sample rate in Hz
        #[arg(short, long, default_value_t = 22050, value_parser = clap::value_parser!(u32).range(1..))]
        freq: u32,
    },
}

fn square_rule(whole_byte_squares: bool) -> SquareRule {
    if whole_byte_squares {
        SquareRule::WholeByte
    } else {
        SquareRule::ModeBitCleared
    }
}

fn require_ffmpeg(tools: &Tools) -> Result<()> {
    if !tools.ffmpeg_available() {
        bail!("ffmpeg executable not found: {} (set --ffmpeg or FFMPEG)", tools.ffmpeg);
    }
    Ok(())
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let tools = Tools { ffmpeg: cli.ffmpeg, ffplay: cli.ffplay };
    let quiet = cli.quiet;

    let failures = match cli.command {
        Commands::ToAdp4 { files, input_type, output_type, freq } => {
            if output_type != EncodedOutput::Raw {
                require_ffmpeg(&tools)?;
            }
            let options = EncodeOptions {
                input_type,
                output_type,
                channels: Channels::Mono,
                freq,
                rule: SquareRule::default(),
            };
            commands::run_batch(&files, quiet, |file| {
                commands::to_adp4(&tools, file, &options).map(Some)
            })
        }
        Commands::FromAdp4 { files, output_type, freq } => {
            if output_type != PcmOutput::Raw {
                require_ffmpeg(&tools)?;
            }
            let options = DecodeOptions {
                output_type,
                channels: Channels::Mono,
                freq,
                rule: SquareRule::default(),
            };
            commands::run_batch(&files, quiet, |file| {
                commands::from_adp4(&tools, file, &options).map(Some)
            })
        }
        Commands::ToSdx2 { files, channels, input_type, output_type, freq, whole_byte_squares } => {
            if output_type != EncodedOutput::Raw {
                require_ffmpeg(&tools)?;
            }
            let options = EncodeOptions {
                input_type,
                output_type,
                channels: Channels::try_from(usize::from(channels))?,
                freq,
                rule: square_rule(whole_byte_squares),
            };
            commands::run_batch(&files, quiet, |file| {
                commands::to_sdx2(&tools, file, &options).map(Some)
            })
        }
        Commands::FromSdx2 { files, channels, output_type, freq, whole_byte_squares } => {
            if output_type != PcmOutput::Raw {
                require_ffmpeg(&tools)?;
            }
            let options = DecodeOptions {
                output_type,
                channels: Channels::try_from(usize::from(channels))?,
                freq,
                rule: square_rule(whole_byte_squares),
            };
            commands::run_batch(&files, quiet, |file| {
                commands::from_sdx2(&tools, file, &options).map(Some)
            })
        }
        Commands::Play { files, codec, channels, freq } => {
            if !tools.ffplay_available() {
                bail!("ffplay executable not found: {} (set --ffplay or FFPLAY)", tools.ffplay);
            }
            let channels = Channels::try_from(usize::from(channels))?;
            commands::run_batch(&files, quiet, |file| {
                commands::play(&tools, file, codec, channels, freq).map(|()| None)
            })
        }
    };

    if failures > 0 {
        log::warn!("{} file(s) failed", failures);
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
