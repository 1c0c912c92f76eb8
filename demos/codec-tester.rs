
use std::env;
use std::process::ExitCode;

use tdo_audio_codecs::{Adp4State, Sdx2State};

// Values are one stream: the codec state carries over from one value to the next.
fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        println!("Usage: codec-tester {{decode|encode}} {{adp4|sdx2}} values...");
        return ExitCode::FAILURE;
    }

    let command = &args[1];
    let format = &args[2];
    let mut adp4_state = Adp4State::new();
    let Ok(mut sdx2_state) = Sdx2State::new(1) else {
        return ExitCode::FAILURE;
    };
    for value in &args[3..] {
        match (command.as_ref(), format.as_ref()) {
            ("decode", "adp4") => {
                let mut out = [0i16; 2];
                let byte = value.parse::<u8>().expect("bad value");
                tdo_audio_codecs::decode_adp4(&[byte], &mut adp4_state, &mut out)
                    .expect("decode failed");
                println!("{} {}", out[0], out[1]);
            },
            ("decode", "sdx2") => {
                let mut out = [0i16; 1];
                let byte = value.parse::<u8>().expect("bad value");
                tdo_audio_codecs::decode_sdx2(&[byte], &mut sdx2_state, &mut out)
                    .expect("decode failed");
                println!("{}", out[0]);
            },
            ("encode", "adp4") => {
                println!("{}", tdo_audio_codecs::encode_adp4_sample(
                    value.parse::<i16>().expect("bad value"), &mut adp4_state));
            },
            ("encode", "sdx2") => {
                let mut out = [0u8; 1];
                let sample = value.parse::<i16>().expect("bad value");
                tdo_audio_codecs::encode_sdx2(&[sample], &mut sdx2_state, &mut out)
                    .expect("encode failed");
                println!("{}", out[0]);
            },
            _ => {
                eprintln!("ERROR: invalid command or format: {}, {}", command, format);
                return ExitCode::FAILURE;
            }
        };
    }
    ExitCode::SUCCESS
}
