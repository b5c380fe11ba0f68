//! Decodes the compressed patient reply into mono f32 samples for the
//! output stream.

use anyhow::{Context, Result, anyhow};
use intake_native_utils::audio;
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Probes and decodes one complete reply (mp3 from the synthesis stage),
/// down-mixing to mono.
pub fn decode_reply(bytes: Vec<u8>) -> Result<DecodedAudio> {
    let stream = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let mut hint = Hint::new();
    hint.with_extension("mp3");

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .context("Unrecognized reply audio container")?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| anyhow!("reply audio contains no tracks"))?;
    let track_id = track.id;
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Unsupported reply audio codec")?;

    let mut samples = Vec::new();
    let mut sample_rate = 0u32;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e).context("Failed to read reply audio packet"),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                samples.extend(audio::downmix_to_mono(
                    buffer.samples(),
                    spec.channels.count(),
                ));
            }
            // A corrupt frame is skippable; the rest of the reply still plays.
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::warn!("skipping undecodable reply frame: {e}");
            }
            Err(e) => return Err(e).context("Failed to decode reply audio"),
        }
    }

    if samples.is_empty() || sample_rate == 0 {
        anyhow::bail!("reply audio decoded to nothing");
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}
