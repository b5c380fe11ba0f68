mod playback;
mod profile_store;
mod session;
mod turn_client;

use crate::profile_store::{JsonProfileStore, ProfileStore};
use crate::session::{Action, CallSession, CaptureState};
use crate::turn_client::{HttpTurnApi, TurnApi};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FrameCount, StreamConfig};
use intake_core::{ClinicProfile, Mode};
use intake_native_utils::{audio, device};
use ringbuf::traits::{Consumer, Producer, Split};
use rubato::Resampler;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::ChronoLocal;

/// Frames per microphone callback.
const INPUT_CHUNK_SIZE: usize = 1024;
/// Frames per playback callback and per resampler chunk.
const OUTPUT_CHUNK_SIZE: usize = 1024;
/// Longest reply we are prepared to buffer for playback.
const OUTPUT_BUFFER_SECONDS: usize = 60;

enum Input {
    Audio(Vec<f32>),
    /// User pressed Enter: start recording, or send the current recording.
    Toggle,
    /// Discard an in-progress recording without submitting it.
    Cancel,
    Quit,
    TurnComplete(Result<turn_client::TurnReply>),
}

#[derive(Parser)]
#[command(name = "intake-trainer", about = "Practice intake calls against a simulated patient")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Patient difficulty: cooperative, challenging, skeptical or boundary
    #[arg(long, default_value = "cooperative")]
    mode: String,

    /// Base URL of the intake api
    #[arg(long, default_value = "http://localhost:3000")]
    server: String,

    /// Read the clinic profile from this file instead of the default location
    #[arg(long)]
    profile_path: Option<PathBuf>,

    /// List audio devices and exit
    #[arg(long)]
    list_devices: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Store the clinic profile the simulated patient is grounded in
    Profile {
        #[arg(long)]
        clinic_name: String,
        #[arg(long)]
        practitioner: String,
        #[arg(long)]
        first_visit_cost: f64,
        #[arg(long)]
        address: String,
        #[arg(long)]
        office_hours: String,
        #[arg(long)]
        decompression: bool,
        #[arg(long)]
        class_iv_laser: bool,
        #[arg(long)]
        shockwave: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    let args = Cli::parse();

    let store = match &args.profile_path {
        Some(path) => JsonProfileStore::new(path.clone()),
        None => JsonProfileStore::default_location()?,
    };

    if let Some(Command::Profile {
        clinic_name,
        practitioner,
        first_visit_cost,
        address,
        office_hours,
        decompression,
        class_iv_laser,
        shockwave,
    }) = args.command
    {
        let profile = ClinicProfile {
            clinic_name,
            practitioner_name: practitioner,
            first_visit_cost,
            address,
            office_hours,
            decompression,
            class_iv_laser,
            shockwave,
        };
        store.save(&profile)?;
        println!("Saved clinic profile to {}", store.path().display());
        return Ok(());
    }

    if args.list_devices {
        println!("Capture devices:\n{}", device::list_inputs()?);
        println!("Playback devices:\n{}", device::list_outputs()?);
        return Ok(());
    }

    // The blocked path: without a stored profile the session never gets as
    // far as touching the microphone.
    let Some(profile) = store.load()? else {
        eprintln!(
            "No clinic profile is configured yet. Create one first:\n\
             \n    intake-trainer profile --clinic-name ... --practitioner ... \
             --first-visit-cost ... --address ... --office-hours ...\n\
             \nStored at {}.",
            store.path().display()
        );
        std::process::exit(2);
    };

    run_call(Mode::parse(&args.mode), args.server, profile).await
}

async fn run_call(mode: Mode, server: String, profile: ClinicProfile) -> Result<()> {
    let api = Arc::new(HttpTurnApi::new(server)?);
    let mut session = CallSession::new(Some(profile), mode);

    let (input_tx, mut input_rx) = tokio::sync::mpsc::channel::<Input>(1024);

    // --- Microphone input stream, acquired once and reused across turns ---
    let input = device::get_or_default_input(None)
        .context("Failed to get default audio input device")?;
    tracing::info!("Using input device: {:?}", input.name()?);

    let input_config = input
        .default_input_config()
        .context("Failed to get default input config")?;
    let input_config = StreamConfig {
        channels: input_config.channels(),
        sample_rate: input_config.sample_rate(),
        buffer_size: cpal::BufferSize::Fixed(FrameCount::from(INPUT_CHUNK_SIZE as u32)),
    };
    let input_channel_count = input_config.channels as usize;
    let input_sample_rate = input_config.sample_rate.0;
    tracing::debug!("Input stream config: {:?}", &input_config);

    let audio_input = input_tx.clone();
    let input_data_fn = move |data: &[f32], _: &cpal::InputCallbackInfo| {
        let mono = audio::downmix_to_mono(data, input_channel_count);
        if let Err(e) = audio_input.try_send(Input::Audio(mono)) {
            tracing::warn!("Failed to send audio data to buffer: {:?}", e);
        }
    };
    let input_stream = input.build_input_stream(
        &input_config,
        input_data_fn,
        move |err| tracing::error!("An error occurred on input stream: {}", err),
        None,
    )?;
    input_stream.play()?;

    // --- Playback stream fed from a shared ring buffer ---
    let output = device::get_or_default_output(None)
        .context("Failed to get default audio output device")?;
    tracing::info!("Using output device: {:?}", output.name()?);

    let output_config = output
        .default_output_config()
        .context("Failed to get default output config")?;
    let output_config = StreamConfig {
        channels: output_config.channels(),
        sample_rate: output_config.sample_rate(),
        buffer_size: cpal::BufferSize::Fixed(FrameCount::from(OUTPUT_CHUNK_SIZE as u32)),
    };
    let output_channel_count = output_config.channels as usize;
    let output_sample_rate = output_config.sample_rate.0 as f64;
    tracing::debug!("Output stream config: {:?}", &output_config);

    let out_buffer = audio::shared_buffer(output_sample_rate as usize * OUTPUT_BUFFER_SECONDS);
    let (mut audio_out_tx, mut audio_out_rx) = out_buffer.split();

    let output_data_fn = move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        let mut sample_index = 0;
        while sample_index < data.len() {
            let sample = audio_out_rx.try_pop().unwrap_or(0.0);
            // Duplicate mono onto the first two channels, zero the rest.
            for _ in 0..output_channel_count.min(2) {
                if sample_index < data.len() {
                    data[sample_index] = sample;
                    sample_index += 1;
                }
            }
            sample_index += output_channel_count.saturating_sub(2);
        }
    };
    let output_stream = output.build_output_stream(
        &output_config,
        output_data_fn,
        move |err| tracing::error!("An error occurred on output stream: {}", err),
        None,
    )?;
    output_stream.play()?;

    // --- Keyboard control: Enter toggles record/send, `q` hangs up ---
    let stdin_tx = input_tx.clone();
    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let event = match line.trim() {
                "q" | "quit" => Input::Quit,
                "c" | "cancel" => Input::Cancel,
                _ => Input::Toggle,
            };
            let quit = matches!(&event, Input::Quit);
            if stdin_tx.send(event).await.is_err() || quit {
                break;
            }
        }
    });

    let ctrl_tx = input_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = ctrl_tx.send(Input::Quit).await;
        }
    });

    tracing::info!(
        "Call started in {} mode. Press Enter to speak, Enter again to send, c to discard, q to hang up.",
        mode.id()
    );

    let mut capture: Vec<f32> = Vec::new();
    let mut recording = false;

    while let Some(event) = input_rx.recv().await {
        match event {
            Input::Audio(samples) => {
                if recording {
                    capture.extend(samples);
                }
            }
            Input::Toggle => match session.state() {
                CaptureState::Idle => match session.begin_capture() {
                    Some(Action::StartCapture) => {
                        capture.clear();
                        recording = true;
                        tracing::info!("Recording... press Enter to send.");
                    }
                    Some(Action::RedirectToSetup) => {
                        eprintln!("No clinic profile is configured; run `intake-trainer profile` first.");
                        break;
                    }
                    _ => {}
                },
                CaptureState::Recording => {
                    let Some(profile) = session.profile().cloned() else {
                        continue;
                    };
                    if session.end_capture().is_some() {
                        recording = false;
                        if capture.is_empty() {
                            if let Action::Notify(message) =
                                session.turn_failed("no audio was captured; try again")
                            {
                                tracing::warn!("{message}");
                            }
                            continue;
                        }

                        let wav = audio::wav_from_f32(&capture, input_sample_rate)?;
                        capture = Vec::new();
                        tracing::info!("Sending your turn ({} bytes)...", wav.len());

                        let api = api.clone();
                        let turn_tx = input_tx.clone();
                        let mode = session.mode();
                        let turns = session.turns().to_vec();
                        tokio::spawn(async move {
                            let result = api.advance(wav, mode, &profile, &turns).await;
                            let _ = turn_tx.send(Input::TurnComplete(result)).await;
                        });
                    }
                }
                CaptureState::Busy => {
                    if session.begin_capture().is_none() {
                        tracing::info!("Still waiting on the patient; hold on.");
                    }
                }
            },
            Input::Cancel => {
                if session.cancel_capture() {
                    recording = false;
                    capture.clear();
                    tracing::info!("Recording discarded.");
                }
            }
            Input::TurnComplete(Ok(reply)) => {
                tracing::info!("You said: \"{}\"", reply.staff_text);
                tracing::info!("Patient: \"{}\"", reply.patient_text);

                if let Action::Play(bytes) = session.turn_succeeded(reply) {
                    match playback::decode_reply(bytes) {
                        Ok(decoded) => {
                            let mut resampler = audio::create_resampler(
                                decoded.sample_rate as f64,
                                output_sample_rate,
                                OUTPUT_CHUNK_SIZE,
                            )?;
                            'chunks: for chunk in
                                audio::split_for_chunks(&decoded.samples, OUTPUT_CHUNK_SIZE)
                            {
                                if let Ok(resampled) = resampler.process(&[chunk.as_slice()], None)
                                {
                                    if let Some(resampled) = resampled.first() {
                                        for &sample in resampled {
                                            if audio_out_tx.try_push(sample).is_err() {
                                                tracing::warn!(
                                                    "playback buffer full; dropping the rest of the reply"
                                                );
                                                break 'chunks;
                                            }
                                        }
                                    }
                                }
                            }
                        }
                        Err(e) => {
                            tracing::warn!("Could not play the patient reply: {e:#}");
                        }
                    }
                }
            }
            Input::TurnComplete(Err(e)) => {
                tracing::warn!("Turn failed: {e:#}");
                if let Action::Notify(message) =
                    session.turn_failed("the patient simulator was unavailable; press Enter to retry")
                {
                    tracing::info!("{message}");
                }
            }
            Input::Quit => {
                tracing::info!("Hanging up.");
                break;
            }
        }
    }

    Ok(())
}
