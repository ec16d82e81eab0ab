//! `trackstream` demo: drives a simulated sink through a full playback session
//! (prime, start, play, pause, flush, restart, stop) and prints the counters
//! at each step. Set `RUST_LOG=debug` to see the state transitions.

use std::env;
use std::fs;
use std::time::Duration;

use anyhow::{bail, Context};
use trackstream::timestamp::ClockId;
use trackstream::{AudioSink, SinkController, StreamConfig, StreamState, TrackStream};

const DEFAULT_SAMPLE_RATE: u32 = 48_000;
const MAX_POLLS: usize = 16;

struct Options {
    config: StreamConfig,
    seconds: f32,
}

fn print_usage() {
    eprintln!(
        "Usage:\n  trackstream [--config <file.json>] [--rate <hz>] [--seconds <s>] [--wrap-bits <n>]\n\nFlags:\n  --config <file>      Stream configuration as JSON\n  --rate <hz>          Requested sample rate (default {DEFAULT_SAMPLE_RATE})\n  --seconds <s>        Simulated playback time before pausing (default 1.0)\n  --wrap-bits <n>      Width of the simulated position counter (1..=32)\n  -h, --help           Show this help\n"
    );
}

fn parse_args() -> anyhow::Result<Option<Options>> {
    let mut config = StreamConfig::low_latency(DEFAULT_SAMPLE_RATE);
    let mut seconds = 1.0f32;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next()
                .with_context(|| format!("{flag} requires an argument"))
        };
        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                return Ok(None);
            }
            "--config" => {
                let path = value("--config")?;
                let json = fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config '{path}'"))?;
                config = StreamConfig::from_json(&json)?;
            }
            "--rate" => {
                config.sample_rate = Some(value("--rate")?.parse().context("invalid --rate")?);
            }
            "--seconds" => {
                seconds = value("--seconds")?.parse().context("invalid --seconds")?;
            }
            "--wrap-bits" => {
                config.position_width_bits =
                    value("--wrap-bits")?.parse().context("invalid --wrap-bits")?;
            }
            _ => {
                print_usage();
                bail!("Unknown flag: {arg}");
            }
        }
    }
    config.validate()?;
    Ok(Some(Options { config, seconds }))
}

fn settle(stream: &mut TrackStream<Box<dyn AudioSink>>, target: StreamState) -> anyhow::Result<()> {
    for _ in 0..MAX_POLLS {
        if stream.state() == target {
            return Ok(());
        }
        stream.update_state()?;
    }
    bail!("stream stuck in {} waiting for {}", stream.state(), target)
}

fn report(step: &str, stream: &mut TrackStream<Box<dyn AudioSink>>) {
    println!(
        "{:<10} state={:<13} written={:>8} read={:>8}",
        step,
        stream.state(),
        stream.frames_written(),
        stream.frames_read()
    );
}

fn run(options: Options) -> anyhow::Result<()> {
    let controller = SinkController::new();
    controller.set_position_width(options.config.position_width_bits);

    let mut stream: TrackStream<Box<dyn AudioSink>> = TrackStream::new();
    stream.open(&options.config, |params| {
        controller
            .create(params)
            .map(|sink| Box::new(sink) as Box<dyn AudioSink>)
    })?;

    println!("trackstream - simulated playback session");
    println!("========================================\n");
    println!(
        "Negotiated: {} Hz, {} ch, {:?}, capacity {} frames, burst {} frames, latency {:.1} ms\n",
        stream.sample_rate(),
        stream.channel_count(),
        stream.format(),
        stream.buffer_capacity()?,
        stream.frames_per_burst(),
        stream.buffer_latency_ms()?
    );

    let burst = stream.frames_per_burst() as usize;
    let silence = vec![0u8; burst * stream.bytes_per_frame()];

    // prime the buffer before starting
    while stream.write(&silence, burst, Duration::ZERO)? > 0 {}
    report("primed", &mut stream);

    stream.request_start()?;
    settle(&mut stream, StreamState::Started)?;
    report("started", &mut stream);

    let total_frames = (options.seconds * stream.sample_rate() as f32) as u64;
    let mut played = 0u64;
    while played < total_frames {
        controller.advance(burst as u64);
        played += burst as u64;
        stream.write(&silence, burst, Duration::from_millis(10))?;
    }
    report("playing", &mut stream);
    if let Ok(ts) = stream.timestamp(ClockId::Monotonic) {
        println!(
            "           frame {} presented at {} ns (monotonic)",
            ts.frame_position, ts.time_nanos
        );
    }

    stream.request_pause()?;
    settle(&mut stream, StreamState::Paused)?;
    report("paused", &mut stream);

    stream.request_flush()?;
    settle(&mut stream, StreamState::Flushed)?;
    report("flushed", &mut stream);

    stream.request_start()?;
    settle(&mut stream, StreamState::Started)?;
    stream.write(&silence, burst, Duration::ZERO)?;
    controller.advance(burst as u64);
    report("restarted", &mut stream);

    stream.request_stop()?;
    settle(&mut stream, StreamState::Stopped)?;
    report("stopped", &mut stream);

    println!("\nUnderruns: {}", stream.underrun_count()?);
    stream.close()?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    match parse_args()? {
        Some(options) => run(options),
        None => Ok(()),
    }
}
