//! `btle-rx`: tunes an SDR to a BLE advertising channel and prints decoded
//! advertising PDUs to stdout. Thin wiring around `btle_rx`'s library
//! pipeline: CLI parsing, radio back-end selection, signal-driven shutdown,
//! and (if `--capture`/`--replay` are given) the offline capture helpers.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Parser;

use btle_rx::cli::Cli;
use btle_rx::error::Error;
use btle_rx::radio::RadioBackend;
use btle_rx::ring::IqScalar;
use btle_rx::{capture, phy, receiver, ring, signal};

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("btle-rx: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Error> {
    let channel = cli.validated_channel()?;
    let freq_hz = phy::freq_for_channel(channel)?;

    let exit = signal::install().map_err(Error::Io)?;

    if let Some(path) = &cli.replay {
        return run_replay(path.clone(), channel, &exit);
    }

    run_live(cli, channel, freq_hz, &exit)
}

/// Drains `consumer` until `exit` fires, writing decoded packets to stdout.
/// Shared between the live and replay paths.
fn drive<S: IqScalar>(
    consumer: &ring::Consumer<S>,
    channel: u8,
    exit: &AtomicBool,
) -> Result<(), Error> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    receiver::run(consumer, channel, exit, &mut out);
    Ok(())
}

fn run_replay(path: PathBuf, channel: u8, exit: &AtomicBool) -> Result<(), Error> {
    #[cfg(feature = "bladerf")]
    type Sample = i16;
    #[cfg(not(feature = "bladerf"))]
    type Sample = i8;

    let (producer, consumer) = ring::channel::<Sample>();
    let mut backend = btle_rx::radio::replay::Replay::<Sample>::new(path);
    backend.configure(0, 0)?;
    backend.start(Box::new(move |samples: &[Sample]| {
        producer.push(samples);
    }))?;

    drive(&consumer, channel, exit)?;
    backend.stop()
}

#[cfg(feature = "hackrf")]
fn run_live(cli: &Cli, channel: u8, freq_hz: u64, exit: &AtomicBool) -> Result<(), Error> {
    use btle_rx::radio::hackrf::HackRf;

    let gain = cli.validated_gain(10, HackRf::max_gain())?;
    let mut backend = HackRf::open()?;
    backend.configure(freq_hz, gain)?;

    let (producer, consumer) = ring::channel::<i8>();
    let capture_path = cli.capture.clone();
    backend.start(Box::new(move |samples: &[i8]| {
        if let Some(path) = &capture_path {
            if let Err(e) = capture::append_capture(path, samples) {
                log::warn!("capture write failed: {}", e);
            }
        }
        producer.push(samples);
    }))?;

    let result = drive(&consumer, channel, exit);
    backend.stop()?;
    result
}

#[cfg(all(feature = "bladerf", not(feature = "hackrf")))]
fn run_live(cli: &Cli, channel: u8, freq_hz: u64, exit: &AtomicBool) -> Result<(), Error> {
    use btle_rx::radio::bladerf::BladeRf;

    let gain = cli.validated_gain(66, BladeRf::max_gain())?;
    let mut backend = BladeRf::open()?;
    backend.configure(freq_hz, gain)?;

    let (producer, consumer) = ring::channel::<i16>();
    let capture_path = cli.capture.clone();
    backend.start(Box::new(move |samples: &[i16]| {
        if let Some(path) = &capture_path {
            if let Err(e) = capture::append_capture(path, samples) {
                log::warn!("capture write failed: {}", e);
            }
        }
        producer.push(samples);
    }))?;

    let result = drive(&consumer, channel, exit);
    backend.stop()?;
    result
}

#[cfg(not(any(feature = "hackrf", feature = "bladerf")))]
fn run_live(_cli: &Cli, _channel: u8, _freq_hz: u64, _exit: &AtomicBool) -> Result<(), Error> {
    Err(Error::DeviceInit(
        "no radio back-end compiled in; build with --features hackrf or --features bladerf, \
         or pass --replay"
            .into(),
    ))
}
