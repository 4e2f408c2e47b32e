// oalstream - play one music stream through OpenAL Soft.
//
// Startup:
//   1. Parse the command line and install the tracing subscriber.
//   2. Register the stream cvars and run the optional config file.
//   3. Open the OpenAL device and generate two sources plus the buffer pool.
//   4. Frame loop: update the stream every tick until it drains.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use oalstream_audio::openal::OpenAlDevice;
use oalstream_audio::stream::MAX_PAN;
use oalstream_audio::vb::{VbFile, DEFAULT_CHANNELS};
use oalstream_audio::{StereoPair, StreamPlayer, StreamSettings, MAX_VOLUME};
use oalstream_common::cvar;

const FRAME_MSEC: u64 = 10;
const PROGRESS_MSEC: u128 = 5000;

#[derive(Parser, Debug)]
#[command(name = "oalstream", version, about = "Stream a .vb, .wav, .mp3 or .opus file through OpenAL")]
struct Args {
    /// File to play
    file: PathBuf,

    /// Volume, 0..=127 (defaults to s_streamvolume)
    #[arg(short, long)]
    volume: Option<u32>,

    /// Pan, 0 = left, 63 = center, 127 = right
    #[arg(short, long, default_value_t = 63)]
    pan: u8,

    /// Start position in milliseconds
    #[arg(short, long, default_value_t = 0)]
    start_ms: u32,

    /// Restart from the beginning when the stream ends
    #[arg(short = 'l', long = "loop")]
    looping: bool,

    /// Sample rate for .vb files (defaults to s_vbrate)
    #[arg(short = 'r', long)]
    sample_rate: Option<u32>,

    /// Config file of `set <name> <value>` lines
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn is_vb(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("vb"))
}

fn load_settings(config: Option<&Path>) -> Result<StreamSettings> {
    cvar::cvar_init();
    cvar::with_cvars(StreamSettings::register);

    if let Some(path) = config {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let applied = cvar::cvar_exec(&text);
        info!("{}: {} settings applied", path.display(), applied);
    }

    cvar::with_cvars(|c| StreamSettings::from_cvars(c)).context("cvar registry not initialized")
}

fn run(args: Args) -> Result<()> {
    let settings = load_settings(args.config.as_deref())?;
    debug!("{:?}", settings);

    let mut device = OpenAlDevice::open().context("opening OpenAL device")?;
    let sources = device.gen_sources(2).context("generating sources")?;
    let buffers = device
        .gen_buffers(settings.buffer_count())
        .context("generating stream buffers")?;
    let sources = StereoPair::new(sources[0], sources[1]);

    let rate = args.sample_rate.unwrap_or(settings.vb_sample_rate);
    let mut stream = if is_vb(&args.file) && settings.vb_channels != DEFAULT_CHANNELS {
        let decoder = VbFile::with_format(&args.file, rate, settings.vb_channels);
        StreamPlayer::with_decoder(&args.file.display().to_string(), Box::new(decoder), sources, &buffers)
    } else {
        StreamPlayer::new(&args.file, sources, &buffers, rate)
    };
    if !stream.is_opened() {
        bail!("could not open {}", args.file.display());
    }

    let al = &mut device;
    if !stream.setup(al) {
        bail!("{}: nothing to play", stream.name());
    }
    stream.set_volume(al, args.volume.unwrap_or(settings.volume).min(MAX_VOLUME));
    stream.set_pan(al, args.pan.min(MAX_PAN));
    stream.set_looping(args.looping);
    if args.start_ms > 0 {
        stream.set_pos_ms(al, args.start_ms);
    }

    let length = stream.get_length_ms();
    info!("playing {} ({}:{:02})", stream.name(), length / 60_000, length / 1000 % 60);
    stream.start(al);

    let mut last_report = Instant::now();
    while stream.is_playing(al) {
        stream.update(al);

        if last_report.elapsed().as_millis() >= PROGRESS_MSEC {
            let pos = stream.get_pos_ms(al);
            info!("{}:{:02} / {}:{:02}", pos / 60_000, pos / 1000 % 60, length / 60_000, length / 1000 % 60);
            last_report = Instant::now();
        }

        thread::sleep(Duration::from_millis(FRAME_MSEC));
    }

    info!("{}: finished", stream.name());
    stream.delete(al);
    device.close();
    cvar::cvar_shutdown();
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "oalstream=info".into()))
        .with(fmt::layer())
        .init();

    run(Args::parse())
}
