use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

use yuv_hue::{
    config::{Config, ScheduledCommand},
    video::{HueFilter, PixelFormat, RawVideoReader, RawVideoWriter, Rational, VideoFrame},
};

#[derive(Parser)]
#[command(
    name = "yuv-hue",
    version,
    about = "Adjust hue and saturation of raw planar YUV video",
    long_about = "yuv-hue rotates and scales the chroma of every frame of a raw planar YUV stream. Hue and saturation are constants or expressions of the frame number and timestamp."
)]
struct Cli {
    /// Raw planar input file
    #[arg(short, long)]
    input: PathBuf,

    /// Raw planar output file
    #[arg(short, long)]
    output: PathBuf,

    /// Frame size as WIDTHxHEIGHT
    #[arg(short, long, value_parser = parse_size)]
    size: Option<(usize, usize)>,

    /// Pixel format (yuv420p, yuv422p, yuv444p, yuv411p, yuv410p, yuv440p, yuva420p)
    #[arg(long)]
    pix_fmt: Option<PixelFormat>,

    /// Frame rate as NUM/DEN
    #[arg(short, long)]
    rate: Option<Rational>,

    /// Filter options, e.g. "90:1.5" or "h=90*t:s=1+sin(t)"
    #[arg(short, long)]
    filter: Option<String>,

    /// Deliver each frame in ranges of this many rows
    #[arg(long)]
    slice_height: Option<usize>,

    /// Runtime command applied before a frame, FRAME:reinit:OPTIONS
    #[arg(long = "command", value_name = "FRAME:COMMAND:ARGS")]
    commands: Vec<ScheduledCommand>,

    /// Number of worker threads
    #[arg(short, long)]
    threads: Option<usize>,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_size(s: &str) -> std::result::Result<(usize, usize), String> {
    let (width, height) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
    let width = width.trim().parse().map_err(|_| format!("invalid width '{}'", width))?;
    let height = height.trim().parse().map_err(|_| format!("invalid height '{}'", height))?;
    Ok((width, height))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .init();

    info!("Starting yuv-hue v{}", env!("CARGO_PKG_VERSION"));
    info!("Input: {:?}", cli.input);
    info!("Output: {:?}", cli.output);

    // Load configuration
    let mut config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    };
    apply_overrides(&mut config, &cli);
    config.validate()?;

    rayon::ThreadPoolBuilder::new()
        .num_threads(config.processing.threads)
        .build_global()
        .context("Failed to start worker threads")?;

    let stream = config.stream.stream_info();
    let mut filter = HueFilter::new(&config.filter.options)?
        .with_slice_height(config.processing.slice_height)
        .with_parallel_rows(config.processing.parallel_rows);
    filter.configure_input(stream)?;

    let input = File::open(&cli.input)
        .with_context(|| format!("Failed to open {:?}", cli.input))?;
    let output = File::create(&cli.output)
        .with_context(|| format!("Failed to create {:?}", cli.output))?;

    let reader = RawVideoReader::new(BufReader::new(input), stream.format, stream.width, stream.height)
        .with_timing(stream.frame_rate, stream.time_base);
    let mut writer = RawVideoWriter::new(BufWriter::new(output));

    let batch_size = config.processing.threads;
    let mut batch: Vec<VideoFrame> = Vec::with_capacity(batch_size);

    for (index, frame) in reader.enumerate() {
        let frame = frame?;
        let index = index as u64;

        let mut commands = config.filter.commands_at(index).peekable();
        if commands.peek().is_some() {
            // Queued frames resolve with the parameters active when they arrived
            flush(&mut filter, &mut batch, &mut writer)?;
            for command in commands {
                info!("Frame {}: {} '{}'", index, command.command, command.args);
                if let Err(e) = filter.process_command(&command.command, &command.args) {
                    if !e.is_recoverable() {
                        return Err(e.into());
                    }
                    warn!("{}", e.user_message());
                }
            }
        }

        batch.push(frame);
        if batch.len() >= batch_size {
            flush(&mut filter, &mut batch, &mut writer)?;
        }
    }
    flush(&mut filter, &mut batch, &mut writer)?;
    writer.flush()?;

    info!("Processed {} frames, output saved to: {:?}", writer.frames_written(), cli.output);
    Ok(())
}

/// Command-line values take precedence over the configuration file
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some((width, height)) = cli.size {
        config.stream.width = width;
        config.stream.height = height;
    }
    if let Some(format) = cli.pix_fmt {
        config.stream.pixel_format = format;
    }
    if let Some(rate) = cli.rate {
        config.stream.frame_rate = rate;
        config.stream.time_base = None;
    }
    if let Some(options) = &cli.filter {
        config.filter.options = options.clone();
    }
    if cli.slice_height.is_some() {
        config.processing.slice_height = cli.slice_height;
    }
    if let Some(threads) = cli.threads {
        config.processing.threads = threads;
    }
    config.filter.commands.extend(cli.commands.iter().cloned());
}

fn flush<W: Write>(
    filter: &mut HueFilter,
    batch: &mut Vec<VideoFrame>,
    writer: &mut RawVideoWriter<W>,
) -> yuv_hue::Result<()> {
    if batch.is_empty() {
        return Ok(());
    }

    for frame in filter.filter_frames(batch)? {
        writer.write_frame(&frame)?;
    }
    batch.clear();
    Ok(())
}
