use std::{
    fs,
    path::PathBuf,
    thread,
    time::{Duration, Instant},
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use reelthread::{
    DecoderOptions, DecoderProbe, DecoderState, FfmpegLogLevel, HardwareBackend, HardwareBackends,
    PixelFormat, VideoDecoder,
};

const CLI_AFTER_HELP: &str = "Examples:\n  reelthread probe input.mp4 --json\n  reelthread decode input.mp4 --frames 120 --out frames --every 10 --progress\n  reelthread decode input.mkv --hardware vaapi,nvdec --seek 5000\n  reelthread devices\n  reelthread completions zsh > _reelthread";

#[derive(Debug, Parser)]
#[command(
    name = "reelthread",
    version,
    about = "Decode video on a background thread with hardware fallback",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Debug, Parser, Clone, Default)]
struct HardwareOptions {
    /// Comma-separated hardware backends to allow (nvdec, quicksync, dxva2, vdpau, vaapi, mediacodec).
    #[arg(long, conflicts_with = "software")]
    hardware: Option<String>,

    /// Decode in software only.
    #[arg(long)]
    software: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Show the stream and the decoders that would be tried")]
    Probe {
        /// Media files to probe.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[command(flatten)]
        hardware: HardwareOptions,
        #[arg(long)]
        json: bool,
    },

    #[command(about = "Decode frames on the background decoder")]
    Decode {
        input: PathBuf,
        #[command(flatten)]
        hardware: HardwareOptions,
        /// Stop after this many frames.
        #[arg(long)]
        frames: Option<u64>,
        /// Seek to this time (ms) before decoding.
        #[arg(long)]
        seek: Option<f64>,
        /// Restart from the beginning at end of stream. Requires --frames.
        #[arg(long = "loop", requires = "frames")]
        looping: bool,
        /// Save frames as PNG into this directory.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Save every Nth frame.
        #[arg(long, default_value_t = 1)]
        every: u64,
        /// Display pixel format (rgba8, rgb8, gray8, yuyv422).
        #[arg(long, default_value = "rgba8")]
        pixel_format: String,
        /// Show a progress bar.
        #[arg(long)]
        progress: bool,
        #[arg(long)]
        json: bool,
    },

    #[command(about = "List hardware device types compiled into FFmpeg")]
    Devices {
        #[arg(long)]
        json: bool,
    },

    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_hardware_backends(value: &str) -> Result<HardwareBackends, String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| HardwareBackend::from_name(name).ok_or(format!("unsupported hardware backend: {name}")))
        .collect::<Result<Vec<_>, _>>()
        .map(HardwareBackends::from_backends)
}

fn allowed_backends(options: &HardwareOptions) -> Result<HardwareBackends, String> {
    if options.software {
        return Ok(HardwareBackends::NONE);
    }
    match &options.hardware {
        Some(list) => parse_hardware_backends(list),
        None => Ok(HardwareBackends::ALL),
    }
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(level) = &global.log_level {
        let parsed: FfmpegLogLevel = level
            .parse()
            .map_err(|_| format!("unsupported --log-level: {level}"))?;
        reelthread::set_ffmpeg_log_level(parsed);
    } else if !global.verbose {
        reelthread::set_ffmpeg_log_level(FfmpegLogLevel::Error);
    }
    Ok(())
}

fn device_label(device: Option<reelthread::DeviceKind>) -> String {
    device.map_or_else(|| "software".to_string(), |device| device.to_string())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Probe {
            inputs,
            hardware,
            json,
        } => {
            let allowed = allowed_backends(&hardware)?;
            let results = DecoderProbe::probe_many(&inputs, allowed);

            if json {
                let payload = inputs
                    .iter()
                    .zip(&results)
                    .map(|(input, result)| match result {
                        Ok(report) => json!({ "input": input, "report": report.to_json() }),
                        Err(error) => json!({ "input": input, "error": error.to_string() }),
                    })
                    .collect::<Vec<_>>();
                println!("{}", serde_json::to_string_pretty(&payload)?);
                return Ok(());
            }

            for (input, result) in inputs.iter().zip(results) {
                println!("{}", input.display().to_string().bold());
                match result {
                    Ok(report) => {
                        println!("  Format: {}", report.format);
                        println!("  Codec: {}", report.codec);
                        println!("  Size: {}x{}", report.width, report.height);
                        println!("  Duration: {:.0} ms", report.duration_ms);
                        println!("  Candidates:");
                        for (rank, candidate) in report.candidates.iter().enumerate() {
                            println!(
                                "    {}. {} ({})",
                                rank + 1,
                                candidate.codec.cyan(),
                                device_label(candidate.device)
                            );
                        }
                    }
                    Err(error) => eprintln!("  {} {}", "error:".red().bold(), error),
                }
            }
        }
        Commands::Decode {
            input,
            hardware,
            frames,
            seek,
            looping,
            out,
            every,
            pixel_format,
            progress,
            json,
        } => {
            let pixel_format = PixelFormat::from_name(&pixel_format)
                .ok_or(format!("unsupported --pixel-format: {pixel_format}"))?;
            let options = DecoderOptions::new()
                .with_looping(looping)
                .with_hardware_backends(allowed_backends(&hardware)?)
                .with_pixel_format(pixel_format);

            if let Some(out) = &out {
                fs::create_dir_all(out)?;
            }

            let mut decoder = VideoDecoder::open(&input, options)?;
            decoder.start()?;
            if let Some(target) = seek {
                decoder.seek(target);
            }

            let progress_bar = if progress {
                let pb = match frames {
                    Some(total) => ProgressBar::new(total),
                    None => ProgressBar::new_spinner(),
                };
                let style = ProgressStyle::with_template(
                    "{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}",
                )?;
                pb.set_style(style.progress_chars("##-"));
                Some(pb)
            } else {
                None
            };

            let started = Instant::now();
            let every = every.max(1);
            let mut decoded = 0_u64;
            let mut saved = 0_u64;
            let mut first_ms = None;
            let mut last_ms = 0.0;

            'decode: while let Some(batch) = decoder.poll_decoded_frames() {
                if batch.is_empty() {
                    thread::sleep(Duration::from_millis(1));
                    continue;
                }

                for frame in batch {
                    first_ms.get_or_insert(frame.time_ms);
                    last_ms = frame.time_ms;

                    if let Some(out) = &out {
                        if decoded % every == 0 {
                            let path = out.join(format!("frame_{decoded:06}.png"));
                            frame.image.to_dynamic_image()?.save(&path)?;
                            saved += 1;
                            if cli.global.verbose {
                                eprintln!("saved {:.0} ms -> {}", frame.time_ms, path.display());
                            }
                        }
                    }

                    decoder.return_frame(frame);
                    decoded += 1;

                    if let Some(pb) = &progress_bar {
                        pb.inc(1);
                    }
                    if frames.is_some_and(|limit| decoded >= limit) {
                        break 'decode;
                    }
                }
            }

            if let Some(pb) = progress_bar {
                pb.finish_with_message("done");
            }

            let state = decoder.decoder_state();
            let elapsed = started.elapsed().as_secs_f64();
            if json {
                let payload = json!({
                    "input": input,
                    "frames": decoded,
                    "saved": saved,
                    "first_ms": first_ms,
                    "last_ms": last_ms,
                    "duration_ms": decoder.duration(),
                    "state": format!("{state:?}"),
                    "elapsed_seconds": elapsed,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else if state == DecoderState::Faulted {
                return Err("decoder faulted".into());
            } else {
                println!(
                    "{} {}",
                    "success:".green().bold(),
                    format!(
                        "Decoded {decoded} frame(s) in {elapsed:.2}s ({:.0} to {last_ms:.0} ms)",
                        first_ms.unwrap_or(0.0)
                    )
                    .green()
                );
            }
        }
        Commands::Devices { json } => {
            let devices = reelthread::available_hardware_devices();
            if json {
                let payload = devices
                    .iter()
                    .map(|device| json!({
                        "device": device.name(),
                        "backend": device.backend().map(HardwareBackend::name),
                    }))
                    .collect::<Vec<_>>();
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else if devices.is_empty() {
                println!("No hardware device types available");
            } else {
                for device in devices {
                    match device.backend() {
                        Some(backend) => println!("{} ({})", device.to_string().cyan(), backend.name()),
                        None => println!("{} {}", device, "(not used for decoding)".dimmed()),
                    }
                }
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "reelthread", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}
