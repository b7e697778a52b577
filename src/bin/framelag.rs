use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use framelag::{
    AnalysisOptions, AnalysisReport, Analyzer, ClassificationThresholds, FfmpegLogLevel,
    FrameSource, FrameStatus, ProgressCallback, ProgressInfo, VideoSource, format_timestamp,
    report::round2,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  framelag analyze capture.mp4 --out annotated.mp4\n  framelag analyze capture.mp4 --out annotated.mp4 --json --anomalies-only\n  framelag info capture.mp4 --json\n  framelag completions zsh > _framelag";

#[derive(Debug, Parser)]
#[command(
    name = "framelag",
    version,
    about = "Detect dropped, lagging and frozen frames in a video",
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
    /// Show debug logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress bar while analysing.
    #[arg(long, global = true)]
    progress: bool,

    /// Allow overwriting existing output files.
    #[arg(long, global = true)]
    overwrite: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Analyse a video and write an annotated copy.
    #[command(
        about = "Analyse frame timing and write an annotated video",
        after_help = "Examples:\n  framelag analyze capture.mp4 --out annotated.mp4\n  framelag analyze capture.mp4 --out annotated.mp4 --jitter-multiplier 1.5 --freeze-cutoff 0.99"
    )]
    Analyze {
        /// Input video path.
        input: PathBuf,
        /// Annotated output video path.
        #[arg(long)]
        out: PathBuf,
        /// Gaps longer than this many expected frame intervals are flagged.
        #[arg(long, default_value_t = framelag::configuration::DEFAULT_JITTER_MULTIPLIER)]
        jitter_multiplier: f64,
        /// Similarity above which a frame counts as frozen.
        #[arg(long, default_value_t = framelag::configuration::DEFAULT_FREEZE_SIMILARITY_CUTOFF)]
        freeze_cutoff: f64,
        /// Width frames are scaled to before similarity scoring.
        #[arg(long, default_value_t = framelag::configuration::DEFAULT_SCORING_WIDTH)]
        score_width: u32,
        /// Height frames are scaled to before similarity scoring.
        #[arg(long, default_value_t = framelag::configuration::DEFAULT_SCORING_HEIGHT)]
        score_height: u32,
        /// Keep the raw encode instead of re-encoding for browser playback.
        #[arg(long)]
        no_transcode: bool,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
        /// Only list frames that are not normal.
        #[arg(long)]
        anomalies_only: bool,
    },

    /// Print stream information and the thresholds an analysis would use.
    #[command(
        about = "Print stream information",
        after_help = "Examples:\n  framelag info capture.mp4\n  framelag info capture.mp4 --json"
    )]
    Info {
        /// Input video path.
        input: PathBuf,

        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_log_level(value: &str) -> Option<FfmpegLogLevel> {
    value.parse().ok()
}

fn status_text(status: FrameStatus) -> colored::ColoredString {
    match status {
        FrameStatus::Normal => status.label().green(),
        FrameStatus::FrameDropOrLag => status.label().red().bold(),
        FrameStatus::FrozenOrMerge => status.label().yellow().bold(),
    }
}

fn ensure_writable_path(path: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        if overwrite {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("overwriting {}", path.display()).yellow()
            );
        } else {
            return Err(format!(
                "output already exists: {} (use --overwrite to replace)",
                path.display()
            )
            .into());
        }
    }
    Ok(())
}

fn init_logging(global: &GlobalOptions) {
    let default_level = if global.verbose { "debug" } else { "info" };
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_level),
    )
    .format_timestamp(None)
    .try_init();
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(level) = &global.log_level {
        let parsed = parse_log_level(level).ok_or(format!("unsupported --log-level: {level}"))?;
        framelag::set_ffmpeg_log_level(parsed);
    }
    Ok(())
}

/// Drives an indicatif bar from analysis progress.
struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.green} {bar:40.cyan/blue} {pos}/{len} frames {msg}",
        )?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Some(total) = info.total {
            self.bar.set_length(total.max(info.current));
        }
        self.bar.set_position(info.current);
        let position = info
            .current_timestamp_ms
            .map(format_timestamp)
            .unwrap_or_default();
        self.bar
            .set_message(format!("{position} ({} flagged)", info.anomalies));
    }
}

fn report_json(report: &AnalysisReport, anomalies_only: bool) -> serde_json::Value {
    let summary = report.summary().rounded();
    let results: Vec<serde_json::Value> = report
        .records
        .iter()
        .filter(|record| !anomalies_only || record.status.is_anomaly())
        .map(|record| {
            json!({
                "frame": record.frame_index,
                "timestamp": round2(record.timestamp_ms),
                "gap": round2(record.gap_ms),
                "status": record.status.label(),
            })
        })
        .collect();

    json!({
        "results": results,
        "summary": {
            "total_frames": summary.total_frames,
            "issues_found": summary.issues_found,
            "avg_gap": summary.avg_gap_ms,
            "fps": summary.fps,
        },
        "video_path": report.output_path.display().to_string(),
        "playback_optimized": report.playback_optimized,
    })
}

fn print_report(report: &AnalysisReport, anomalies_only: bool) {
    for record in &report.records {
        if anomalies_only && !record.status.is_anomaly() {
            continue;
        }
        println!(
            "{:>6}  {}  gap {:>8.2} ms  ssim {:.4}  {}",
            record.frame_index,
            format_timestamp(record.timestamp_ms),
            record.gap_ms,
            record.similarity,
            status_text(record.status),
        );
    }

    let summary = report.summary().rounded();
    println!();
    println!("{}", "Summary".bold());
    println!("Frames: {}", summary.total_frames);
    println!(
        "Issues: {} ({} drop/lag, {} frozen/merge)",
        if summary.issues_found == 0 {
            summary.issues_found.to_string().green()
        } else {
            summary.issues_found.to_string().red().bold()
        },
        summary.lag_frames,
        summary.frozen_frames,
    );
    println!("Mean gap: {:.2} ms", summary.avg_gap_ms);
    println!("FPS: {:.2}", summary.fps);
    println!("Output: {}", report.output_path.display());
    if !report.playback_optimized {
        eprintln!(
            "{} {}",
            "warning:".yellow().bold(),
            "output was not re-encoded for browser playback".yellow()
        );
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&cli.global);
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Analyze {
            input,
            out,
            jitter_multiplier,
            freeze_cutoff,
            score_width,
            score_height,
            no_transcode,
            json,
            anomalies_only,
        } => {
            ensure_writable_path(&out, cli.global.overwrite)?;

            let mut options = AnalysisOptions::new()
                .with_jitter_multiplier(jitter_multiplier)
                .with_freeze_similarity_cutoff(freeze_cutoff)
                .with_scoring_resolution(score_width, score_height);

            let progress = if cli.global.progress {
                let progress = Arc::new(TerminalProgress::new()?);
                options = options.with_progress(progress.clone());
                Some(progress)
            } else {
                None
            };

            let mut analyzer = Analyzer::new(options);
            if no_transcode {
                analyzer = analyzer.without_transcoding();
            }

            let result = analyzer.run(&input, &out);
            if let Some(progress) = &progress {
                progress.finish();
            }
            let report = result?;

            if json {
                let payload = report_json(&report, anomalies_only);
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                print_report(&report, anomalies_only);
            }
        }
        Commands::Info { input, json } => {
            let source = VideoSource::open(&input)?;
            let info = source.info();
            let thresholds =
                ClassificationThresholds::from_fps(info.frames_per_second, &AnalysisOptions::new());
            if json {
                let payload = json!({
                    "format": info.format,
                    "codec": info.codec,
                    "width": info.width,
                    "height": info.height,
                    "fps": info.frames_per_second,
                    "frame_count": info.frame_count,
                    "duration_seconds": info.duration.as_secs_f64(),
                    "expected_delta_ms": round2(thresholds.expected_delta_ms),
                    "jitter_threshold_ms": round2(thresholds.jitter_threshold_ms),
                    "freeze_similarity_cutoff": thresholds.freeze_similarity_cutoff,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Format: {}", info.format);
                println!(
                    "Video: {}x{} @ {:.2} fps [{}]",
                    info.width, info.height, info.frames_per_second, info.codec,
                );
                println!("Duration: {:?}", info.duration);
                println!("Frames: ~{}", info.frame_count);
                println!(
                    "Expected gap: {:.2} ms, flagged above {:.2} ms",
                    thresholds.expected_delta_ms, thresholds.jitter_threshold_ms,
                );
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "framelag", &mut std::io::stdout());
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
