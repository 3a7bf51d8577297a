use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use drumstats::batch::ScoredSignal;
use drumstats::report::{AnalysisReport, FeatureSupport};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "drumstats", version, about = "Shock scoring and engagement analytics for drum performance videos")]
struct Cli {
    /// Path to the config file (defaults to the XDG config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score onset/energy signal files for shock value
    Shock {
        /// Signal files or directories containing them
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Number of parallel workers (0 = auto-detect from config)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,

        /// Print results as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Run the lift/rank analysis over a video collection
    Analyze {
        /// Video collection (JSON)
        videos: PathBuf,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Sort videos by id first so rank ties don't depend on file order
        #[arg(long)]
        canonical_order: bool,

        /// Single-line JSON
        #[arg(long)]
        compact: bool,
    },

    /// Write per-video derived metrics as CSV
    Export {
        /// Video collection (JSON)
        videos: PathBuf,

        /// CSV output path
        #[arg(short, long)]
        output: PathBuf,

        /// Sort videos by id first so rank ties don't depend on file order
        #[arg(long)]
        canonical_order: bool,
    },

    /// List observed feature-values and how many videos support each
    Features {
        /// Video collection (JSON)
        videos: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = drumstats::config::AppConfig::load(cli.config.as_deref());

    match cli.command {
        Commands::Shock { paths, jobs, json } => {
            let files = drumstats::input::collect_signal_files(&paths);
            if files.is_empty() {
                anyhow::bail!("No .json signal files found under the given paths.");
            }

            let workers = if jobs > 0 { jobs } else { config.resolve_workers() };
            let result = drumstats::batch::score_signal_files(&files, workers, !json)
                .context("Shock scoring failed")?;

            if json {
                let out = serde_json::to_string_pretty(&result.scored)?;
                println!("{}", out);
            } else {
                print_shock_table(&result.scored);
                println!();
                println!(
                    "Shock scoring complete: {} scored, {} failed",
                    result.scored.len(),
                    result.failed
                );
            }
        }

        Commands::Analyze { videos, output, canonical_order, compact } => {
            let collection = load_collection(&videos, canonical_order)?;
            let report = drumstats::report::generate_structured_outputs(
                &collection,
                &config.analysis,
                &config.buckets,
            );

            let json = if compact {
                serde_json::to_string(&report)?
            } else {
                serde_json::to_string_pretty(&report)?
            };

            match output {
                Some(path) => {
                    std::fs::write(&path, json + "\n")
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    print_report_summary(&report);
                    println!();
                    println!("Report written to {}", path.display());
                }
                None => println!("{}", json),
            }
        }

        Commands::Export { videos, output, canonical_order } => {
            let collection = load_collection(&videos, canonical_order)?;
            let report = drumstats::report::generate_structured_outputs(
                &collection,
                &config.analysis,
                &config.buckets,
            );
            if let Some(err) = &report.error {
                log::warn!("{}", err);
            }

            let file = File::create(&output)
                .with_context(|| format!("Failed to create {}", output.display()))?;
            let rows = drumstats::export::write_comparison_csv(BufWriter::new(file), &report.per_video_comparison)
                .context("CSV export failed")?;
            println!("Exported {} videos to {}", rows, output.display());
        }

        Commands::Features { videos } => {
            let collection = load_collection(&videos, false)?;
            let support = drumstats::report::feature_support(&collection, &config.analysis, &config.buckets);

            if support.is_empty() {
                println!("No features found.");
                return Ok(());
            }

            print_feature_table(&support);
        }
    }

    Ok(())
}

fn load_collection(path: &Path, canonical_order: bool) -> Result<Vec<drumstats::models::VideoRecord>> {
    let mut videos = drumstats::input::load_videos(path).context("Failed to load video collection")?;
    if canonical_order {
        drumstats::input::canonical_order(&mut videos);
    }
    log::info!("Loaded {} videos from {}", videos.len(), path.display());
    Ok(videos)
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let head: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        s.to_string()
    }
}

/// Print a table of shock scores.
fn print_shock_table(scored: &[ScoredSignal]) {
    println!(
        "{:<30} {:>6} {:>7}  {:>5} {:>5} {:>5}  {:>5}",
        "Video", "Onsets", "Regime", "Tmp", "Vol", "Unu", "Shock"
    );
    println!("{}", "-".repeat(75));

    for s in scored {
        println!(
            "{:<30} {:>6} {:>7}  {:>5.1} {:>5.1} {:>5.1}  {:>5}",
            truncate(&s.video_id, 30),
            s.onsets,
            s.score.regime.label(),
            s.score.components.tempo_spikes,
            s.score.components.volume_spikes,
            s.score.components.unusual_patterns,
            s.score.shock_value,
        );
    }

    println!();
    println!("Tmp=Tempo spikes  Vol=Volume spikes  Unu=Unusual patterns");
}

/// Print the headline numbers of a report.
fn print_report_summary(report: &AnalysisReport) {
    let m = &report.analysis_metadata;
    if let Some(err) = &report.error {
        println!("{} ({} videos in collection)", err, m.total_videos);
        return;
    }

    println!(
        "Analyzed {} of {} videos ({} instagram, {} tiktok), top cohort {}",
        m.analyzed_videos, m.total_videos, m.platform_counts.instagram, m.platform_counts.tiktok, m.top_cohort_size
    );
    println!(
        "Baseline: {:.0}% high views, {:.0}% high likes",
        m.baseline_high_view_rate * 100.0,
        m.baseline_high_like_rate * 100.0
    );
    println!();

    if report.what_seems_working.is_empty() {
        println!("No feature-value beats the baseline yet.");
        return;
    }

    println!(
        "{:<40} {:>4} {:>6} {:>6} {:>6}",
        "What seems to work", "N", "LiftV", "LiftL", "Cons"
    );
    println!("{}", "-".repeat(66));
    for w in report.what_seems_working.iter().take(10) {
        println!(
            "{:<40} {:>4} {:>6.2} {:>6.2} {:>5.0}%",
            truncate(&w.lift.feature.to_string(), 40),
            w.lift.sample_size,
            w.lift.lift_views,
            w.lift.lift_likes,
            w.consistency_score * 100.0,
        );
    }
}

/// Print feature support counts.
fn print_feature_table(support: &[FeatureSupport]) {
    println!("{:<45} {:>6} {:>8}", "Feature", "Videos", "Analyzed");
    println!("{}", "-".repeat(61));

    let mut suppressed = 0usize;
    for s in support {
        let marker = if s.suppressed {
            suppressed += 1;
            "  (suppressed)"
        } else {
            ""
        };
        println!(
            "{:<45} {:>6} {:>8}{}",
            truncate(&s.feature.to_string(), 45),
            s.videos,
            s.analyzed,
            marker
        );
    }

    println!();
    println!(
        "{} feature-values, {} below the minimum sample size",
        support.len(),
        suppressed
    );
}
