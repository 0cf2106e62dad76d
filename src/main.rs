use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;
use tracing::{info, warn};

use esports_clipper::captions::CaptionFetcher;
use esports_clipper::config::Config;
use esports_clipper::discovery::{load_url_list, MatchScraper};
use esports_clipper::download::VideoDownloader;
use esports_clipper::records::RecordStore;
use esports_clipper::refine::CaptionRefiner;
use esports_clipper::segment::SegmentPipeline;
use esports_clipper::transcribe::Transcriber;
use esports_clipper::trim::TrimStage;
use esports_clipper::video::VideoProcessor;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("esports_clipper=info,warn")
        .init();

    let matches = Command::new("Esports Clipper")
        .version("0.1.0")
        .about("Builds a subtitle-aligned clip dataset from esports match broadcasts")
        .subcommand_required(true)
        .subcommand(
            Command::new("discover")
                .about("Scrape match pages into the record store")
                .arg(
                    Arg::new("video-list")
                        .short('l')
                        .long("video-list")
                        .value_name("FILE")
                        .help("JSON file of match page URLs"),
                ),
        )
        .subcommand(Command::new("download").about("Download raw videos for recorded matches"))
        .subcommand(Command::new("trim").about("Cut the pre-match lead-in off raw videos"))
        .subcommand(
            Command::new("fetch-captions")
                .about("Download caption documents from the captioning service"),
        )
        .subcommand(
            Command::new("transcribe")
                .about("Transcribe videos the captioning service has no track for"),
        )
        .subcommand(
            Command::new("segment")
                .about("Cut trimmed videos into caption-aligned clips")
                .arg(
                    Arg::new("interval")
                        .short('i')
                        .long("interval")
                        .value_name("SECONDS")
                        .help("Minimum clip length in seconds"),
                )
                .arg(
                    Arg::new("output-dir")
                        .short('o')
                        .long("output-dir")
                        .value_name("DIR")
                        .help("Root directory for clip output"),
                ),
        )
        .subcommand(Command::new("refine").about("Rewrite clip captions into fluent commentary"))
        .subcommand(
            Command::new("keyframes")
                .about("Extract representative frames from produced clips")
                .arg(
                    Arg::new("count")
                        .short('n')
                        .long("count")
                        .value_name("NUM")
                        .help("Frames per clip")
                        .default_value("3"),
                ),
        )
        .get_matches();

    // Load configuration
    let mut config = Config::load().unwrap_or_else(|e| {
        warn!("Failed to load config, using defaults: {}", e);
        Config::default()
    });

    // Command-line overrides must land before validation
    if let Some(("segment", sub)) = matches.subcommand() {
        if let Some(interval) = sub.get_one::<String>("interval") {
            config.segment.interval_seconds = interval.parse()?;
        }
        if let Some(output_dir) = sub.get_one::<String>("output-dir") {
            config.segment.output_dir = PathBuf::from(output_dir);
        }
    }
    config.validate()?;

    info!("🚀 Esports Clipper starting...");

    match matches.subcommand() {
        Some(("discover", sub)) => run_discover(&config, sub).await,
        Some(("download", _)) => run_download(&config).await,
        Some(("trim", _)) => run_trim(&config).await,
        Some(("fetch-captions", _)) => run_fetch_captions(&config).await,
        Some(("transcribe", _)) => run_transcribe(&config).await,
        Some(("segment", _)) => run_segment(&config).await,
        Some(("refine", _)) => run_refine(&config).await,
        Some(("keyframes", sub)) => run_keyframes(&config, sub).await,
        _ => unreachable!("subcommand required"),
    }
}

async fn run_discover(config: &Config, sub: &ArgMatches) -> Result<()> {
    let list_path = sub
        .get_one::<String>("video-list")
        .map(PathBuf::from)
        .unwrap_or_else(|| config.discovery.video_list.clone());

    let urls = load_url_list(&list_path).await?;
    info!("📁 {} match URLs in {}", urls.len(), list_path.display());

    let store = RecordStore::new(&config.discovery.record_file);
    let scraper = MatchScraper::new(
        config.discovery.request_timeout_seconds,
        config.discovery.season_year,
        config.retry.policy(),
    );

    let appended = scraper.discover(&urls, &store).await?;
    info!("🎉 Recorded {} new matches", appended);
    Ok(())
}

async fn run_download(config: &Config) -> Result<()> {
    let store = RecordStore::new(&config.discovery.record_file);
    let records = store.load()?;
    let downloader = VideoDownloader::new(config.download.clone(), config.retry.policy());

    let mut downloaded = 0;
    for record in &records {
        downloaded += downloader
            .download_record(record, &config.segment.raw_video_dir)
            .await?;
    }

    info!("🎉 Downloaded {} videos from {} matches", downloaded, records.len());
    Ok(())
}

async fn run_trim(config: &Config) -> Result<()> {
    let store = RecordStore::new(&config.discovery.record_file);
    let records = store.load()?;
    let stage = TrimStage::new(VideoProcessor::new());

    let trimmed = stage
        .trim_records(
            &records,
            &config.segment.raw_video_dir,
            &config.segment.trimmed_video_dir,
        )
        .await?;

    info!("🎉 Trimmed {} videos", trimmed);
    Ok(())
}

async fn run_fetch_captions(config: &Config) -> Result<()> {
    let store = RecordStore::new(&config.discovery.record_file);
    let records = store.load()?;
    let fetcher = CaptionFetcher::new(config.captions.clone(), config.retry.policy())?;

    let mut written = 0;
    for record in &records {
        match fetcher
            .fetch_for_record(record, &config.segment.caption_dir)
            .await
        {
            Ok(n) => written += n,
            Err(e) => warn!("Caption fetch failed for {}: {}", record.url, e),
        }
    }

    info!("🎉 Fetched {} caption documents", written);
    Ok(())
}

async fn run_transcribe(config: &Config) -> Result<()> {
    let transcriber = Transcriber::new(config.transcription.clone());
    let written = transcriber
        .transcribe_missing(
            &config.segment.trimmed_video_dir,
            &config.segment.caption_dir,
        )
        .await?;

    info!("🎉 Transcribed {} videos", written);
    Ok(())
}

async fn run_segment(config: &Config) -> Result<()> {
    let pipeline = SegmentPipeline::new(config.segment.clone());
    let summary = pipeline.run().await?;

    info!("✅ Clips produced: {}", summary.clips_produced);
    info!("❌ Failed windows: {}", summary.clips_failed);
    info!("⏭️  Videos skipped: {}", summary.videos_skipped);
    info!(
        "📊 Uncovered: {:.3}s across {} skipped intervals",
        summary.uncovered_seconds, summary.intervals_skipped
    );
    Ok(())
}

async fn run_refine(config: &Config) -> Result<()> {
    let refiner = CaptionRefiner::new(config.refine.clone(), config.retry.policy())?;
    let refined = refiner
        .refine_directory(
            &config.segment.output_dir.join("subtitles"),
            &config.segment.output_dir.join("videos"),
            &config.refine.results_file,
        )
        .await?;

    info!("🎉 Refined {} clip captions", refined);
    Ok(())
}

async fn run_keyframes(config: &Config, sub: &ArgMatches) -> Result<()> {
    let count: usize = sub
        .get_one::<String>("count")
        .map(|s| s.as_str())
        .unwrap_or("3")
        .parse()?;

    let video = VideoProcessor::new();
    let clips_dir = config.segment.output_dir.join("videos");
    let frames_dir = config.segment.output_dir.join("keyframes");

    let clips = video.discover_videos(&clips_dir)?;
    let mut extracted = 0;
    for clip in &clips {
        match video.extract_keyframes(clip, &frames_dir, count).await {
            Ok(frames) => extracted += frames.len(),
            Err(e) => warn!("Keyframe extraction failed for {}: {}", clip.display(), e),
        }
    }

    info!("🎉 Extracted {} frames from {} clips", extracted, clips.len());
    Ok(())
}
