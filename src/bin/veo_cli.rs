//! veo-cli: command-line front end for the GenAIPro VEO API
//!
//! Usage:
//!   veo-cli quota                                   Show remaining credits
//!   veo-cli history [--page N] [--page-size N]      List past generations
//!   veo-cli text-to-video <prompt> [options]        Generate a video
//!   veo-cli image <prompt> [options]                Generate images
//!   veo-cli batch <prompts.txt|items.csv> [options] Run a prompt file
//!   veo-cli jobs                                    List resumable batch jobs

use anyhow::{anyhow, bail, Context, Result};
use futures::StreamExt;
use genaipro_veo::batch::{
    broll_csv, failed_csv, items_from_csv, results_csv, validate_prompts, AutomationEngine,
    BatchItem, BrollPipeline, ContentKind, JobStore,
};
use genaipro_veo::pipeline::encode::{encode_error, encode_event};
use genaipro_veo::telemetry::{
    CompositeProgressSink, LoggingProgressSink, ProgressEvent, ProgressSink,
};
use genaipro_veo::types::{AspectRatio, CreateImageRequest, TextToVideoRequest};
use genaipro_veo::{GenerationResult, GenerationStream, Settings, VeoClient, VeoClientBuilder};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let outcome = match args[1].as_str() {
        "quota" => cmd_quota().await,
        "history" => cmd_history(&args[2..]).await,
        "text-to-video" => cmd_text_to_video(&args[2..]).await,
        "image" => cmd_image(&args[2..]).await,
        "batch" => cmd_batch(&args[2..]).await,
        "jobs" => cmd_jobs().await,
        "version" | "--version" | "-V" => {
            cmd_version();
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = outcome {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn print_usage() {
    println!(
        r#"veo-cli: GenAIPro VEO command-line tool

USAGE:
    veo-cli <COMMAND> [OPTIONS]

COMMANDS:
    quota                               Show credit usage
    history [--page N] [--page-size N]  List past generations
    text-to-video <prompt>              Generate a video
        --portrait                      Portrait instead of landscape
        --count N                       Number of videos (1-4)
        --sse                           Print events as SSE frames
    image <prompt>                      Generate images
        --aspect <landscape|portrait|square>
        --count N                       Number of images (1-4)
        --reference <path>              Reference image
    batch <prompts.txt|items.csv>       Generate one item per line or CSV row
        --images | --videos             Content kind (default: videos)
        --broll                         Images first, then a video from each image
        --portrait                      Portrait instead of landscape
        --start-frame <path>            Start frame for every video
        --resume <job_id>               Continue a saved job
        --csv <path>                    Write results (and retryable failures) as CSV
    jobs                                List resumable batch jobs
    version                             Show version information
    help                                Show this help message

ENVIRONMENT:
    VEO_API_KEY                         API key (also read from the OS keyring)
    VEO_CONFIG                          YAML settings file
    VEO_BASE_URL, VEO_PROGRESS_DIR, ... Settings overrides
    RUST_LOG                            Log filter (default: info)"#
    );
}

fn cmd_version() {
    println!("veo-cli {}", env!("CARGO_PKG_VERSION"));
}

fn load_settings() -> Result<Settings> {
    let settings = match std::env::var("VEO_CONFIG") {
        Ok(path) if !path.trim().is_empty() => Settings::from_yaml_file(&path)
            .with_context(|| format!("loading settings from {path}"))?,
        _ => Settings::from_env()?,
    };
    settings.validate()?;
    Ok(settings)
}

fn build_client(settings: &Settings) -> Result<VeoClient> {
    Ok(VeoClientBuilder::from_settings(settings).build()?)
}

fn flag(args: &[String], name: &str) -> bool {
    args.iter().any(|a| a == name)
}

fn option<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn parsed_option<T: std::str::FromStr>(args: &[String], name: &str) -> Result<Option<T>> {
    match option(args, name) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("invalid value for {name}: {raw}")),
        None => Ok(None),
    }
}

/// First argument that is neither a flag nor a flag's value.
fn positional<'a>(args: &'a [String], valued: &[&str]) -> Option<&'a str> {
    let mut skip = false;
    for arg in args {
        if skip {
            skip = false;
            continue;
        }
        if valued.contains(&arg.as_str()) {
            skip = true;
            continue;
        }
        if !arg.starts_with("--") {
            return Some(arg);
        }
    }
    None
}

async fn cmd_quota() -> Result<()> {
    let client = build_client(&load_settings()?)?;
    let quota = client.quota().await?;
    println!("Total:     {}", quota.total_quota);
    println!("Used:      {}", quota.used_quota);
    println!("Available: {}", quota.available_quota);
    println!("Usage:     {:.1}%", quota.usage_ratio() * 100.0);
    Ok(())
}

async fn cmd_history(args: &[String]) -> Result<()> {
    let page = parsed_option(args, "--page")?.unwrap_or(1);
    let page_size = parsed_option(args, "--page-size")?.unwrap_or(20);
    let client = build_client(&load_settings()?)?;
    let history = client.histories(page, page_size).await?;
    if history.data.is_empty() {
        println!("No generations found.");
        return Ok(());
    }
    for item in &history.data {
        println!(
            "{:<12} {:<10} {}",
            item.id.as_deref().unwrap_or("-"),
            item.status().as_str(),
            item.prompt
        );
        for url in item.urls() {
            println!("{:>23} {url}", "");
        }
    }
    if let Some(total) = history.total {
        println!("\n{} of {total} shown", history.data.len());
    }
    Ok(())
}

async fn cmd_text_to_video(args: &[String]) -> Result<()> {
    let prompt = positional(args, &["--count"])
        .ok_or_else(|| anyhow!("usage: veo-cli text-to-video <prompt> [--portrait] [--count N]"))?;
    let aspect = if flag(args, "--portrait") {
        AspectRatio::Portrait
    } else {
        AspectRatio::Landscape
    };
    let request = TextToVideoRequest::new(prompt)
        .aspect_ratio(aspect)
        .number_of_videos(parsed_option(args, "--count")?.unwrap_or(1));

    let client = build_client(&load_settings()?)?;
    let stream = client.text_to_video(request).await?;
    if flag(args, "--sse") {
        relay_sse(stream).await;
        Ok(())
    } else {
        follow(stream).await
    }
}

async fn cmd_image(args: &[String]) -> Result<()> {
    let prompt = positional(args, &["--aspect", "--count", "--reference"])
        .ok_or_else(|| anyhow!("usage: veo-cli image <prompt> [--aspect A] [--count N]"))?;
    let aspect: AspectRatio = match option(args, "--aspect") {
        Some(raw) => raw.parse()?,
        None => AspectRatio::Landscape,
    };
    let mut request = CreateImageRequest::new(prompt)
        .aspect_ratio(aspect)
        .number_of_images(parsed_option(args, "--count")?.unwrap_or(1));
    if let Some(path) = option(args, "--reference") {
        request = request.reference_image(path);
    }

    let client = build_client(&load_settings()?)?;
    follow(client.create_image(request).await?).await
}

/// Print progress lines and the final URLs.
async fn follow(stream: GenerationStream) -> Result<()> {
    let mut updates = stream.with_progress();
    let mut last = None;
    while let Some(update) = updates.next().await {
        let update = update?;
        match GenerationResult::from_terminal(&update.event) {
            Some(GenerationResult::Completed(media)) => {
                for url in media.urls {
                    println!("{url}");
                }
                return Ok(());
            }
            Some(GenerationResult::Failed { message }) => bail!("generation failed: {message}"),
            None => {
                if last != Some(update.progress) {
                    last = Some(update.progress);
                    eprintln!("progress: {}%", update.progress);
                }
            }
        }
    }
    bail!("stream ended without a result")
}

/// Re-emit reconciled events as SSE frames on stdout.
async fn relay_sse(mut stream: GenerationStream) {
    while let Some(item) = stream.next().await {
        match item {
            Ok(event) => print!("{}", encode_event(&event)),
            Err(e) => {
                print!("{}", encode_error(&e));
                break;
            }
        }
    }
}

/// Prints item outcomes as they happen.
struct ConsoleSink;

#[async_trait::async_trait]
impl ProgressSink for ConsoleSink {
    async fn report(&self, event: ProgressEvent) -> genaipro_veo::Result<()> {
        match event {
            ProgressEvent::ItemCompleted { id, urls } => {
                println!("[done]   {id}");
                for url in urls {
                    println!("         {url}");
                }
            }
            ProgressEvent::ItemFailed {
                id,
                error,
                category,
            } => println!("[failed] {id} ({category}): {error}"),
            ProgressEvent::StepStarted {
                step,
                total_steps,
                name,
            } => println!("== step {step}/{total_steps}: {name}"),
            _ => {}
        }
        Ok(())
    }
}

const BATCH_VALUED: &[&str] = &["--resume", "--start-frame", "--csv"];

async fn read_batch_items(path: &Path) -> Result<Vec<BatchItem>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let items = if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("csv")) {
        items_from_csv(&text)?
    } else {
        BatchItem::from_lines(&text)
    };
    let (valid, rejected) = validate_prompts(items);
    for reason in &rejected {
        eprintln!("skipped {reason}");
    }
    if valid.is_empty() {
        bail!("no usable prompts in {}", path.display());
    }
    Ok(valid)
}

fn batch_input(args: &[String]) -> Result<PathBuf> {
    positional(args, BATCH_VALUED)
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("usage: veo-cli batch <prompts.txt|items.csv> [--images|--videos|--broll]"))
}

async fn write_csv(path: &Path, contents: String) -> Result<()> {
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

/// `results.csv` -> `results_failed.csv`
fn failed_csv_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "results".to_string());
    path.with_file_name(format!("{stem}_failed.csv"))
}

fn batch_sink() -> Arc<dyn ProgressSink> {
    Arc::new(
        CompositeProgressSink::new()
            .add_sink(Arc::new(ConsoleSink))
            .add_sink(Arc::new(LoggingProgressSink)),
    )
}

async fn cmd_batch(args: &[String]) -> Result<()> {
    if flag(args, "--broll") {
        return cmd_broll(args).await;
    }
    let settings = load_settings()?;
    let store = JobStore::new(settings.progress_dir.clone());
    let mut kind = if flag(args, "--images") {
        ContentKind::Images
    } else {
        ContentKind::Videos
    };
    let mut aspect = if flag(args, "--portrait") {
        AspectRatio::Portrait
    } else {
        AspectRatio::Landscape
    };

    let (job, items) = match option(args, "--resume") {
        Some(job_id) => {
            let job = store
                .load(job_id)
                .await?
                .ok_or_else(|| anyhow!("no saved job '{job_id}' in {}", store.dir().display()))?;
            kind = job.mode.parse().unwrap_or(kind);
            if let Some(saved) = job.settings.get("aspect_ratio") {
                aspect = serde_json::from_value(saved.clone()).unwrap_or(aspect);
            }
            let pending = job.pending_items();
            println!(
                "Resuming job {} ({} of {} left)",
                job.job_id,
                pending.len(),
                job.total_count()
            );
            (job, pending)
        }
        None => {
            let valid = read_batch_items(&batch_input(args)?).await?;
            let mut job_settings = serde_json::Map::new();
            job_settings.insert("aspect_ratio".into(), serde_json::to_value(aspect)?);
            let job = store.create(kind.as_str(), valid.clone(), job_settings);
            println!("Started job {} with {} prompts", job.job_id, valid.len());
            (job, valid)
        }
    };

    let client = build_client(&settings)?;
    let mut engine = AutomationEngine::new(client, kind)
        .with_sink(batch_sink())
        .with_job(store, job);
    if let Some(frame) = option(args, "--start-frame") {
        engine = engine.with_start_frame(frame);
    }
    let engine = Arc::new(engine);

    let stopper = engine.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("stopping after running items finish...");
            stopper.request_stop();
        }
    });

    let report = engine.run(items, aspect).await;
    println!(
        "\n{} completed, {} failed",
        report.completed, report.failed
    );
    if let Some(path) = option(args, "--csv").map(PathBuf::from) {
        write_csv(&path, results_csv(&report.results)?).await?;
        if report.failed > 0 {
            write_csv(&failed_csv_path(&path), failed_csv(&report.results, true)?).await?;
        }
    }
    if let Some(job) = engine.job_snapshot().await {
        if job.is_resumable() {
            println!("Resume with: veo-cli batch --resume {}", job.job_id);
        }
    }
    Ok(())
}

async fn cmd_broll(args: &[String]) -> Result<()> {
    if option(args, "--resume").is_some() {
        bail!("--broll runs cannot be resumed");
    }
    let settings = load_settings()?;
    let aspect = if flag(args, "--portrait") {
        AspectRatio::Portrait
    } else {
        AspectRatio::Landscape
    };
    let items = read_batch_items(&batch_input(args)?).await?;
    println!("Started B-roll run with {} prompts", items.len());

    let client = build_client(&settings)?;
    let sink = batch_sink();
    let pipeline = Arc::new(
        BrollPipeline::with_engines(
            client.clone(),
            AutomationEngine::new(client.clone(), ContentKind::Images).with_sink(sink.clone()),
            AutomationEngine::new(client, ContentKind::Videos).with_sink(sink.clone()),
        )
        .with_sink(sink),
    );

    let stopper = pipeline.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("stopping after running items finish...");
            stopper.request_stop();
        }
    });

    let results = pipeline.run(items, aspect).await;
    let completed = results.iter().filter(|r| r.is_completed()).count();
    println!("\n{} completed, {} failed", completed, results.len() - completed);
    if let Some(path) = option(args, "--csv").map(PathBuf::from) {
        write_csv(&path, broll_csv(&results)?).await?;
    }
    Ok(())
}

async fn cmd_jobs() -> Result<()> {
    let settings = load_settings()?;
    let store = JobStore::new(settings.progress_dir.clone());
    let jobs = store.list_resumable().await?;
    if jobs.is_empty() {
        println!("No resumable jobs in {}", store.dir().display());
        return Ok(());
    }
    for job in jobs {
        println!(
            "{}  {:<7} {:<8} {}/{} done, {} failed  {}",
            job.job_id,
            job.mode,
            job.status.as_str(),
            job.completed,
            job.total,
            job.failed,
            job.last_updated.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}
