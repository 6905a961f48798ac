mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use std::sync::Arc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use storyreel::analysis::{storyboard_from_drafts, LlmScriptAnalyzer, ScriptAnalyzer};
use storyreel::backends::{AudioEngine, SdWebuiClient, TtsHttpClient};
use storyreel::config;
use storyreel::models::{Effect, Project};
use storyreel::progress::ProgressHub;
use storyreel::render::{self, SegmentSpec};
use storyreel::store::{MemoryStore, Store};
use storyreel::workflow::{FfmpegRenderer, Workflow};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on the
    // verbose flag.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "storyreel=trace,reqwest=debug".to_string()
        } else {
            "storyreel=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Generate {
            script,
            name,
            engine,
            no_subtitles,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(generate(
                &script,
                name,
                engine,
                !no_subtitles,
                cli.config.as_deref(),
            ))
        }
        Commands::Analyze { script, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(analyze(&script, json, cli.config.as_deref()))
        }
        Commands::RenderScene {
            image,
            output,
            duration,
            effect,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(render_scene(
                &image,
                &output,
                duration,
                &effect,
                cli.config.as_deref(),
            ))
        }
        Commands::CheckTools => check_tools(),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("storyreel {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn generate(
    script_path: &Path,
    name: Option<String>,
    engine: AudioEngine,
    subtitles: bool,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    let script = std::fs::read_to_string(script_path)?;
    let name = name.unwrap_or_else(|| {
        script_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "untitled".to_string())
    });

    let store = Arc::new(MemoryStore::new());
    let hub = Arc::new(ProgressHub::new());

    let analyzer = Arc::new(LlmScriptAnalyzer::new(&config.backends)?);
    let images = Arc::new(SdWebuiClient::new(&config.backends)?);
    let speech = Arc::new(TtsHttpClient::new(
        &config.backends,
        config.paths.projects_dir.join("scratch"),
    )?);
    let renderer = Arc::new(FfmpegRenderer::new(
        config.render.clone(),
        config.subtitles.clone(),
    ));

    let project = store.create_project(Project::new(name, script)).await?;
    let project_id = project.id;

    let workflow = Workflow::new(
        store,
        analyzer,
        images,
        speech,
        renderer,
        Arc::clone(&hub),
        config,
    );

    // Print progress lines as the run reports them.
    let mut events = UnboundedReceiverStream::new(hub.subscribe(project_id));
    let printer = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            println!(
                "[{:>5.1}%] {:<9} {}",
                event.progress * 100.0,
                event.stage.as_str(),
                event.message
            );
        }
    });

    let output = workflow.execute(project_id, engine, subtitles).await?;
    printer.abort();

    println!("\nDone: {}", output.display());
    Ok(())
}

async fn analyze(script_path: &Path, json: bool, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let script = std::fs::read_to_string(script_path)?;

    let analyzer = LlmScriptAnalyzer::new(&config.backends)?;
    let drafts = analyzer.analyze(&script).await?;
    let board = storyboard_from_drafts(
        uuid::Uuid::new_v4(),
        drafts,
        config.pipeline.default_scene_duration,
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&board)?);
    } else {
        println!(
            "{} scenes, total {:.1}s\n",
            board.scenes.len(),
            board.total_duration
        );
        for scene in &board.scenes {
            println!(
                "[{:>3}] {:>5.1}s {:<10} {}",
                scene.order,
                scene.duration,
                format!("{:?}", scene.effect).to_lowercase(),
                scene.narration
            );
        }
    }

    Ok(())
}

async fn render_scene(
    image: &Path,
    output: &Path,
    duration: f64,
    effect: &str,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    if !image.exists() {
        anyhow::bail!("Input image does not exist: {:?}", image);
    }

    let effect: Effect = effect
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let spec = SegmentSpec::new(image, duration, effect).with_render_config(&config.render);
    let path = render::render_segment(&spec, output).await?;

    println!("Rendered: {}", path.display());
    Ok(())
}

fn check_tools() -> Result<()> {
    println!("Checking external tools...\n");

    let tools = render::tools::check_tools();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install them to enable all features.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!(
                "  Output: {}x{} @ {} fps",
                config.render.width, config.render.height, config.render.fps
            );
            println!(
                "  Concurrency: images={} audio={} renders={}",
                config.pipeline.max_concurrent_images,
                config.pipeline.max_concurrent_audio,
                config.pipeline.max_concurrent_renders
            );
            println!("  Analysis backend: {}", config.backends.analysis_url);
            println!("  Image backend: {}", config.backends.image_url);
            println!("  Speech backend: {}", config.backends.speech_url);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!(
                "  Output: {}x{} @ {} fps",
                config.render.width, config.render.height, config.render.fps
            );
        }
    }

    Ok(())
}
