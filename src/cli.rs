use clap::{Parser, Subcommand};
use std::path::PathBuf;
use storyreel::backends::AudioEngine;

#[derive(Parser)]
#[command(name = "storyreel")]
#[command(author, version, about = "Narration-to-video generation pipeline")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full pipeline on a narration script
    Generate {
        /// Text file containing the narration script
        #[arg(required = true)]
        script: PathBuf,

        /// Project name (defaults to the script file stem)
        #[arg(long)]
        name: Option<String>,

        /// Speech engine for narration synthesis
        #[arg(long, value_enum, default_value = "tts")]
        engine: AudioEngine,

        /// Skip subtitle burn-in
        #[arg(long)]
        no_subtitles: bool,
    },

    /// Analyze a script into a storyboard and print it
    Analyze {
        /// Text file containing the narration script
        #[arg(required = true)]
        script: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Render a single scene clip from a still image
    RenderScene {
        /// Input image
        #[arg(required = true)]
        image: PathBuf,

        /// Output video path
        #[arg(short, long, default_value = "scene.mp4")]
        output: PathBuf,

        /// Clip duration in seconds
        #[arg(short, long, default_value = "3.0")]
        duration: f64,

        /// Ken Burns effect variant
        #[arg(short, long, default_value = "zoom_in")]
        effect: String,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
