use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use deckconfig::{FrameLimit, PowerSetting, WindowSize};

#[derive(Parser, Debug)]
#[command(
    name = "shaderdeck",
    author,
    version,
    about = "Full-screen GLSL visualizations rendered with wgpu"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Configuration file; defaults to `shaderdeck.toml` in the config directory.
    #[arg(long, global = true, value_name = "FILE", env = "SHADERDECK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Additional shader pack root (repeatable); searched after the configured roots.
    #[arg(long = "pack", global = true, value_name = "DIR")]
    pub pack_dirs: Vec<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List built-in visualizations and installed shader packs.
    List(ListArgs),
    /// Open a window and run a visualization until it is closed.
    Run(RunArgs),
    /// Validate shaders with naga and drive the engine headlessly.
    Check(CheckArgs),
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Emit the listing as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Presentation overrides shared by `run` and `check`.
#[derive(Args, Debug, Clone, Default)]
pub struct TuningArgs {
    /// Cap on the device pixel ratio used for the drawing buffer.
    #[arg(long, value_name = "RATIO", value_parser = parse_pixel_ratio)]
    pub max_pixel_ratio: Option<f64>,

    /// Frame-rate cap (0 = uncapped).
    #[arg(long, value_name = "FPS", value_parser = parse_fps)]
    pub fps: Option<FrameLimit>,

    /// Extra preprocessor define passed to the fragment stage (repeatable).
    #[arg(long = "define", short = 'D', value_name = "KEY=VALUE", value_parser = parse_define)]
    pub defines: Vec<(String, String)>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Visualization name or shader pack path; defaults to the configured one.
    #[arg(value_name = "NAME")]
    pub name: Option<String>,

    /// Window inner size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<WindowSize>,

    /// GPU power preference: `low` or `high`.
    #[arg(long, value_name = "PREFERENCE", value_parser = parse_power)]
    pub power: Option<PowerSetting>,

    /// Request a transparent window even for opaque visualizations.
    #[arg(long)]
    pub transparent: bool,

    #[command(flatten)]
    pub tuning: TuningArgs,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Visualization name or shader pack path; every listed one when omitted.
    #[arg(value_name = "NAME")]
    pub name: Option<String>,

    /// Number of headless frames to drive through the engine.
    #[arg(long, value_name = "N", default_value_t = 120)]
    pub frames: u32,

    /// Print the wrapped fragment source handed to the compiler.
    #[arg(long)]
    pub print_source: bool,

    /// Simulated logical surface size.
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size, default_value = "1280x720")]
    pub size: WindowSize,

    /// Simulated device pixel ratio.
    #[arg(long, value_name = "RATIO", value_parser = parse_pixel_ratio, default_value = "1.0")]
    pub device_pixel_ratio: f64,

    #[command(flatten)]
    pub tuning: TuningArgs,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_size(value: &str) -> Result<WindowSize, String> {
    value.parse()
}

pub fn parse_pixel_ratio(value: &str) -> Result<f64, String> {
    let ratio: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid pixel ratio '{value}'"))?;
    if !ratio.is_finite() || ratio <= 0.0 {
        return Err("pixel ratio must be a positive number".into());
    }
    Ok(ratio)
}

pub fn parse_fps(value: &str) -> Result<FrameLimit, String> {
    let fps: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid frame rate '{value}'"))?;
    FrameLimit::from_fps(fps).map_err(|err| err.to_string())
}

pub fn parse_define(value: &str) -> Result<(String, String), String> {
    let (key, val) = value
        .split_once('=')
        .ok_or_else(|| format!("invalid define '{value}'; expected KEY=VALUE"))?;
    let key = key.trim();
    let valid = key
        .chars()
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(format!("define name '{key}' is not a valid identifier"));
    }
    Ok((key.to_string(), val.trim().to_string()))
}

pub fn parse_power(value: &str) -> Result<PowerSetting, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "low" | "low-power" => Ok(PowerSetting::Low),
        "high" | "high-performance" => Ok(PowerSetting::High),
        other => Err(format!("unknown power preference '{other}'; expected low or high")),
    }
}
