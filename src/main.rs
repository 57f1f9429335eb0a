use crate::package::PackageInfo;
use clap::Parser;
use std::fs;
use std::io;
use std::path::PathBuf;
use stepvibes::{
    normalize, parse_cms_data, parse_csq_data, parse_normalized_json, ChartError, ChartType,
    VibesBuilder,
};

mod package;

fn main() {
    let result = main_result();
    std::process::exit(match result {
        Ok(()) => 0,
        Err(err) => {
            // use Display instead of Debug for user friendly error messages
            log::error!("{err}");
            1
        }
    });
}

pub fn main_result() -> Result<(), AppError> {
    // setup logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("stepvibes=info"))
        .init();

    // args
    let args = CliArgs::parse();

    // check if chart file exists
    if !args.input.exists() {
        let err = AppError::ConfigError(format!("Chart file not found {:?}", args.input));
        return Err(err);
    }

    let target = ChartType::from_name(&args.chart)
        .ok_or_else(|| AppError::ConfigError(format!("Unknown chart type `{}`", args.chart)))?;

    // package metadata next to the input
    let package_info = PackageInfo::for_input(&args.input)?;
    log::info!("Converting {:?} ({})", args.input, package_info.music_id);

    let file_data = fs::read(&args.input)?;

    // format sniffing by extension
    let extension = args
        .input
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    let normalized = match extension.as_str() {
        "ssq" | "csq" => normalize(&parse_csq_data(&file_data)?),
        "cms" => normalize(&parse_cms_data(&file_data)?),
        "json" => parse_normalized_json(&file_data)?,
        other => {
            let err = AppError::ConfigError(format!("Unsupported chart format `{other}`"));
            return Err(err);
        }
    };

    if let Some(export_path) = &args.export_json {
        let json = serde_json::to_string_pretty(&normalized)
            .map_err(|err| AppError::OtherError(err.to_string()))?;
        fs::write(export_path, json)?;
        log::info!("Exported normalized chart to {export_path:?}");
    }

    let vibes = VibesBuilder::new().build_for_chart(&normalized, target, &package_info.title)?;
    log::info!("Encoded {} vibes events", vibes.events.len());

    fs::create_dir_all(&args.output_dir)?;
    let output_path = args
        .output_dir
        .join(format!("chart_{}_{target}.json", package_info.music_id));
    let json =
        serde_json::to_string_pretty(&vibes).map_err(|err| AppError::OtherError(err.to_string()))?;
    fs::write(&output_path, json)?;
    log::info!("Wrote vibes chart to {output_path:?}");
    Ok(())
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct CliArgs {
    /// Chart file to convert (.ssq, .csq, .cms or normalized .json).
    #[arg(short, long)]
    input: PathBuf,
    /// Chart to export, e.g. single-standard.
    #[arg(short, long)]
    chart: String,
    /// Output directory for the vibes chart.
    #[arg(short, long, default_value = "charts")]
    output_dir: PathBuf,
    /// Optional path to also export the normalized chart as JSON.
    #[arg(long)]
    export_json: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    ConfigError(String),
    #[error("parsing error: {0}")]
    ParsingError(String),
    #[error("other error: {0}")]
    OtherError(String),
}

impl From<ChartError> for AppError {
    fn from(error: ChartError) -> Self {
        match error {
            ChartError::IoError(message) => Self::OtherError(message),
            err => Self::ParsingError(err.to_string()),
        }
    }
}

impl From<io::Error> for AppError {
    fn from(error: io::Error) -> Self {
        Self::OtherError(error.to_string())
    }
}
