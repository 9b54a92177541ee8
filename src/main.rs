use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde_json::{Value, json};

use handsign::smoothing::DEFAULT_WINDOW;
use handsign::{
    Config, Family, GestureError, GestureService, LandmarkSet, MajorityVoteSmoother, PredictInput,
    UploadSample, logging, payload,
};

#[derive(Parser)]
#[command(name = "handsign")]
#[command(about = "Collect hand-sign samples, train classifiers and predict letters")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the dataset directory
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Override the model directory
    #[arg(long, global = true, value_name = "DIR")]
    model_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store one labeled sample
    Upload {
        #[arg(long)]
        label: String,

        #[command(flatten)]
        sample: SampleArgs,
    },
    /// Train the classifier of a feature family
    Train {
        #[arg(value_name = "FAMILY")]
        family: Family,
    },
    /// Classify one or more inputs
    Predict {
        #[arg(value_name = "FAMILY")]
        family: Family,

        /// Image to classify (repeatable)
        #[arg(long, value_name = "FILE")]
        image: Vec<PathBuf>,

        /// Landmark JSON file to classify (repeatable)
        #[arg(long, value_name = "FILE")]
        landmarks: Vec<PathBuf>,

        /// Save intermediate images to directory (must be empty)
        #[arg(long, value_name = "DIR")]
        debug_out: Option<PathBuf>,

        /// Number of recent predictions the stable label is voted over
        #[arg(long, default_value_t = DEFAULT_WINDOW)]
        smooth_window: usize,
    },
    /// Show dataset and model state
    Status,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct SampleArgs {
    /// Image file
    #[arg(long, value_name = "FILE")]
    image: Option<PathBuf>,

    /// File holding a base64 image or data URL
    #[arg(long, value_name = "FILE")]
    base64: Option<PathBuf>,

    /// JSON file with 21 hand landmarks
    #[arg(long, value_name = "FILE")]
    landmarks: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    logging::init(args.verbose)?;

    match run(args) {
        Ok(output) => print_json(&output),
        Err(e) => match e.downcast_ref::<GestureError>() {
            Some(err) if err.is_validation() => print_json(&json!({ "ok": false, "error": err.to_string() })),
            _ => Err(e),
        },
    }
}

fn run(args: Cli) -> anyhow::Result<Value> {
    let mut config = Config::load_or_default(args.config.as_deref())?;
    if let Some(dir) = args.data_dir {
        config.storage.dataset_dir = dir;
    }
    if let Some(dir) = args.model_dir {
        config.storage.model_dir = dir;
    }

    match args.command {
        Command::Upload { label, sample } => {
            let service = GestureService::open(config)?;
            let receipt = service.upload(&label, read_sample(sample)?)?;
            Ok(json!({ "ok": true, "result": receipt }))
        }
        Command::Train { family } => {
            let service = GestureService::open(config)?;
            let outcome = service.train(family);
            Ok(json!({ "ok": outcome.success, "result": outcome }))
        }
        Command::Predict {
            family,
            image,
            landmarks,
            debug_out,
            smooth_window,
        } => {
            let mut service = GestureService::open(config)?;
            if let Some(dir) = debug_out {
                service = service.with_debug_output(dir)?;
            }

            let inputs = match family {
                Family::Pixel => image,
                Family::Landmark => landmarks,
            };
            if inputs.is_empty() {
                return Err(GestureError::InvalidPayload(format!("no {family} input given")).into());
            }

            let mut smoother = MajorityVoteSmoother::new(smooth_window);
            let mut predictions = Vec::with_capacity(inputs.len());
            for path in &inputs {
                let input = read_input(family, path)?;
                let result = service.predict(&input)?;
                if !result.is_no_model() {
                    smoother.push(result.label.as_str());
                }
                predictions.push(json!({
                    "input": path,
                    "label": result.label,
                    "confidence": result.confidence,
                }));
            }

            Ok(json!({
                "ok": true,
                "result": {
                    "family": family,
                    "predictions": predictions,
                    "stable_label": smoother.stable_label(),
                }
            }))
        }
        Command::Status => {
            let service = GestureService::open(config)?;
            Ok(json!({ "ok": true, "result": service.status() }))
        }
    }
}

fn read_sample(args: SampleArgs) -> anyhow::Result<UploadSample> {
    if let Some(path) = args.image {
        let bytes = fs::read(&path).with_context(|| format!("Failed to read image {:?}", path))?;
        return Ok(UploadSample::Image(bytes));
    }
    if let Some(path) = args.base64 {
        let text = fs::read_to_string(&path).with_context(|| format!("Failed to read {:?}", path))?;
        return Ok(UploadSample::ImageBase64(text));
    }
    if let Some(path) = args.landmarks {
        return Ok(UploadSample::Landmarks(read_json(&path)?));
    }
    anyhow::bail!("one of --image, --base64 or --landmarks is required")
}

fn read_input(family: Family, path: &Path) -> anyhow::Result<PredictInput> {
    match family {
        Family::Pixel => {
            let bytes = fs::read(path).with_context(|| format!("Failed to read image {:?}", path))?;
            Ok(PredictInput::Image(payload::decode_image(&bytes)?))
        }
        Family::Landmark => {
            let value = read_json(path)?;
            Ok(PredictInput::Landmarks(LandmarkSet::from_json(&value)?))
        }
    }
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&text)
        .map_err(|e| GestureError::InvalidLandmarks(format!("{:?} is not valid JSON: {e}", path)).into())
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
