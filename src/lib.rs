pub mod classifier;
pub mod config;
pub mod core;
pub mod dataset;
pub mod detection;
pub mod encoding;
pub mod error;
pub mod landmarks;
pub mod logging;
pub mod models;
pub mod payload;
pub mod pipeline;
pub mod smoothing;

pub use config::Config;
pub use crate::core::{GestureService, PredictInput, UploadSample};
pub use detection::HandLocalizer;
pub use encoding::FeatureEncoder;
pub use error::{GestureError, Result};
pub use landmarks::{LandmarkPoint, LandmarkSet};
pub use models::{Family, FeatureVector, Label, LabelSet, NO_MODEL_LABEL, PredictionResult, TrainOutcome};
pub use pipeline::{BoundingBox, DebugConfig, MetadataValue, Pipeline, PipelineContext, PipelineData, PipelineStep};
pub use smoothing::MajorityVoteSmoother;
