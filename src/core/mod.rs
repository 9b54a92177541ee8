//! Training, model residency and prediction.

pub mod artifacts;
pub mod predictor;
pub mod registry;
pub mod service;
pub mod trainer;

pub use artifacts::{FsModelStore, ModelArtifact, ModelRepository};
pub use predictor::{PredictInput, Predictor};
pub use registry::{ModelOrigin, ModelRegistry, ResidentModel};
pub use service::{GestureService, ModelStatus, StatusReport, UploadReceipt, UploadSample};
pub use trainer::Trainer;
