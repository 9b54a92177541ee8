mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from handsign for tests
pub use handsign::core::{FsModelStore, ModelOrigin, ModelRepository};
pub use handsign::dataset::{Aggregator, FsSampleStore, SampleRepository};
pub use handsign::{
    Config, Family, FeatureEncoder, GestureError, GestureService, HandLocalizer, Label,
    LandmarkSet, PredictInput, UploadSample,
};
