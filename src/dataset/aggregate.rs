use std::collections::BTreeMap;

use image::ImageReader;
use serde_json::Value;

use super::{DecodeSkip, SampleRepository, SampleSource};
use crate::encoding::FeatureEncoder;
use crate::landmarks::LandmarkSet;
use crate::models::{Family, FeatureVector, Label};

/// Feature vectors and labels gathered for one training run.
#[derive(Debug, Clone)]
pub struct TrainingSet {
    pub family: Family,
    /// Encoded samples per requested label, zero included.
    pub counts: BTreeMap<Label, usize>,
    pub samples: Vec<(FeatureVector, Label)>,
    /// Samples that failed to decode or encode.
    pub skipped: usize,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Labels that contributed at least one sample, in label order.
    pub fn present_labels(&self) -> Vec<Label> {
        self.counts
            .iter()
            .filter(|&(_, &count)| count > 0)
            .map(|(label, _)| label.clone())
            .collect()
    }
}

/// Re-reads stored samples and encodes them for training.
pub struct Aggregator<'a, S: SampleRepository> {
    store: &'a S,
    encoder: &'a FeatureEncoder,
    max_per_label: usize,
}

impl<'a, S: SampleRepository> Aggregator<'a, S> {
    pub fn new(store: &'a S, encoder: &'a FeatureEncoder, max_per_label: usize) -> Self {
        Self {
            store,
            encoder,
            max_per_label,
        }
    }

    /// Build a training set for `labels`.
    ///
    /// Unreadable label storage and undecodable samples are logged and left
    /// out; at most `max_per_label` encoded samples are kept per label, in
    /// discovery order.
    pub fn load<'l, I>(&self, labels: I, family: Family) -> TrainingSet
    where
        I: IntoIterator<Item = &'l Label>,
    {
        let mut set = TrainingSet {
            family,
            counts: BTreeMap::new(),
            samples: Vec::new(),
            skipped: 0,
        };

        for label in labels {
            let sources = match self.store.list_samples(label, family) {
                Ok(sources) => sources,
                Err(e) => {
                    tracing::warn!("Skipping label {}: {}", label, e);
                    set.counts.insert(label.clone(), 0);
                    continue;
                }
            };

            let mut kept = 0;
            for source in &sources {
                if kept >= self.max_per_label {
                    tracing::debug!(
                        "Label {} reached the cap of {} samples, ignoring the rest",
                        label, self.max_per_label
                    );
                    break;
                }
                match self.decode(source, label, family) {
                    Ok(vector) => {
                        set.samples.push((vector, label.clone()));
                        kept += 1;
                    }
                    Err(skip) => {
                        tracing::warn!("{}", skip);
                        set.skipped += 1;
                    }
                }
            }
            set.counts.insert(label.clone(), kept);
        }

        tracing::info!(
            "Aggregated {} {} samples over {} labels ({} skipped)",
            set.len(),
            family,
            set.counts.len(),
            set.skipped
        );
        set
    }

    fn decode(&self, source: &SampleSource, label: &Label, family: Family) -> Result<FeatureVector, DecodeSkip> {
        if source.family() != family {
            return Err(DecodeSkip::new(source, format!("not a {family} sample")));
        }

        match source {
            SampleSource::ImageFile(path) => {
                let img = ImageReader::open(path)
                    .map_err(|e| DecodeSkip::new(source, e))?
                    .with_guessed_format()
                    .map_err(|e| DecodeSkip::new(source, e))?
                    .decode()
                    .map_err(|e| DecodeSkip::new(source, e))?;
                self.encoder
                    .encode_image(&img)
                    .map_err(|e| DecodeSkip::new(source, e))
            }
            SampleSource::LandmarkLine { bytes, .. } => {
                let text = std::str::from_utf8(bytes).map_err(|e| DecodeSkip::new(source, e))?;
                let value: Value =
                    serde_json::from_str(text).map_err(|e| DecodeSkip::new(source, e))?;
                if let Some(recorded) = value.get("label").and_then(Value::as_str) {
                    if !recorded.trim().eq_ignore_ascii_case(label.as_str()) {
                        return Err(DecodeSkip::new(
                            source,
                            format!("record labeled {recorded:?} filed under {label}"),
                        ));
                    }
                }
                let landmarks = LandmarkSet::from_json(&value).map_err(|e| DecodeSkip::new(source, e))?;
                Ok(self.encoder.encode_landmarks(&landmarks))
            }
        }
    }
}
