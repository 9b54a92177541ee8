use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use serde::Serialize;

use super::artifacts::ModelArtifact;
use crate::models::Family;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelOrigin {
    /// Fitted by this process
    Trained,
    /// Read back from a persisted artifact
    Loaded,
}

/// The classifier currently answering predictions for a family, together
/// with the counters it was trained with. Replaced as a whole, never mutated.
#[derive(Debug)]
pub struct ResidentModel {
    pub version: u64,
    pub origin: ModelOrigin,
    pub artifact: ModelArtifact,
}

#[derive(Debug, Default)]
struct FamilySlot {
    resident: RwLock<Option<Arc<ResidentModel>>>,
    training: Mutex<()>,
}

/// One resident model slot per family.
///
/// Readers clone the `Arc` out of the slot, so a prediction keeps using the
/// model it started with even if training swaps in a new one meanwhile.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    pixel: FamilySlot,
    landmark: FamilySlot,
    versions: AtomicU64,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, family: Family) -> &FamilySlot {
        match family {
            Family::Pixel => &self.pixel,
            Family::Landmark => &self.landmark,
        }
    }

    pub fn current(&self, family: Family) -> Option<Arc<ResidentModel>> {
        self.slot(family)
            .resident
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_resident(&self, family: Family) -> bool {
        self.current(family).is_some()
    }

    /// Swap in a new model for its family.
    pub fn install(&self, artifact: ModelArtifact, origin: ModelOrigin) -> Arc<ResidentModel> {
        let family = artifact.family;
        let resident = Arc::new(self.wrap(artifact, origin));
        let mut slot = self
            .slot(family)
            .resident
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(resident.clone());
        tracing::debug!("Installed {} model version {}", family, resident.version);
        resident
    }

    /// Install unless another caller got there first; returns whichever
    /// model ends up resident.
    pub fn install_if_absent(&self, artifact: ModelArtifact, origin: ModelOrigin) -> Arc<ResidentModel> {
        let family = artifact.family;
        let mut slot = self
            .slot(family)
            .resident
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = slot.as_ref() {
            return existing.clone();
        }
        let resident = Arc::new(self.wrap(artifact, origin));
        *slot = Some(resident.clone());
        resident
    }

    /// Exclusive training scope for a family, released on drop.
    pub fn training_guard(&self, family: Family) -> MutexGuard<'_, ()> {
        self.slot(family)
            .training
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn wrap(&self, artifact: ModelArtifact, origin: ModelOrigin) -> ResidentModel {
        ResidentModel {
            version: self.versions.fetch_add(1, Ordering::SeqCst) + 1,
            origin,
            artifact,
        }
    }
}
