//! Central registry of augmentation handlers, keyed by `(type, name)`.

use crate::stage::{Augmentation, StageType};
use brainy_core::{BrainyError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;

struct Entry {
    augmentation: Arc<dyn Augmentation>,
    enabled: bool,
}

/// Process-wide table of augmentations. Registration order within a type
/// is preserved and determines execution order.
pub struct AugmentationRegistry {
    entries: RwLock<HashMap<StageType, Vec<Entry>>>,
}

impl Default for AugmentationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AugmentationRegistry {
    pub fn new() -> Self {
        Self { entries: RwLock::new(HashMap::new()) }
    }

    /// Registers an augmentation. Errors if an augmentation with the same
    /// name is already registered for the same stage type.
    pub fn register(&self, augmentation: Arc<dyn Augmentation>) -> Result<()> {
        let stage_type = augmentation.stage_type();
        let name = augmentation.name().to_string();
        let mut entries = self.entries.write().expect("registry lock poisoned");
        let bucket = entries.entry(stage_type).or_default();

        if bucket.iter().any(|e| e.augmentation.name() == name) {
            return Err(BrainyError::AlreadyExists(format!(
                "augmentation '{name}' already registered for stage {stage_type}"
            )));
        }

        bucket.push(Entry { augmentation, enabled: true });
        Ok(())
    }

    /// Enables or disables a registered augmentation without unregistering
    /// it; a disabled augmentation is skipped during pipeline execution.
    pub fn set_enabled(&self, stage_type: StageType, name: &str, enabled: bool) -> Result<()> {
        let mut entries = self.entries.write().expect("registry lock poisoned");
        let bucket = entries
            .get_mut(&stage_type)
            .ok_or_else(|| BrainyError::NotFound(format!("no augmentations registered for stage {stage_type}")))?;

        let entry = bucket
            .iter_mut()
            .find(|e| e.augmentation.name() == name)
            .ok_or_else(|| BrainyError::NotFound(format!("augmentation '{name}' not found for stage {stage_type}")))?;

        entry.enabled = enabled;
        Ok(())
    }

    /// Enabled augmentations for a stage, in registration order.
    pub fn enabled_for(&self, stage_type: StageType) -> Vec<Arc<dyn Augmentation>> {
        let entries = self.entries.read().expect("registry lock poisoned");
        entries
            .get(&stage_type)
            .map(|bucket| {
                bucket
                    .iter()
                    .filter(|e| e.enabled)
                    .map(|e| e.augmentation.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.read().expect("registry lock poisoned");
        entries.values().map(|b| b.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
