use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// A pre-trained model mapping one feature vector to one chord label.
pub trait ChordClassifier: Send + Sync {
    fn feature_len(&self) -> usize;

    fn predict(&self, features: &[f32]) -> Result<String>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChordCentroid {
    pub label: String,
    pub centroid: Vec<f32>,
}

/// Nearest-centroid model, stored as JSON:
/// `{"feature_len": 40, "classes": [{"label": "C", "centroid": [...]}, ...]}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CentroidModel {
    pub feature_len: usize,
    pub classes: Vec<ChordCentroid>,
}

impl CentroidModel {
    pub fn new(feature_len: usize, classes: Vec<ChordCentroid>) -> Result<Self> {
        let model = Self {
            feature_len,
            classes,
        };
        model.validate()?;
        Ok(model)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model file {}", path.display()))?;
        Self::from_json(&text)
            .with_context(|| format!("Invalid model file {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let model: CentroidModel = serde_json::from_str(text)?;
        model.validate()?;
        Ok(model)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<()> {
        if self.feature_len == 0 {
            bail!("feature_len must be positive");
        }
        if self.classes.is_empty() {
            bail!("Model has no classes");
        }
        for class in &self.classes {
            if class.centroid.len() != self.feature_len {
                bail!(
                    "Centroid for {} has {} values, expected {}",
                    class.label,
                    class.centroid.len(),
                    self.feature_len
                );
            }
            if class.centroid.iter().any(|v| !v.is_finite()) {
                bail!("Centroid for {} contains non-finite values", class.label);
            }
        }
        Ok(())
    }
}

impl ChordClassifier for CentroidModel {
    fn feature_len(&self) -> usize {
        self.feature_len
    }

    fn predict(&self, features: &[f32]) -> Result<String> {
        if features.len() != self.feature_len {
            bail!(
                "Feature vector has {} values, model expects {}",
                features.len(),
                self.feature_len
            );
        }
        let mut best: Option<(&ChordCentroid, f32)> = None;
        for class in &self.classes {
            let distance: f32 = class
                .centroid
                .iter()
                .zip(features)
                .map(|(c, f)| (c - f).powi(2))
                .sum();
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((class, distance));
            }
        }
        match best {
            Some((class, _)) => Ok(class.label.clone()),
            None => bail!("Model has no classes"),
        }
    }
}
