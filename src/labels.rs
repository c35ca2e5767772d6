use std::{fs, path::Path, sync::Arc};

use anyhow::Context;

/// Output order of the primary (MobileNet) model.
pub const MODEL_V1_CLASSES: [&str; 14] = [
    "Atelectasis",
    "Cardiomegaly",
    "Effusion",
    "Infiltration",
    "Mass",
    "Nodule",
    "Pneumonia",
    "Pneumothorax",
    "Consolidation",
    "Edema",
    "Emphysema",
    "Fibrosis",
    "Pleural_Thickening",
    "Hernia",
];

/// Output order of the secondary (SE-ResNet152) model.
pub const MODEL_V2_CLASSES: [&str; 14] = [
    "Cardiomegaly",
    "Hernia",
    "Infiltration",
    "Nodule",
    "Emphysema",
    "Effusion",
    "Atelectasis",
    "Pleural_Thickening",
    "Pneumothorax",
    "Mass",
    "Fibrosis",
    "Consolidation",
    "Edema",
    "Pneumonia",
];

/// Disease names indexed by model output position.
///
/// Index `i` must name output `i` of the network it is paired with. Nothing in
/// the model artifact records this, so only the length is checked at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabels(Arc<[String]>);

impl ClassLabels {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(labels.into_iter().map(Into::into).collect())
    }

    /// One label per line; blank lines are skipped.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read label file {}", path.display()))?;
        let labels = Self::new(text.lines().map(str::trim).filter(|l| !l.is_empty()));
        anyhow::ensure!(!labels.is_empty(), "label file {} is empty", path.display());
        Ok(labels)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}
