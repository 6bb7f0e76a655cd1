use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

pub const PARASITIZED_LABEL: &str = "Malaria Parasitized";
pub const NORMAL_LABEL: &str = "Normal";

pub const PRECAUTIONS: [&str; 6] = [
    "Consult a healthcare professional immediately.",
    "Take prescribed anti-malarial medication as directed.",
    "Use mosquito nets and insect repellents to prevent further bites.",
    "Stay indoors during peak mosquito activity hours (dawn and dusk).",
    "Ensure that living areas are well-screened against mosquitoes.",
    "Stay hydrated and rest to help recovery.",
];

pub const SYMPTOMS: [&str; 7] = [
    "Fever and chills.",
    "Flu-like symptoms, including headache and fatigue.",
    "Sweats.",
    "Nausea and vomiting.",
    "Muscle pain.",
    "Anemia (low red blood cell count).",
    "Respiratory distress in severe cases.",
];

/// Outcome of one classification, ready to be rendered.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PredictionResult {
    pub class_index: usize,
    pub label: String,
    pub precautions: Option<Vec<String>>,
    pub symptoms: Option<Vec<String>>,
}

impl PredictionResult {
    /// Advisory lists are attached only when the label is the metadata's positive label.
    pub fn from_class_index(class_index: usize, metadata: &ModelMetadata) -> Self {
        let label = metadata.label_for(class_index).to_string();
        let (precautions, symptoms) = if label == metadata.positive_label {
            (
                Some(PRECAUTIONS.iter().map(|s| s.to_string()).collect()),
                Some(SYMPTOMS.iter().map(|s| s.to_string()).collect()),
            )
        } else {
            (None, None)
        };

        Self {
            class_index,
            label,
            precautions,
            symptoms,
        }
    }

    pub fn has_advisories(&self) -> bool {
        self.precautions.is_some() && self.symptoms.is_some()
    }
}

#[derive(Serialize, Deserialize, Clone)]
pub struct PredictionResponse {
    pub filename: String,
    pub result: PredictionResult,
    pub probabilities: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TensorLayout {
    Nhwc,
    Nchw,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct InputSpec {
    pub layout: TensorLayout,
    pub pixel_scale: f32,
}

impl Default for InputSpec {
    fn default() -> Self {
        Self {
            layout: TensorLayout::Nhwc,
            pixel_scale: 1.0,
        }
    }
}

/// Sidecar description of a model artifact. Every field has a default so a
/// missing file or a partial file both describe the two-class malaria model.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ModelMetadata {
    pub labels: Vec<String>,
    pub fallback_label: String,
    pub positive_label: String,
    pub input: InputSpec,
    pub softmax: bool,
}

impl Default for ModelMetadata {
    fn default() -> Self {
        Self {
            labels: vec![PARASITIZED_LABEL.into(), NORMAL_LABEL.into()],
            fallback_label: NORMAL_LABEL.into(),
            positive_label: PARASITIZED_LABEL.into(),
            input: InputSpec::default(),
            softmax: false,
        }
    }
}

impl ModelMetadata {
    /// Total over all indices: anything past the table maps to `fallback_label`.
    pub fn label_for(&self, class_index: usize) -> &str {
        self.labels
            .get(class_index)
            .map(String::as_str)
            .unwrap_or(&self.fallback_label)
    }
}
