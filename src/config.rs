use std::path::PathBuf;

use clap::Parser;

use crate::labels::{ClassLabels, MODEL_V1_CLASSES, MODEL_V2_CLASSES};
use crate::preprocess::{ChannelOrder, InputShape};
use crate::state::DEFAULT_MAX_BODY_BYTES;

/// Chest X-ray disease classification over HTTP.
#[derive(Debug, Clone, Parser)]
#[command(version, about)]
pub struct Config {
    #[arg(long, env = "DOCTOR_AI_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "DOCTOR_AI_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Base URL advertised by `GET /info`
    #[arg(long, env = "DOCTOR_AI_PUBLIC_URL", default_value = "http://localhost:5000")]
    pub public_url: String,

    /// CORS origin to allow; repeat for several. Any origin when omitted
    #[arg(long = "allowed-origin", env = "DOCTOR_AI_ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,

    #[arg(long, env = "DOCTOR_AI_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,

    /// HTTP worker threads (defaults to the number of physical cores)
    #[arg(long, env = "DOCTOR_AI_WORKERS")]
    pub workers: Option<usize>,

    /// Channel order the models were trained with
    #[arg(long, env = "DOCTOR_AI_CHANNEL_ORDER", value_enum, default_value_t = ChannelOrder::Rgb)]
    pub channel_order: ChannelOrder,

    #[arg(long, env = "DOCTOR_AI_MODEL_V1_PATH", default_value = "./models/mobilenet_model.onnx")]
    pub model_v1_path: PathBuf,

    /// Label file overriding the built-in model_v1 classes
    #[arg(long, env = "DOCTOR_AI_MODEL_V1_LABELS")]
    pub model_v1_labels: Option<PathBuf>,

    #[arg(long, env = "DOCTOR_AI_MODEL_V1_SIZE", default_value_t = 224)]
    pub model_v1_size: u32,

    /// Secondary model; its routes exist only when this is set
    #[arg(long, env = "DOCTOR_AI_MODEL_V2_PATH")]
    pub model_v2_path: Option<PathBuf>,

    #[arg(long, env = "DOCTOR_AI_MODEL_V2_LABELS")]
    pub model_v2_labels: Option<PathBuf>,

    #[arg(long, env = "DOCTOR_AI_MODEL_V2_SIZE", default_value_t = 600)]
    pub model_v2_size: u32,

    /// `mysql://` or `sqlite://` URL of the `blog_images` table; enables `GET /predict?id=`
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,
}

/// Where a model's labels come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelSource {
    Preset(&'static [&'static str]),
    File(PathBuf),
}

impl LabelSource {
    pub fn load(&self) -> anyhow::Result<ClassLabels> {
        match self {
            Self::Preset(labels) => Ok(ClassLabels::new(labels.iter().copied())),
            Self::File(path) => ClassLabels::from_file(path),
        }
    }
}

/// Everything needed to load and mount one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSpec {
    pub name: &'static str,
    pub path: PathBuf,
    pub labels: LabelSource,
    pub shape: InputShape,
}

impl Config {
    pub fn bind_addr(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }

    /// Models to serve, primary first.
    pub fn endpoint_specs(&self) -> Vec<EndpointSpec> {
        let mut specs = vec![EndpointSpec {
            name: "model_v1",
            path: self.model_v1_path.clone(),
            labels: label_source(&self.model_v1_labels, &MODEL_V1_CLASSES),
            shape: InputShape::square(self.model_v1_size),
        }];

        if let Some(path) = &self.model_v2_path {
            specs.push(EndpointSpec {
                name: "model_v2",
                path: path.clone(),
                labels: label_source(&self.model_v2_labels, &MODEL_V2_CLASSES),
                shape: InputShape::square(self.model_v2_size),
            });
        }

        specs
    }
}

fn label_source(file: &Option<PathBuf>, preset: &'static [&'static str]) -> LabelSource {
    match file {
        Some(path) => LabelSource::File(path.clone()),
        None => LabelSource::Preset(preset),
    }
}
