use std::path::Path;

use anyhow::Context;
use ndarray::Array4;
use tract_onnx::prelude::*;

use crate::preprocess::InputShape;

/// A single forward pass over a `(1, H, W, 3)` batch, returning one score per class.
pub trait Classifier: Send + Sync {
    fn classify(&self, batch: Array4<f32>) -> anyhow::Result<Vec<f32>>;
}

/// An ONNX export of the trained network, optimized once at startup.
pub struct OnnxClassifier {
    plan: TypedRunnableModel<TypedModel>,
    shape: InputShape,
}

impl OnnxClassifier {
    pub fn load(path: impl AsRef<Path>, shape: InputShape) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .with_context(|| format!("failed to load ONNX model {}", path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, shape.height as usize, shape.width as usize, 3),
                ),
            )
            .context("model input is not compatible with a (1, H, W, 3) f32 batch")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to make ONNX model runnable")?;

        Ok(Self { plan, shape })
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&self, batch: Array4<f32>) -> anyhow::Result<Vec<f32>> {
        let expected = [1, self.shape.height as usize, self.shape.width as usize, 3];
        anyhow::ensure!(
            batch.shape() == expected,
            "batch shape {:?} does not match model input {:?}",
            batch.shape(),
            expected
        );

        let input = tract_ndarray::Array4::from_shape_vec(expected, batch.into_raw_vec())?;
        let outputs = self.plan.run(tvec!(input.into_tensor().into()))?;
        let scores = outputs
            .first()
            .context("model produced no outputs")?
            .to_array_view::<f32>()?
            .iter()
            .copied()
            .collect();

        Ok(scores)
    }
}
