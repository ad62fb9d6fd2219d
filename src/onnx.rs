use std::path::Path;

use anyhow::Context;
use ndarray::Array4;
use tract_onnx::prelude::*;

use crate::error::AnalysisError;

pub type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Loads an ONNX model with a fixed `f32` input shape and makes it runnable.
pub fn load_plan(path: &Path, input_shape: [usize; 4]) -> Result<OnnxPlan, AnalysisError> {
    let build = || -> TractResult<OnnxPlan> {
        tract_onnx::onnx()
            .model_for_path(path)
            .context("Failed to load ONNX model")?
            .with_input_fact(0, f32::fact(input_shape).into())?
            .into_optimized()
            .context("Failed to optimize ONNX model")?
            .into_runnable()
            .context("Failed to make model runnable")
    };

    build().map_err(|source| AnalysisError::ModelLoad {
        path: path.display().to_string(),
        source,
    })
}

/// Runs `plan` on a single NCHW/NHWC batch and returns every output as a flat
/// `f32` vector alongside its shape.
pub fn run(plan: &OnnxPlan, input: Array4<f32>) -> Result<Vec<(Vec<usize>, Vec<f32>)>, AnalysisError> {
    let shape = input.shape().to_vec();
    let data: Vec<f32> = input.iter().copied().collect();
    let tensor = tract_ndarray::Array::from_shape_vec(shape, data)
        .map_err(|e| AnalysisError::Inference(e.into()))?
        .into_tensor();

    let outputs = plan
        .run(tvec!(tensor.into()))
        .map_err(AnalysisError::Inference)?;

    outputs
        .iter()
        .map(|output| {
            let view = output.to_array_view::<f32>().map_err(AnalysisError::Inference)?;
            Ok((view.shape().to_vec(), view.iter().copied().collect()))
        })
        .collect()
}
