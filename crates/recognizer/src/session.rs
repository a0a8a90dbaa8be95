//! ONNX Runtime session construction shared by the detector and the OCR model.

use crate::error::{RecognizerError, Result};
use ndarray::{Array, ArrayD, Dimension, IxDyn};
use ort::{
    execution_providers::CPUExecutionProvider,
    session::{builder::GraphOptimizationLevel, Session},
    value::Value,
};
use std::path::Path;
use std::sync::Mutex;

/// Load a model on the CPU execution provider.
///
/// Any failure here is a startup failure: the pipeline never runs without its
/// models.
pub fn create_session(model_path: impl AsRef<Path>, intra_threads: usize) -> Result<Session> {
    let path = model_path.as_ref();
    let load_error = |message: String| RecognizerError::ModelLoad {
        path: path.to_path_buf(),
        message,
    };

    if !path.exists() {
        return Err(load_error("model file not found".to_string()));
    }

    tracing::info!(model = %path.display(), intra_threads, "Loading ONNX model on CPU");

    let session = Session::builder()
        .map_err(|e| load_error(format!("failed to create session builder: {e}")))?
        .with_execution_providers([CPUExecutionProvider::default().build()])
        .map_err(|e| load_error(format!("failed to set execution providers: {e}")))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| load_error(format!("failed to set optimization level: {e}")))?
        .with_intra_threads(intra_threads)
        .map_err(|e| load_error(format!("failed to set intra threads: {e}")))?
        .commit_from_file(path)
        .map_err(|e| load_error(format!("failed to load model from file: {e}")))?;

    Ok(session)
}

/// Name of the session's first output, falling back to the YOLO export default
pub fn first_output_name(session: &Session) -> String {
    session
        .outputs
        .first()
        .map(|output| output.name.clone())
        .unwrap_or_else(|| "output0".to_string())
}

/// Run a single-input model and copy the named output out of the session
pub fn run_single<D: Dimension + 'static>(
    session: &Mutex<Session>,
    output_name: &str,
    input: Array<f32, D>,
) -> Result<ArrayD<f32>> {
    let input_tensor = Value::from_array(input)?;

    let mut session = session
        .lock()
        .map_err(|_| RecognizerError::SessionPoisoned)?;
    let outputs = session.run(ort::inputs![input_tensor])?;

    let output_value = outputs.get(output_name).ok_or_else(|| {
        RecognizerError::UnexpectedOutput(format!("no output named {}", output_name))
    })?;
    let (shape, data) = output_value.try_extract_tensor::<f32>()?;

    // Convert shape from i64 to usize
    let shape_usize: Vec<usize> = shape.as_ref().iter().map(|&x| x as usize).collect();

    Ok(ArrayD::from_shape_vec(IxDyn(&shape_usize), data.to_vec())?)
}
