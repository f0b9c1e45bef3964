use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Graph error: {0}")]
    Graph(String),
    #[error("Port error: {0}")]
    Port(String),
    #[error("Information error: {0}")]
    Information(String),
    #[error("Execution error: {0}")]
    Execution(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn graph(msg: impl Into<String>) -> Self {
        PipelineError::Graph(msg.into())
    }

    pub fn port(msg: impl Into<String>) -> Self {
        PipelineError::Port(msg.into())
    }

    pub fn information(msg: impl Into<String>) -> Self {
        PipelineError::Information(msg.into())
    }

    pub fn execution(msg: impl Into<String>) -> Self {
        PipelineError::Execution(msg.into())
    }
}
