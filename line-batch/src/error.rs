use batch_pipelines::{ConfigError, EngineError};

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("invalid pipeline: {0}")]
    Pipeline(#[from] ConfigError),

    #[error("{0}")]
    Engine(#[from] EngineError),

    #[error("consumer for route '{0}' panicked")]
    Consumer(String),
}
