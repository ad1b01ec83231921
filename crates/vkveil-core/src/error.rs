#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("handle not found: {0:#x}")]
    HandleNotFound(u64),

    #[error("unknown dispatch context: {0:#x}")]
    UnknownContext(u64),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
