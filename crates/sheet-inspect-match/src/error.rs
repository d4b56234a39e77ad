#[derive(thiserror::Error, Debug)]
pub enum SpecError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
