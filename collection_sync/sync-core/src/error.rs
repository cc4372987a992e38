use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Model Error: model `{0}` is not declared in the API docs")]
    UnknownModel(String),
    #[error("SerdeJson Error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
