use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StockError {
    #[error("{0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No data: {0}")]
    NoData(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl StockError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StockError::NotFound(_))
    }
}
