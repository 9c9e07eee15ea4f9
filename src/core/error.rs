use thiserror::Error;

pub type Result<T> = std::result::Result<T, RiskError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RiskError {
    /// A simulation or attribution input is outside its valid domain.
    #[error("Invalid parameter: {message}")]
    InvalidParameter { message: String },

    /// An aggregation was asked to reduce an empty outcome set.
    #[error("Empty data provided for {context}")]
    EmptyData { context: String },
}

impl RiskError {
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    pub fn empty_data(context: impl Into<String>) -> Self {
        Self::EmptyData {
            context: context.into(),
        }
    }
}
