use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Empty { field: &'static str },
    InvalidPhoneNumber { input: String },
    IdOutOfRange { field: &'static str, actual: i64 },
    UnknownDeliveryState { code: i32 },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { field } => write!(f, "{field} must not be empty"),
            Self::InvalidPhoneNumber { input } => write!(f, "invalid phone number: {input}"),
            Self::IdOutOfRange { field, actual } => {
                write!(f, "{field} out of range: {actual} (expected 0..={})", i32::MAX)
            }
            Self::UnknownDeliveryState { code } => {
                write!(f, "unknown delivery state: {code} (expected 0..=2)")
            }
        }
    }
}

impl std::error::Error for ValidationError {}
