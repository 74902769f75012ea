use crate::domain::ErrorCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Result code a completion broadcast carries for one segment.
///
/// This value is preserved as-is even when the code is unknown to this crate.
pub struct ResultCode(i32);

impl ResultCode {
    /// The platform's success code.
    pub const OK: Self = Self(-1);

    /// Construct a result code from its integer representation.
    pub fn new(code: i32) -> Self {
        Self(code)
    }

    /// Get the integer code as provided by the platform.
    pub fn as_i32(self) -> i32 {
        self.0
    }

    /// Map this code to a known result code variant, if one exists.
    pub fn known(self) -> Option<KnownResultCode> {
        KnownResultCode::from_code(self.0)
    }

    pub fn is_ok(self) -> bool {
        self.known() == Some(KnownResultCode::Ok)
    }

    /// Host error code for a segment that completed with this result.
    pub fn error_code(self) -> ErrorCode {
        match self.known() {
            Some(KnownResultCode::Ok) => ErrorCode::NoError,
            Some(KnownResultCode::NullPdu) => ErrorCode::Internal,
            Some(KnownResultCode::NoService | KnownResultCode::RadioOff) => ErrorCode::NoSignal,
            Some(KnownResultCode::GenericFailure) | None => ErrorCode::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
/// Result codes the platform documents for SMS completions.
pub enum KnownResultCode {
    Ok,
    GenericFailure,
    RadioOff,
    NullPdu,
    NoService,
}

impl KnownResultCode {
    /// Convert a raw platform result code into a known variant.
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            -1 => Self::Ok,
            1 => Self::GenericFailure,
            2 => Self::RadioOff,
            3 => Self::NullPdu,
            4 => Self::NoService,
            _ => return None,
        })
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Ok => -1,
            Self::GenericFailure => 1,
            Self::RadioOff => 2,
            Self::NullPdu => 3,
            Self::NoService => 4,
        }
    }
}

impl From<KnownResultCode> for ResultCode {
    fn from(value: KnownResultCode) -> Self {
        Self(value.code())
    }
}
