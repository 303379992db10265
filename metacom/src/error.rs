use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Timeout,
    Cancelled,
    InvalidArgument,
    SerdeJsonError,
    DeserializeFailed,
    WebSocketConnectFailed,
    WebSocketSendFailed,
    WebSocketRecvFailed,
    WebSocketClosed,
    TcpConnectFailed,
    HttpHandshakeFailed,
    HttpBuildReqFailed,
    HttpSendReqFailed,
    HttpWaitRspFailed,
    HttpStatus,
    /// The server answered the call with an error payload.
    Remote,
    InterfaceNotFound,
    MethodNotFound,
    #[serde(untagged)]
    Unknown(String),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub msg: String,
    /// Application error code, only set for [`ErrorKind::Remote`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<Value>,
}

impl Error {
    #[must_use]
    pub fn new(kind: ErrorKind, msg: String) -> Self {
        Self {
            kind,
            msg,
            code: None,
        }
    }

    #[must_use]
    pub fn kind(kind: ErrorKind) -> Self {
        Self::new(kind, String::default())
    }

    /// Builds the error a server reported for one call.
    #[must_use]
    pub fn remote(code: Value, msg: String) -> Self {
        Self {
            kind: ErrorKind::Remote,
            msg,
            code: Some(code),
        }
    }

    #[must_use]
    pub fn code(&self) -> Option<&Value> {
        self.code.as_ref()
    }
}

impl std::error::Error for Error {}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::kind(kind)
    }
}

impl From<std::num::TryFromIntError> for Error {
    fn from(value: std::num::TryFromIntError) -> Self {
        Self::new(ErrorKind::InvalidArgument, value.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::new(ErrorKind::SerdeJsonError, value.to_string())
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.code, self.msg.is_empty()) {
            (Some(code), _) => write!(f, "{:?}({code}): {}", self.kind, self.msg),
            (None, true) => write!(f, "{:?}", self.kind),
            (None, false) => write!(f, "{:?}: {}", self.kind, self.msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
