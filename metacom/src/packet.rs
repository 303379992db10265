use serde::{Deserialize, Serialize, ser::SerializeMap};
use serde_json::Value;

use crate::error::{Error, ErrorKind, Result};

/// The remote method a call is addressed to.
///
/// On the wire it is flattened into `<interface>[.<version>]/<method>`, which is
/// used both as the dynamic key of a websocket call packet and as the tail of
/// the HTTP path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub interface: String,
    pub version: Option<String>,
    pub method: String,
}

impl Target {
    pub fn new(
        interface: impl Into<String>,
        version: Option<&str>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            interface: interface.into(),
            version: version.map(str::to_owned),
            method: method.into(),
        }
    }

    /// Interface name with the version suffix, e.g. `auth.2`.
    #[must_use]
    pub fn qualified_interface(&self) -> String {
        match &self.version {
            Some(version) => format!("{}.{version}", self.interface),
            None => self.interface.clone(),
        }
    }

    /// Path used by the request-response transport.
    #[must_use]
    pub fn http_path(&self) -> String {
        format!("/api/{self}")
    }

    /// Parses a packet key such as `auth.2/signIn`.
    ///
    /// # Errors
    ///
    /// Fails when the key has no `/` or an empty interface or method part.
    pub fn parse(key: &str) -> Result<Self> {
        let Some((interface, method)) = key.split_once('/') else {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("invalid call target: {key}"),
            ));
        };
        let (interface, version) = match interface.split_once('.') {
            Some((interface, version)) => (interface, Some(version)),
            None => (interface, None),
        };
        if interface.is_empty() || method.is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("invalid call target: {key}"),
            ));
        }
        Ok(Self::new(interface, version, method))
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}.{version}/{}", self.interface, self.method),
            None => write!(f, "{}/{}", self.interface, self.method),
        }
    }
}

/// Outbound call packet.
///
/// Serializes to `{"call": <id>, "<target>": <args>}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub id: u64,
    pub target: Target,
    pub args: Value,
}

impl Call {
    pub fn new(id: u64, target: Target, args: Value) -> Self {
        Self { id, target, args }
    }

    /// Encodes the packet as `{"call": <id>, "<target>": <args>}`.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::SerdeJsonError`] if `args` cannot be written
    /// as JSON text.
    pub fn to_frame(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes a call packet, as a receiver of [`Call::to_frame`] would.
    ///
    /// # Errors
    ///
    /// Fails if the frame is not an object with a numeric `call` and exactly
    /// one target key.
    pub fn parse(frame: &str) -> Result<Self> {
        let mut object: serde_json::Map<String, Value> = serde_json::from_str(frame)?;
        let id = object
            .remove("call")
            .and_then(|id| id.as_u64())
            .ok_or_else(|| {
                Error::new(ErrorKind::DeserializeFailed, "missing call id".to_string())
            })?;

        let mut entries = object.into_iter();
        match (entries.next(), entries.next()) {
            (Some((key, args)), None) => Ok(Self::new(id, Target::parse(&key)?, args)),
            _ => Err(Error::new(
                ErrorKind::DeserializeFailed,
                format!("call {id} must carry exactly one target"),
            )),
        }
    }
}

impl Serialize for Call {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("call", &self.id)?;
        map.serialize_entry(&self.target.to_string(), &self.args)?;
        map.end()
    }
}

/// Error payload of a failed call.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    #[serde(default)]
    pub code: Value,
    #[serde(default)]
    pub message: String,
}

impl From<Value> for RemoteError {
    /// Reads whatever a server put under `error`.
    ///
    /// Objects give `code` and `message`; a non-string message is kept as its
    /// JSON text. A bare string becomes the message and any other value its
    /// JSON text, both without a code.
    fn from(value: Value) -> Self {
        match value {
            Value::Object(mut object) => {
                let code = object.remove("code").unwrap_or(Value::Null);
                let message = match object.remove("message") {
                    Some(Value::String(message)) => message,
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                };
                Self { code, message }
            }
            Value::String(message) => Self {
                code: Value::Null,
                message,
            },
            other => Self {
                code: Value::Null,
                message: other.to_string(),
            },
        }
    }
}

impl From<RemoteError> for Error {
    fn from(value: RemoteError) -> Self {
        Error::remote(value.code, value.message)
    }
}

/// Which field of an inbound packet carried the correlation key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correlation {
    Callback(Value),
    Event(Value),
}

impl Correlation {
    #[must_use]
    pub fn key(&self) -> &Value {
        match self {
            Correlation::Callback(key) | Correlation::Event(key) => key,
        }
    }

    /// The call id this packet settles, if the key is one.
    #[must_use]
    pub fn call_id(&self) -> Option<u64> {
        self.key().as_u64().filter(|id| *id != 0)
    }
}

#[derive(Deserialize)]
struct RawReply {
    #[serde(default)]
    callback: Option<Value>,
    #[serde(default)]
    event: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// `null`, `false`, `0` and `""` never name a callback.
fn is_blank(key: &Value) -> bool {
    match key {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Inbound packet: a call reply or a server-pushed event.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub correlation: Correlation,
    pub outcome: Result<Value>,
}

impl Reply {
    #[must_use]
    pub fn result(id: u64, value: Value) -> Self {
        Self {
            correlation: Correlation::Callback(id.into()),
            outcome: Ok(value),
        }
    }

    #[must_use]
    pub fn error(id: u64, code: Value, message: impl Into<String>) -> Self {
        Self {
            correlation: Correlation::Callback(id.into()),
            outcome: Err(Error::remote(code, message.into())),
        }
    }

    #[must_use]
    pub fn event(key: impl Into<Value>, value: Value) -> Self {
        Self {
            correlation: Correlation::Event(key.into()),
            outcome: Ok(value),
        }
    }

    /// Decodes an inbound packet.
    ///
    /// The correlation key is `callback` unless it is blank (`null`, `false`,
    /// `0` or `""`), in which case `event` is used. An `error` of any shape
    /// makes the outcome an [`ErrorKind::Remote`] error; a `null` error is
    /// ignored.
    ///
    /// # Errors
    ///
    /// Fails for frames that are not JSON objects or that carry neither
    /// `callback` nor `event`.
    pub fn parse(frame: &str) -> Result<Self> {
        let raw: RawReply = serde_json::from_str(frame)?;
        let correlation = match (raw.callback, raw.event) {
            (Some(key), _) if !is_blank(&key) => Correlation::Callback(key),
            (_, Some(key)) => Correlation::Event(key),
            (Some(key), None) => Correlation::Callback(key),
            (None, None) => {
                return Err(Error::new(
                    ErrorKind::DeserializeFailed,
                    "packet has neither callback nor event".to_string(),
                ));
            }
        };
        let outcome = match raw.error {
            Some(error) => Err(RemoteError::from(error).into()),
            None => Ok(raw.result.unwrap_or(Value::Null)),
        };
        Ok(Self {
            correlation,
            outcome,
        })
    }

    /// Encodes the packet the way a server sends it, for mock servers.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::SerdeJsonError`] if the payload cannot be
    /// written as JSON text.
    pub fn to_frame(&self) -> Result<String> {
        let (field, key) = match &self.correlation {
            Correlation::Callback(key) => ("callback", key),
            Correlation::Event(key) => ("event", key),
        };
        let mut object = serde_json::Map::new();
        object.insert(field.to_string(), key.clone());
        match &self.outcome {
            Ok(value) => {
                object.insert("result".to_string(), value.clone());
            }
            Err(error) => {
                let payload = RemoteError {
                    code: error.code.clone().unwrap_or(Value::Null),
                    message: error.msg.clone(),
                };
                object.insert("error".to_string(), serde_json::to_value(payload)?);
            }
        }
        Ok(serde_json::to_string(&object)?)
    }
}
