use crate::core::config::ConfigError;
use crate::core::errors::BeyondhError;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// A logical remote-procedure invocation before it is signed.
///
/// Serializes to the raw call body `{"method": ..., "content": {...}}` that the
/// body rewrite stage later replaces with a signed [`Envelope`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    method: String,
    content: Map<String, Value>,
}

impl Call {
    /// Create a call with no content fields
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            content: Map::new(),
        }
    }

    /// Create a call from an already assembled content map
    pub fn with_content(method: impl Into<String>, content: Map<String, Value>) -> Self {
        Self {
            method: method.into(),
            content,
        }
    }

    /// Create a call from any serializable value that encodes as a JSON object.
    ///
    /// `null` is accepted and treated as empty content; any other non-object
    /// value is rejected before anything is sent.
    pub fn from_serializable<T: Serialize + ?Sized>(
        method: impl Into<String>,
        content: &T,
    ) -> Result<Self, BeyondhError> {
        match serde_json::to_value(content)? {
            Value::Object(map) => Ok(Self::with_content(method, map)),
            Value::Null => Ok(Self::new(method)),
            other => Err(BeyondhError::InvalidCall(format!(
                "call content must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Add a content field
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.content.insert(key.into(), value.into());
        self
    }

    /// Add an optional content field; `None` is recorded as `null`
    pub fn optional<V: Into<Value>>(self, key: impl Into<String>, value: Option<V>) -> Self {
        let value = value.map_or(Value::Null, Into::into);
        self.param(key, value)
    }

    /// Add a content field from any serializable value
    pub fn try_param<T: Serialize + ?Sized>(
        self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<Self, BeyondhError> {
        let value = serde_json::to_value(value)?;
        Ok(self.param(key, value))
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn content(&self) -> &Map<String, Value> {
        &self.content
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Digest algorithm named in an envelope's `SignType` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SignType {
    #[default]
    #[serde(rename = "MD5")]
    Md5,
    #[serde(rename = "SHA256")]
    Sha256,
}

impl SignType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Sha256 => "SHA256",
        }
    }
}

impl fmt::Display for SignType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MD5" => Ok(Self::Md5),
            "SHA256" | "SHA-256" => Ok(Self::Sha256),
            other => Err(ConfigError::InvalidConfiguration(format!(
                "unsupported sign type: {}",
                other
            ))),
        }
    }
}

/// The signed wire payload POSTed to the open API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Envelope {
    pub channel_key: String,
    pub method: String,
    /// JSON text of the call content
    pub biz_content: String,
    /// Build time, `YYYY-MM-DD HH:MM:SS`
    pub timestamp: String,
    pub sign_type: SignType,
    pub format: String,
    pub charset: String,
    pub version: String,
    pub sign: String,
}

impl Envelope {
    pub const FORMAT: &'static str = "json";
    pub const CHARSET: &'static str = "utf-8";
    pub const VERSION: &'static str = "1.0";

    /// Every field except `Sign`, keyed by wire name.
    pub fn signing_fields(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("ChannelKey", Value::from(self.channel_key.as_str())),
            ("Method", Value::from(self.method.as_str())),
            ("BizContent", Value::from(self.biz_content.as_str())),
            ("Timestamp", Value::from(self.timestamp.as_str())),
            ("SignType", Value::from(self.sign_type.as_str())),
            ("Format", Value::from(self.format.as_str())),
            ("Charset", Value::from(self.charset.as_str())),
            ("Version", Value::from(self.version.as_str())),
        ]
    }
}

/// A request travelling through the middleware pipeline
#[derive(Debug, Clone)]
pub struct ApiRequest {
    call: Call,
    pub headers: HeaderMap,
    pub body: Bytes,
    envelope: Option<Envelope>,
}

impl ApiRequest {
    /// Wrap a call; the initial body is the raw call JSON
    pub fn new(call: Call) -> Result<Self, BeyondhError> {
        let body = Bytes::from(serde_json::to_vec(&call)?);
        Ok(Self {
            call,
            headers: HeaderMap::new(),
            body,
            envelope: None,
        })
    }

    pub fn call(&self) -> &Call {
        &self.call
    }

    pub fn envelope(&self) -> Option<&Envelope> {
        self.envelope.as_ref()
    }

    pub fn is_signed(&self) -> bool {
        self.envelope.is_some()
    }

    /// Replace the body with the serialized envelope
    pub fn attach_envelope(&mut self, envelope: Envelope) -> Result<(), BeyondhError> {
        self.body = Bytes::from(serde_json::to_vec(&envelope)?);
        self.envelope = Some(envelope);
        Ok(())
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Raw HTTP response; the body is fully buffered and cheap to clone
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Deserialize the body; the body itself is left untouched
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, BeyondhError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_call_serializes_as_raw_body() {
        let call = Call::new("Bill.GetBillBalance")
            .param("OrgId", 1001)
            .optional::<String>("Memo", None);

        let body = serde_json::to_value(&call).unwrap();
        assert_eq!(
            body,
            json!({"method": "Bill.GetBillBalance", "content": {"OrgId": 1001, "Memo": null}})
        );
    }

    #[test]
    fn test_call_from_serializable_rejects_non_objects() {
        assert!(Call::from_serializable("A.B", &json!({"x": 1})).is_ok());
        assert!(Call::from_serializable("A.B", &()).unwrap().content().is_empty());

        let err = Call::from_serializable("A.B", &vec![1, 2]).unwrap_err();
        assert!(matches!(err, BeyondhError::InvalidCall(_)));
    }

    #[test]
    fn test_sign_type_parsing() {
        assert_eq!("md5".parse::<SignType>().unwrap(), SignType::Md5);
        assert_eq!("SHA256".parse::<SignType>().unwrap(), SignType::Sha256);
        assert!("crc32".parse::<SignType>().is_err());
        assert_eq!(serde_json::to_string(&SignType::Sha256).unwrap(), "\"SHA256\"");
    }

    #[test]
    fn test_response_json_parse_failure() {
        let response = ApiResponse::new(StatusCode::BAD_GATEWAY, HeaderMap::new(), "<html>");

        let err = response.json::<Value>().unwrap_err();
        assert!(matches!(err, BeyondhError::Serialization(_)));
        assert!(err.to_string().starts_with("JSON error:"), "{}", err);
        assert_eq!(response.text(), "<html>");
    }

    #[test]
    fn test_envelope_wire_field_names() {
        let envelope = Envelope {
            channel_key: "CH1".to_string(),
            method: "Security.GetRoles".to_string(),
            biz_content: "{}".to_string(),
            timestamp: "2024-01-01 00:00:00".to_string(),
            sign_type: SignType::Md5,
            format: Envelope::FORMAT.to_string(),
            charset: Envelope::CHARSET.to_string(),
            version: Envelope::VERSION.to_string(),
            sign: "ABC".to_string(),
        };

        let text = serde_json::to_string(&envelope).unwrap();
        assert_eq!(
            text,
            r#"{"ChannelKey":"CH1","Method":"Security.GetRoles","BizContent":"{}","Timestamp":"2024-01-01 00:00:00","SignType":"MD5","Format":"json","Charset":"utf-8","Version":"1.0","Sign":"ABC"}"#
        );
        assert!(envelope.signing_fields().iter().all(|(k, _)| *k != "Sign"));
    }
}
