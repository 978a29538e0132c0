//! Response body decoding selected by content type.
//!
//! Each [`ContentType`] variant has its own contract for turning a response
//! body into an IP address:
//!
//! - `PlainText`: the trimmed body is the address.
//! - `Json`: a JSON string, or an object with an `ip` (or `address`) field.
//! - `Xml`: a document with an `<ip>` (or `<address>`) child element.
//! - `Form`: a form-encoded body with an `ip` (or `address`) key.

use serde::Deserialize;
use std::net::IpAddr;

/// Response content type, as declared by the `Content-Type` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    /// `application/json` and anything not otherwise recognized.
    Json,
    /// `application/xml`, `text/xml`, `*+xml`.
    Xml,
    /// `application/x-www-form-urlencoded`.
    Form,
    /// `text/*`, or no header at all.
    PlainText,
}

impl ContentType {
    /// Classify a `Content-Type` header value.
    pub fn from_header(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return ContentType::PlainText;
        };
        let mime = value
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if mime.ends_with("/xml") || mime.ends_with("+xml") {
            ContentType::Xml
        } else if mime.ends_with("/x-www-form-urlencoded") {
            ContentType::Form
        } else if mime.starts_with("text/") || mime.is_empty() {
            ContentType::PlainText
        } else {
            ContentType::Json
        }
    }

    /// Short name for logs and errors.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Json => "json",
            ContentType::Xml => "xml",
            ContentType::Form => "form",
            ContentType::PlainText => "text",
        }
    }
}

/// Structured address document shared by the JSON and XML decoders.
#[derive(Debug, Deserialize)]
struct AddressDocument {
    #[serde(alias = "address")]
    ip: String,
}

/// Decode an address from a response body.
pub fn decode_address(content_type: ContentType, body: &str) -> Result<IpAddr, String> {
    let raw = match content_type {
        ContentType::PlainText => body.trim().to_string(),
        ContentType::Json => decode_json(body)?,
        ContentType::Xml => quick_xml::de::from_str::<AddressDocument>(body)
            .map(|doc| doc.ip)
            .map_err(|e| e.to_string())?,
        ContentType::Form => url::form_urlencoded::parse(body.trim().as_bytes())
            .find(|(key, _)| key == "ip" || key == "address")
            .map(|(_, value)| value.into_owned())
            .ok_or_else(|| "no ip field in form body".to_string())?,
    };

    let raw = raw.trim();
    if raw.is_empty() {
        return Err("empty address".to_string());
    }

    raw.parse::<IpAddr>()
        .map_err(|e| format!("{raw:?} is not an IP address: {e}"))
}

fn decode_json(body: &str) -> Result<String, String> {
    let value: serde_json::Value = serde_json::from_str(body).map_err(|e| e.to_string())?;
    match value {
        serde_json::Value::String(s) => Ok(s),
        other => serde_json::from_value::<AddressDocument>(other)
            .map(|doc| doc.ip)
            .map_err(|e| e.to_string()),
    }
}
