use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// Claim set read from an access token payload.
///
/// Derived on demand from the raw token and never stored on its own. The
/// signature has not been checked: anything read here only drives what the
/// client shows, the server re-validates before serving protected data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedPayload {
    pub expires_at: Option<DateTime<Utc>>,
    pub issued_at: Option<DateTime<Utc>>,
    pub role: Option<String>,
    pub email: Option<String>,
    subject: Option<String>,
    pub raw: Value,
}

impl DecodedPayload {
    /// Builds a payload from a parsed JSON document. Anything other than a
    /// JSON object has no claims and yields `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        let object = value.as_object()?;

        Some(Self {
            expires_at: numeric_date(object, "exp"),
            issued_at: numeric_date(object, "iat"),
            role: string_claim(object, "role"),
            email: string_claim(object, "email"),
            subject: identifier_claim(object, "id").or_else(|| identifier_claim(object, "sub")),
            raw: value,
        })
    }

    /// User identifier from the `id` claim, falling back to `sub`.
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// A payload without `exp` counts as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now,
            None => true,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Convenience helper for role checks.
    pub fn has_role(&self, role: &str) -> bool {
        self.role.as_deref() == Some(role)
    }
}

fn numeric_date(object: &Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    let seconds = object.get(key)?.as_f64()?;
    if !seconds.is_finite() {
        return None;
    }
    let millis = (seconds * 1000.0).floor();
    if millis < i64::MIN as f64 || millis > i64::MAX as f64 {
        return None;
    }
    Utc.timestamp_millis_opt(millis as i64).single()
}

fn string_claim(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key)?.as_str().map(str::to_owned)
}

fn identifier_claim(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(value) => Some(value.clone()),
        Value::Number(value) => Some(value.to_string()),
        _ => None,
    }
}
