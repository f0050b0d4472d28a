use chrono::{DateTime, Utc};

use crate::claims::DecodedPayload;
use crate::error::AuthError;
use crate::roles::AllowedRoleSet;

/// Outcome of checking a payload against a route's role set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    Allowed,
    Forbidden,
    Unauthenticated,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allowed => "allowed",
            Decision::Forbidden => "forbidden",
            Decision::Unauthenticated => "unauthenticated",
        }
    }
}

/// Full check: a missing or expired payload is `Unauthenticated`, otherwise
/// the role decides.
pub fn authorize(
    payload: Option<&DecodedPayload>,
    allowed: &AllowedRoleSet,
    now: DateTime<Utc>,
) -> Decision {
    match payload {
        Some(payload) if !payload.is_expired_at(now) => authorize_role(Some(payload), allowed),
        _ => Decision::Unauthenticated,
    }
}

/// Role-only check, used for a token the server has just minted.
pub fn authorize_role(payload: Option<&DecodedPayload>, allowed: &AllowedRoleSet) -> Decision {
    let Some(payload) = payload else {
        return Decision::Unauthenticated;
    };

    if allowed.permits(payload.role.as_deref()) {
        Decision::Allowed
    } else {
        Decision::Forbidden
    }
}

/// `Result` flavour of [`authorize`] for call sites that propagate with `?`.
pub fn ensure_role(
    payload: Option<&DecodedPayload>,
    allowed: &AllowedRoleSet,
    now: DateTime<Utc>,
) -> Result<(), AuthError> {
    match authorize(payload, allowed, now) {
        Decision::Allowed => Ok(()),
        Decision::Unauthenticated => Err(AuthError::Unauthenticated),
        Decision::Forbidden => Err(AuthError::Forbidden {
            role: payload.and_then(|payload| payload.role.clone()),
            required: allowed.to_vec(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn payload(role: Option<&str>, exp_offset_secs: i64) -> DecodedPayload {
        let exp = (Utc::now() + Duration::seconds(exp_offset_secs)).timestamp();
        let mut value = json!({ "exp": exp });
        if let Some(role) = role {
            value["role"] = json!(role);
        }
        DecodedPayload::from_value(value).expect("payload")
    }

    #[test]
    fn member_role_is_allowed() {
        let payload = payload(Some("student"), 3600);
        let allowed = AllowedRoleSet::new(["student", "teacher"]);
        assert_eq!(authorize(Some(&payload), &allowed, Utc::now()), Decision::Allowed);
    }

    #[test]
    fn non_member_role_is_forbidden() {
        let payload = payload(Some("guest"), 3600);
        let allowed = AllowedRoleSet::new(["admin"]);
        assert_eq!(authorize(Some(&payload), &allowed, Utc::now()), Decision::Forbidden);
    }

    #[test]
    fn unrestricted_set_allows_any_role() {
        let allowed = AllowedRoleSet::any();
        for role in [Some("guest"), Some("admin"), None] {
            let payload = payload(role, 60);
            assert_eq!(authorize(Some(&payload), &allowed, Utc::now()), Decision::Allowed);
        }
    }

    #[test]
    fn expired_or_missing_payload_is_unauthenticated() {
        let expired = payload(Some("admin"), -10);
        let allowed = AllowedRoleSet::new(["admin"]);
        assert_eq!(
            authorize(Some(&expired), &allowed, Utc::now()),
            Decision::Unauthenticated
        );
        assert_eq!(authorize(None, &allowed, Utc::now()), Decision::Unauthenticated);
    }

    #[test]
    fn role_check_ignores_expiry() {
        let expired = payload(Some("admin"), -10);
        let allowed = AllowedRoleSet::new(["admin"]);
        assert_eq!(authorize_role(Some(&expired), &allowed), Decision::Allowed);
        assert_eq!(authorize_role(None, &allowed), Decision::Unauthenticated);
    }

    #[test]
    fn ensure_role_reports_required_roles() {
        let payload = payload(Some("user"), 60);
        let allowed = AllowedRoleSet::new(["admin", "staff"]);
        let err = ensure_role(Some(&payload), &allowed, Utc::now()).expect_err("forbidden");
        assert_eq!(
            err,
            AuthError::Forbidden {
                role: Some("user".into()),
                required: vec!["admin".into(), "staff".into()],
            }
        );
        assert!(ensure_role(Some(&payload), &AllowedRoleSet::any(), Utc::now()).is_ok());
    }
}
