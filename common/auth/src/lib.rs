pub mod claims;
pub mod codec;
pub mod config;
pub mod error;
pub mod guards;
pub mod roles;

pub use claims::DecodedPayload;
pub use codec::{decode, decode_str};
pub use config::SessionConfig;
pub use error::{AuthError, AuthResult};
pub use guards::{authorize, authorize_role, ensure_role, Decision};
pub use roles::{AllowedRoleSet, ROLE_ADMIN, ROLE_STAFF};
