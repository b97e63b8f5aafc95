//! Bearer token authentication and role authorization

pub mod claims;
pub mod gate;
pub mod validator;

pub use claims::{Role, TokenClaims, UnknownRole};
pub use gate::{authorization_gate, check_credentials, GateDecision};
pub use validator::{TokenError, TokenValidator, ACCEPTED_ALGORITHMS};
