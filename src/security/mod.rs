//! Inbound API-key protection.
//!
//! Policy, the single protection-key slot and the security-event trail.

pub mod events;
pub mod policy;
pub mod protection;

pub use events::{MAX_SECURITY_EVENTS, SecurityEvent, SecurityEventKind, SecurityEventLog};
pub use policy::{PolicyUpdate, SecurityPolicy};
pub use protection::{
    API_KEY_ENV_VAR, ApiKeyStorage, KeySource, ProtectionConfig, ProtectionOptions,
    ProtectionOutcome,
};
