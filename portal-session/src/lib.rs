//! Session bootstrap and cross-origin routing for the user portal and the
//! admin console.
//!
//! Every page load probes the identity provider once, derives the admin
//! capability from the returned identity and decides whether to render the
//! current app, send an admin to the admin origin, or deny access.

pub mod capability;
pub mod client;
pub mod error;
pub mod origin;
pub mod probe;
pub mod router;

pub use capability::CapabilityPolicy;
pub use client::{Navigation, PortalClient};
pub use error::PortalError;
pub use origin::{OriginKind, Origins};
pub use probe::{Bootstrap, SessionProbe};
pub use router::{Decision, PrivilegeRouter, SessionState};
