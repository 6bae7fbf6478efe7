//! Cross-cutting request and response processing layered onto the router.

pub mod security_headers;
pub mod validation;
