//! Transport layer (HTTP/JSON).
//!
//! Decodes requests and maps engine errors to HTTP responses. The engine never
//! depends on this module.

pub mod http;
