//! Core protocol types for pathrpc.
//!
//! This crate provides shared types and functions used by both the server
//! (`pathrpc-axum`) and client (`pathrpc-client`) crates.
//!
//! ## Modules
//!
//! - [`value`]: The [`Value`] model carried in query strings
//! - [`query`]: The compact URL-safe codec for [`Value`] objects
//! - [`path`]: Path pattern lexing and the compiled route [`Matcher`]
//! - [`json_seq`]: JSON text sequence framing (RFC 7464)
//! - [`route`]: Route descriptions shared by server and client
//! - [`error`]: Error types

pub mod error;
pub mod json_seq;
pub mod path;
pub mod query;
pub mod route;
pub mod value;

pub use error::*;
pub use path::{Match, Matcher, ParamValue, Params, PathToken};
pub use route::{QueryMode, ResultFormat, RouteSpec};
pub use value::{Object, Value};
