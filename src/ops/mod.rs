//! Operation dispatch layer.
//!
//! The dispatcher sits between the HTTP handlers and the geometry engine:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │               OpService                 │
//! │   (CRS normalization + dispatch onto    │
//! │    the fixed operation set)             │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │    geometry library (overlay, buffer)   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`Operation`]: the fixed operation set with wire-name parsing
//! - [`OpRequest`]: parameters for one dispatch call
//! - [`OpService`]: normalizes CRS, applies the operation, reprojects the
//!   result to EPSG:4326

pub mod operation;
pub mod service;

pub use operation::Operation;
pub use service::{OpRequest, OpService};
