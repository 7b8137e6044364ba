//! Seismic observable prediction engine: request/response data model,
//! attribute-indexed capability lookup, concurrent batch dispatch over
//! pooled predictor clones, ordered uncertainty fallback, and a
//! distributable task envelope for remote execution.

pub mod dispatch;
pub mod distributed;
pub mod domain;
pub mod geodesy;
pub mod grid;
pub mod lookup;
pub mod predictors;
pub mod settings;
pub mod uncertainty;
