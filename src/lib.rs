//! # ocrs - OCR upload service with text-orientation analysis
//!
//! Accepts uploaded images or PDFs, hands them to an external PaddleOCR-style
//! engine and returns recognized text, confidences and bounding polygons,
//! together with an orientation analysis of every text block.
//!
//! ## Orientation
//!
//! ```rust
//! use ocrs::{aggregate, classify, BoundingPolygon, Orientation, Point};
//!
//! let line: BoundingPolygon = [(0.0, 0.0), (100.0, 0.0), (100.0, 20.0), (0.0, 20.0)]
//!     .into_iter()
//!     .map(Point::from)
//!     .collect();
//! let column: BoundingPolygon = [(0.0, 0.0), (10.0, 0.0), (10.0, 100.0), (0.0, 100.0)]
//!     .into_iter()
//!     .map(Point::from)
//!     .collect();
//!
//! assert_eq!(classify(&line), Orientation::Horizontal);
//! assert_eq!(classify(&column), Orientation::Vertical);
//!
//! let tally = aggregate([&line, &column]);
//! assert!(tally.has_vertical());
//! assert!(!tally.has_rotated());
//! ```
//!
//! ## Engines
//!
//! The recognizer is anything implementing [`OcrEngine`]. The shipped
//! [`CommandEngine`] runs an external program that prints its result as JSON;
//! [`postprocess::normalize`] turns the engine's raw shapes into
//! [`Detection`]s. [`EngineRegistry`] builds one engine per language from the
//! first configuration tier that works.

pub mod engine;
pub mod geometry;
pub mod orientation;
pub mod pipeline;
pub mod postprocess;
pub mod preprocess;
pub mod registry;
pub mod server;
pub mod types;
pub mod upload;

// FFI module for C bindings
#[cfg(feature = "ffi")]
pub mod ffi;

// Public API exports
pub use crate::engine::{CommandEngine, CommandEngineFactory, EngineError, EngineFactory, OcrEngine};
pub use crate::geometry::{BoundingPolygon, Point};
pub use crate::orientation::{aggregate, classify, Orientation, OrientationTally, OrientationThresholds};
pub use crate::pipeline::{BlockReport, OcrPipeline, PageReport};
pub use crate::postprocess::Detection;
pub use crate::registry::EngineRegistry;
pub use crate::types::{EngineTier, Settings};
