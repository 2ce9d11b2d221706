//! PS-InSAR time-series ingestion.
//!
//! Reads StAMPS `ps_plot` exports (MATLAB v5 containers), rebuilds per-point
//! displacement histories, samples a bounded subset and melts it into a long
//! `(point, date, displacement)` table with a baseline table alongside.
//!
//! # Example
//!
//! ```no_run
//! use psinsar::{Config, Session};
//! use psinsar::data::loader::ContainerInput;
//!
//! let mut session = Session::new(Config::default());
//! let input = ContainerInput::from_path("ps_plot_ts_v-do.mat".as_ref()).unwrap();
//! let model = session.load(vec![input]).unwrap();
//! let first = model.dates()[0];
//! println!("{:?}", model.summary_stats(first, None));
//! ```

pub mod cache;
pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod state;

pub use cache::{CacheKey, Fingerprint, ResultCache};
pub use config::{CacheExpiry, Config, FieldNames, SampleBounds};
pub use data::model::{BaselineRecord, DisplacementSample, Epoch, PointRecord, Role, TidyModel};
pub use error::{PipelineError, Result};
pub use state::Session;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
