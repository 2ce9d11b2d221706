/// Data layer: container decoding, transforms and the tidy model.
///
/// Architecture:
/// ```text
///  .mat (1 or 2 containers)
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  matfile → RawMatrixSet (shape-checked)
///   └──────────┘
///        │                         │
///        ▼                         ▼
///   ┌──────────┐            ┌──────────┐
///   │  points   │            │ baseline  │  master/slave table
///   └──────────┘            └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ sampler   │  n distinct points
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │   tidy    │  melt → DisplacementSample rows   (dates via `date`)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ TidyModel │  queries through `filter`, written out by `export`
///   └──────────┘
/// ```

pub mod baseline;
pub mod date;
pub mod export;
pub mod filter;
pub mod loader;
pub mod matfile;
pub mod model;
pub mod points;
pub mod sampler;
pub mod tidy;
