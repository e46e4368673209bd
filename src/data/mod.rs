//! Data ingestion and storage
//!
//! Season extract download and parsing, SQLite storage, the fold split, and
//! the model matrix handed to training.

pub mod database;
pub mod dataset;
pub mod extract;
pub mod matrix;
pub mod source;
pub mod split;

pub use database::{Database, DatabaseStats};
pub use dataset::{Partition, PlayBatch, SplitPartitions};
pub use extract::{read_extract, read_extract_file, RawPlay};
pub use matrix::{MatrixRow, ModelMatrix};
pub use source::SeasonSource;
pub use split::{Fold, FoldSplit};
