//! Local logic behind the studio: prompt sanitizing, gallery queries, upload
//! validation, and the persisted image library.

pub mod blob_store;
pub mod gallery;
pub mod library;
pub mod sanitizer;
pub mod stats;
pub mod validation;

pub use gallery::derive_view;
pub use library::Library;
pub use sanitizer::sanitize;
