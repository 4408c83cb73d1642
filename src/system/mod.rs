//! # System Interaction Layer
//!
//! The boundary between the rendering core and the filesystem.
//!
//! ## Modules
//!
//! - **`storage`**: The `Storage` trait used to read template sources and write
//!   rendered files, with a filesystem backend and an in-memory one.
//! - **`writer`**: Persists a render output through a `Storage`, refusing to
//!   clobber existing files unless asked to, and rolling back partial writes.

pub mod storage;
pub mod writer;
