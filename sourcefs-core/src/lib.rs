//! A virtual-filesystem abstraction: one capability interface
//! ([`source::FileSource`]), interchangeable storage backends (disk proxy,
//! in-memory tree), and an adapter that presents the abstraction through a
//! generic path/filesystem API.
//!
//! ## Architecture
//!
//! ### source
//! The capability trait every backend implements: existence/type queries,
//! metadata, permissions, child enumeration, streams, links, versioning.
//!
//! ### disk / memory
//! The two backends. `disk` proxies a native path and delegates permission
//! work to a platform strategy; `memory` keeps a process-local node tree.
//!
//! ### io
//! Pointer-addressed random access: a controller per backend plus the
//! stream that layers a file pointer and typed big-endian encode/decode
//! on top of it.
//!
//! ### provider
//! Bridges the capability interface into directory streams, copy/move and
//! attribute views, so generic path-walking code never sees a backend.
//!
//! ### registry
//! Explicit process state: factory sessions addressable by id, the probed
//! local user, and `filesource:` URL resolution. Nothing here is a global.

pub mod disk;
pub mod error;
pub mod factory;
pub mod io;
pub mod link;
pub mod memory;
pub mod path;
pub mod perms;
pub mod principal;
pub mod provider;
pub mod registry;
pub mod source;
pub mod uri;

pub use error::{FsError, FsResult};
pub use source::{FileSource, FileType, SourceRef};
