//! # CsimLib
//!
//! Csimlib simulates a set-associative cache with least recently used replacement, replaying
//! valgrind-style memory traces and counting hits, misses and evictions
//!
//! No data is stored, the model only tracks which blocks are resident and how recently each was
//! used. A trace is replayed strictly in order on one thread, so the same trace and configuration
//! always produce the same counts

/// Contains the cache model: address decomposition, lines and sets, and access classification
pub mod cache;

/// Contains the cache geometry, both as given by the user and validated
pub mod config;

/// Contains the error types for configuration and trace reading
pub mod error;

/// Contains a helper for opening trace files
pub mod io;

// Recency bookkeeping used by the cache
mod lru;

/// Contains the simulator used to replay a trace against a cache
pub mod simulator;

/// Contains the trace record format and a reader for it
pub mod trace;


/// Contains utilities for running tests and benchmarks.
pub mod util;
