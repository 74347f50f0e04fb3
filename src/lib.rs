//! Live object-graph leak finder.
//!
//! Walks the object graph of a running heap from a chosen root, outward
//! (what the root holds) and inward (who holds the root), finds cycles that
//! lead back to the root, and counts live objects by type. The walkers work
//! against any host implementing [`GraphIntrospector`]; [`Heap`] is the
//! bundled in-process host.

pub mod census;
pub mod config;
pub mod cycles;
pub mod error;
pub mod heap;
pub mod introspect;
pub mod object;
pub mod referents;
pub mod referrers;
pub mod repr;
pub mod tree;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    pub objects: usize,
    pub references: usize,
    pub frames: usize,
    pub interned: usize,
}

pub use census::count_objects;
pub use config::WalkConfig;
pub use cycles::{CircularReferents, CycleItem};
pub use error::{DowserError, ReprError};
pub use heap::Heap;
pub use introspect::{ExecutionContext, GraphIntrospector, Referrers};
pub use object::{ObjectData, ObjectId, PyObject};
pub use referents::ReferentTree;
pub use referrers::ReferrerTree;
pub use repr::get_repr;
pub use tree::{Entry, EntryKind, Internals, Tree};

pub type DowserResult<T> = Result<T, DowserError>;

/// Installs `env_logger`, filtered by `RUST_LOG` (default `warn`).
/// Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .is_test(cfg!(test))
        .try_init();
}
