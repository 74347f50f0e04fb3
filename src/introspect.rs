//! The reflection surface the walkers need from a host runtime.
//!
//! Every walker is generic over [`GraphIntrospector`]; the bundled
//! [`crate::heap::Heap`] is one implementation, a foreign runtime adapter
//! would be another.

use crate::object::{ObjectId, PyObject};

/// Result of an inward-edge query.
#[derive(Debug, Clone, Default)]
pub struct Referrers {
    /// Objects holding a direct reference to the queried object.
    pub edges: Vec<ObjectId>,
    /// Objects the host allocated to answer the query. They refer to the
    /// queried object for as long as the answer is alive and must be ignored.
    pub scaffolding: Vec<ObjectId>,
}

impl Referrers {
    pub fn new(edges: Vec<ObjectId>) -> Self {
        Self {
            edges,
            scaffolding: Vec::new(),
        }
    }
}

/// Bindings visible to one activation on the host's call stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionContext {
    pub frame: ObjectId,
    pub locals: ObjectId,
    pub globals: ObjectId,
    pub builtins: ObjectId,
}

impl ExecutionContext {
    pub fn ids(&self) -> [ObjectId; 4] {
        [self.frame, self.locals, self.globals, self.builtins]
    }
}

pub trait GraphIntrospector {
    fn object(&self, id: ObjectId) -> Option<&PyObject>;

    /// Outward edges of `id`. Unknown ids have none.
    fn referents(&self, id: ObjectId) -> Vec<ObjectId>;

    /// Inward edges of `id`.
    fn referrers(&self, id: ObjectId) -> Referrers;

    fn live_objects(&self) -> Vec<ObjectId>;

    /// Context of the activation `depth` levels below the innermost one.
    /// `0` is the code that invoked the walker.
    fn execution_context(&self, depth: usize) -> Option<ExecutionContext>;
}
