//! Walker state shared by the referent, referrer and cycle walks.
//!
//! A [`Tree`] owns the ignore-set and seen-set for one root. Walks are
//! lazy: [`TreeWalk`] keeps an explicit stack of pending edge lists, one per
//! depth level, so each `next()` resumes where the previous one stopped and
//! deep graphs never grow the native call stack.
//!
//! Edge lists are copied out of the introspector when a level is entered,
//! and the walk holds a shared borrow of the introspector for its whole
//! lifetime.

use crate::introspect::{ExecutionContext, GraphIntrospector};
use crate::object::{ObjectData, ObjectId};
use crate::repr::{MAX_REPR_LEN, get_repr};
use log::{debug, trace};
use std::collections::HashSet;
use std::fmt;
use std::io::{self, Write};

/// Source location the walkers run under. Frames from this location are
/// never reported as referrers.
pub const ENGINE_SOURCE: &str = file!();

pub const MAX_RESULTS_REACHED: &str = "max results reached";
pub const MAX_DEPTH_REACHED: &str = "max depth reached";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Object,
    /// Already emitted earlier in this walk; not descended again.
    Repeat,
    MaxDepth,
    MaxResults,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub depth: usize,
    /// `None` for sentinels.
    pub id: Option<ObjectId>,
    pub kind: EntryKind,
    pub label: String,
}

impl Entry {
    pub fn object(depth: usize, id: ObjectId, label: String) -> Self {
        Self {
            depth,
            id: Some(id),
            kind: EntryKind::Object,
            label,
        }
    }

    pub fn repeat(depth: usize, id: ObjectId, label: String) -> Self {
        Self {
            depth,
            id: Some(id),
            kind: EntryKind::Repeat,
            label: format!("!{label}"),
        }
    }

    pub fn max_depth(depth: usize) -> Self {
        Self {
            depth,
            id: None,
            kind: EntryKind::MaxDepth,
            label: MAX_DEPTH_REACHED.to_string(),
        }
    }

    pub fn max_results() -> Self {
        Self {
            depth: 0,
            id: None,
            kind: EntryKind::MaxResults,
            label: MAX_RESULTS_REACHED.to_string(),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.id.is_none()
    }

    /// Identity as printed; sentinels print as `0`.
    pub fn raw_id(&self) -> usize {
        self.id.map(|id| id.as_usize()).unwrap_or(0)
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>9} {:indent$} {}",
            self.raw_id(),
            "",
            self.label,
            indent = self.depth * 2
        )
    }
}

/// Host identities that make up a walker's own bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Internals {
    pub walker: Option<ObjectId>,
    pub state: Option<ObjectId>,
    pub seen: Option<ObjectId>,
    pub ignore: Option<ObjectId>,
    pub root_holder: Option<ObjectId>,
}

impl Internals {
    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + use<> {
        [
            self.walker,
            self.state,
            self.seen,
            self.ignore,
            self.root_holder,
        ]
        .into_iter()
        .flatten()
    }
}

/// Counters for one walk, logged when it finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub emitted: usize,
    pub repeats: usize,
    pub ignored: usize,
    pub frames_skipped: usize,
    pub depth_stops: usize,
}

pub struct Tree<'g, G: GraphIntrospector + ?Sized> {
    graph: &'g G,
    root: ObjectId,
    source: String,
    ignore: HashSet<ObjectId>,
    seen: HashSet<ObjectId>,
    internals: Internals,
    repr_limit: usize,
}

impl<'g, G: GraphIntrospector + ?Sized> Tree<'g, G> {
    pub fn new(graph: &'g G, root: ObjectId) -> Self {
        Self {
            graph,
            root,
            source: ENGINE_SOURCE.to_string(),
            ignore: HashSet::new(),
            seen: HashSet::new(),
            internals: Internals::default(),
            repr_limit: MAX_REPR_LEN,
        }
    }

    pub fn root(&self) -> ObjectId {
        self.root
    }

    pub fn graph(&self) -> &'g G {
        self.graph
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Overrides the source location whose frames are hidden from referrer walks.
    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
    }

    /// Registers the host objects mirroring this walker. They are ignored on
    /// every subsequent walk.
    pub fn set_internals(&mut self, internals: Internals) {
        self.internals = internals;
    }

    pub fn internals(&self) -> &Internals {
        &self.internals
    }

    pub fn set_repr_limit(&mut self, limit: usize) {
        self.repr_limit = limit;
    }

    pub fn repr_limit(&self) -> usize {
        self.repr_limit
    }

    pub fn ignore<I: IntoIterator<Item = ObjectId>>(&mut self, ids: I) {
        self.ignore.extend(ids);
    }

    pub fn ignore_context(&mut self, ctx: &ExecutionContext) {
        self.ignore(ctx.ids());
    }

    /// Ignores the frames and bindings of the code invoking the walk and of
    /// its caller.
    pub fn ignore_caller(&mut self) {
        for depth in 0..2 {
            if let Some(ctx) = self.graph.execution_context(depth) {
                self.ignore_context(&ctx);
            }
        }
    }

    pub fn is_ignored(&self, id: ObjectId) -> bool {
        self.ignore.contains(&id)
    }

    pub fn is_seen(&self, id: ObjectId) -> bool {
        self.seen.contains(&id)
    }

    pub fn ignored_count(&self) -> usize {
        self.ignore.len()
    }

    /// Returns `false` if `id` was already seen.
    pub(crate) fn mark_seen(&mut self, id: ObjectId) -> bool {
        self.seen.insert(id)
    }

    pub(crate) fn label(&self, id: ObjectId) -> String {
        get_repr(self.graph, id, self.repr_limit)
    }

    /// Resets per-walk state and excludes the walker's own objects.
    pub(crate) fn begin(&mut self, ignore_root: bool) {
        self.seen.clear();
        let internals: Vec<ObjectId> = self.internals.ids().collect();
        self.ignore(internals);
        if ignore_root {
            self.ignore.insert(self.root);
        }
        self.ignore_caller();
    }

    pub(crate) fn is_engine_frame(&self, id: ObjectId) -> bool {
        match self.graph.object(id).map(|obj| &obj.data) {
            Some(ObjectData::Frame(frame)) => frame.filename == self.source,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Referents,
    Referrers,
}

struct Level {
    depth: usize,
    edges: std::vec::IntoIter<ObjectId>,
}

/// Lazy depth-first walk over referents or referrers.
pub struct TreeWalk<'w, 'g, G: GraphIntrospector + ?Sized> {
    tree: &'w mut Tree<'g, G>,
    direction: Direction,
    max_results: usize,
    max_depth: Option<usize>,
    stack: Vec<Level>,
    pending: Option<Entry>,
    /// Object emitted by the last pull, entered at the start of the next one.
    deferred: Option<(ObjectId, usize)>,
    count: usize,
    stats: WalkStats,
    finished: bool,
}

impl<'w, 'g, G: GraphIntrospector + ?Sized> TreeWalk<'w, 'g, G> {
    pub(crate) fn new(
        tree: &'w mut Tree<'g, G>,
        direction: Direction,
        max_results: usize,
        max_depth: Option<usize>,
    ) -> Self {
        tree.begin(true);
        let max_depth = max_depth.filter(|&depth| depth > 0);
        let root = tree.root;
        debug!(
            "walking {direction:?} of {root} (max_results={max_results}, \
             max_depth={max_depth:?}, ignoring {})",
            tree.ignored_count()
        );

        let mut walk = Self {
            tree,
            direction,
            max_results,
            max_depth,
            stack: Vec::new(),
            pending: None,
            deferred: None,
            count: 0,
            stats: WalkStats::default(),
            finished: false,
        };
        walk.enter(root, 0);
        walk
    }

    pub fn stats(&self) -> WalkStats {
        self.stats
    }

    fn enter(&mut self, obj: ObjectId, depth: usize) {
        if self.max_depth.is_some_and(|max| depth >= max) {
            self.stats.depth_stops += 1;
            self.pending = Some(Entry::max_depth(depth));
            return;
        }

        let edges = match self.direction {
            Direction::Referents => self.tree.graph.referents(obj),
            Direction::Referrers => {
                let referrers = self.tree.graph.referrers(obj);
                if !referrers.scaffolding.is_empty() {
                    trace!(
                        "ignoring {} scaffolding objects of the referrer query for {obj}",
                        referrers.scaffolding.len()
                    );
                }
                self.tree.ignore(referrers.scaffolding);
                referrers.edges
            }
        };

        self.stack.push(Level {
            depth,
            edges: edges.into_iter(),
        });
    }

    fn advance(&mut self) -> Option<Entry> {
        if let Some((id, depth)) = self.deferred.take() {
            self.enter(id, depth);
        }
        if let Some(entry) = self.pending.take() {
            return Some(entry);
        }

        loop {
            let level = self.stack.last_mut()?;
            let depth = level.depth;
            let Some(id) = level.edges.next() else {
                self.stack.pop();
                continue;
            };

            if self.direction == Direction::Referrers && self.tree.is_engine_frame(id) {
                trace!("skipping engine frame {id}");
                self.stats.frames_skipped += 1;
                continue;
            }

            if self.tree.is_ignored(id) {
                self.stats.ignored += 1;
                continue;
            }

            if !self.tree.mark_seen(id) {
                self.stats.repeats += 1;
                return Some(Entry::repeat(depth, id, self.tree.label(id)));
            }

            self.deferred = Some((id, depth + 1));
            return Some(Entry::object(depth, id, self.tree.label(id)));
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        self.stack.clear();
        self.pending = None;
        self.deferred = None;
        debug!("walk of {} finished: {:?}", self.tree.root, self.stats);
    }
}

impl<G: GraphIntrospector + ?Sized> Iterator for TreeWalk<'_, '_, G> {
    type Item = Entry;

    fn next(&mut self) -> Option<Entry> {
        if self.finished {
            return None;
        }

        if self.max_results > 0 && self.count >= self.max_results {
            self.finish();
            return Some(Entry::max_results());
        }

        match self.advance() {
            Some(entry) => {
                self.count += 1;
                self.stats.emitted += 1;
                Some(entry)
            }
            None => {
                self.finish();
                None
            }
        }
    }
}

/// Writes one line per entry.
pub(crate) fn write_entries<W, I>(out: &mut W, entries: I) -> io::Result<()>
where
    W: Write + ?Sized,
    I: IntoIterator<Item = Entry>,
{
    for entry in entries {
        writeln!(out, "{entry}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::Heap;
    use crate::object::PyObject;

    #[test]
    fn test_entry_display_indents_by_depth() {
        let id = ObjectId { id: 42 };
        let entry = Entry::object(2, id, "int".to_string());
        assert_eq!(entry.to_string(), "       42      int");

        let root_level = Entry::object(0, id, "x".to_string());
        assert_eq!(root_level.to_string(), "       42  x");
    }

    #[test]
    fn test_sentinels_print_zero() {
        let entry = Entry::max_results();
        assert!(entry.is_sentinel());
        assert_eq!(entry.raw_id(), 0);
        assert_eq!(entry.to_string(), "        0  max results reached");
        assert_eq!(Entry::max_depth(3).label, MAX_DEPTH_REACHED);
    }

    #[test]
    fn test_repeat_label_is_marked() {
        let entry = Entry::repeat(1, ObjectId::new(), "int".to_string());
        assert_eq!(entry.label, "!int");
        assert_eq!(entry.kind, EntryKind::Repeat);
    }

    #[test]
    fn test_ignore_is_idempotent() {
        let heap = Heap::new();
        let a = ObjectId::new();
        let mut tree = Tree::new(&heap, ObjectId::new());

        tree.ignore([a]);
        tree.ignore([a, a]);
        assert!(tree.is_ignored(a));
        assert_eq!(tree.ignored_count(), 1);
    }

    #[test]
    fn test_ignore_caller_covers_two_frames() {
        let mut heap = Heap::new();
        let builtins = heap.add_object(PyObject::dict(Vec::new()));
        let globals = heap.add_object(PyObject::dict(Vec::new()));
        let outermost_locals = heap.add_object(PyObject::dict(Vec::new()));
        let caller_locals = heap.add_object(PyObject::dict(Vec::new()));
        let invoker_locals = heap.add_object(PyObject::dict(Vec::new()));
        let outermost = heap
            .enter_frame("main.py", 1, outermost_locals, globals, builtins)
            .unwrap();
        let caller = heap
            .enter_frame("main.py", 2, caller_locals, globals, builtins)
            .unwrap();
        let invoker = heap
            .enter_frame("main.py", 3, invoker_locals, globals, builtins)
            .unwrap();

        let mut tree = Tree::new(&heap, ObjectId::new());
        tree.ignore_caller();

        for id in [
            invoker,
            invoker_locals,
            caller,
            caller_locals,
            globals,
            builtins,
        ] {
            assert!(tree.is_ignored(id));
        }
        assert!(!tree.is_ignored(outermost));
        assert!(!tree.is_ignored(outermost_locals));
    }

    #[test]
    fn test_begin_ignores_internals_and_resets_seen() {
        let mut heap = Heap::new();
        let root = heap.add_object(PyObject::list(Vec::new()));
        let internals = heap.register_walker(root);

        let mut tree = Tree::new(&heap, root);
        tree.set_internals(internals.clone());
        tree.mark_seen(root);
        tree.begin(true);

        assert!(!tree.is_seen(root));
        assert!(tree.is_ignored(root));
        for id in internals.ids() {
            assert!(tree.is_ignored(id));
        }
    }

    #[test]
    fn test_engine_frames_match_source() {
        let mut heap = Heap::new();
        let d = heap.add_object(PyObject::dict(Vec::new()));
        let engine = heap.enter_frame(ENGINE_SOURCE, 1, d, d, d).unwrap();
        let user = heap.enter_frame("app.py", 1, d, d, d).unwrap();

        let mut tree = Tree::new(&heap, d);
        assert!(tree.is_engine_frame(engine));
        assert!(!tree.is_engine_frame(user));
        assert!(!tree.is_engine_frame(d));

        tree.set_source("app.py");
        assert!(tree.is_engine_frame(user));
    }

    #[test]
    fn test_write_entries() {
        let mut out = Vec::new();
        write_entries(&mut out, [Entry::max_depth(1), Entry::max_results()])
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "        0    max depth reached\n        0  max results reached\n"
        );
    }
}
