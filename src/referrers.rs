use crate::introspect::GraphIntrospector;
use crate::object::ObjectId;
use crate::tree::{Direction, Tree, TreeWalk, write_entries};
use std::io::{self, Write};
use std::ops::{Deref, DerefMut};

/// Walks who holds the root, transitively.
///
/// Answering "who refers to X" creates references of its own: the host's
/// query scaffolding and the engine's own frames. Both are filtered out.
pub struct ReferrerTree<'g, G: GraphIntrospector + ?Sized>(Tree<'g, G>);

impl<'g, G: GraphIntrospector + ?Sized> ReferrerTree<'g, G> {
    pub fn new(graph: &'g G, root: ObjectId) -> Self {
        Self(Tree::new(graph, root))
    }

    pub fn walk(&mut self, max_results: usize, max_depth: Option<usize>) -> TreeWalk<'_, 'g, G> {
        TreeWalk::new(&mut self.0, Direction::Referrers, max_results, max_depth)
    }

    pub fn write_tree<W: Write + ?Sized>(
        &mut self,
        out: &mut W,
        max_results: usize,
        max_depth: Option<usize>,
    ) -> io::Result<()> {
        write_entries(out, self.walk(max_results, max_depth))
    }

    pub fn print_tree(&mut self, max_results: usize, max_depth: Option<usize>) -> io::Result<()> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.write_tree(&mut out, max_results, max_depth)
    }
}

impl<'g, G: GraphIntrospector + ?Sized> Deref for ReferrerTree<'g, G> {
    type Target = Tree<'g, G>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<G: GraphIntrospector + ?Sized> DerefMut for ReferrerTree<'_, G> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::Heap;
    use crate::introspect::{ExecutionContext, Referrers};
    use crate::object::{FrameInfo, ObjectData, PyObject};
    use crate::tree::{ENGINE_SOURCE, Entry, EntryKind};

    /// Host whose referrer queries allocate a result list that itself
    /// refers to every queried object.
    struct ScaffoldingHost {
        heap: Heap,
        result_list: ObjectId,
    }

    impl GraphIntrospector for ScaffoldingHost {
        fn object(&self, id: ObjectId) -> Option<&PyObject> {
            self.heap.object(id)
        }

        fn referents(&self, id: ObjectId) -> Vec<ObjectId> {
            self.heap.referents(id)
        }

        fn referrers(&self, id: ObjectId) -> Referrers {
            let mut referrers = self.heap.referrers(id);
            referrers.edges.insert(0, self.result_list);
            referrers.scaffolding.push(self.result_list);
            referrers
        }

        fn live_objects(&self) -> Vec<ObjectId> {
            self.heap.live_objects()
        }

        fn execution_context(&self, depth: usize) -> Option<ExecutionContext> {
            self.heap.execution_context(depth)
        }
    }

    fn frame(heap: &mut Heap, filename: &str, locals: ObjectId) -> ObjectId {
        let empty = heap.add_object(PyObject::dict(Vec::new()));
        heap.add_object(PyObject::new(ObjectData::Frame(FrameInfo {
            filename: filename.to_string(),
            line: 1,
            back: None,
            locals,
            globals: empty,
            builtins: empty,
        })))
    }

    #[test]
    fn test_walks_holders_outward_from_root() {
        crate::init_logging();
        let mut heap = Heap::new();
        let root = heap.add_object(PyObject::int(7));
        let holder = heap.add_object(PyObject::list(vec![root]));
        let key = heap.intern("cache");
        let owner = heap.add_object(PyObject::dict(vec![(key, holder)]));

        let mut tree = ReferrerTree::new(&heap, root);
        let entries: Vec<Entry> = tree.walk(0, None).collect();

        assert_eq!(entries.len(), 2);
        assert_eq!((entries[0].depth, entries[0].id), (0, Some(holder)));
        assert_eq!((entries[1].depth, entries[1].id), (1, Some(owner)));
        assert_eq!(entries[1].label, "dict of len 1: 'cache': <list of len 1>");
    }

    #[test]
    fn test_shared_holder_is_repeated() {
        let mut heap = Heap::new();
        let root = heap.add_object(PyObject::int(7));
        let a = heap.add_object(PyObject::list(vec![root]));
        let b = heap.add_object(PyObject::list(vec![root]));
        let c = heap.add_object(PyObject::list(vec![a, b]));

        let mut tree = ReferrerTree::new(&heap, root);
        let entries: Vec<Entry> = tree.walk(0, None).collect();

        let shape: Vec<(usize, Option<ObjectId>, EntryKind)> =
            entries.iter().map(|e| (e.depth, e.id, e.kind)).collect();
        assert_eq!(
            shape,
            vec![
                (0, Some(a), EntryKind::Object),
                (1, Some(c), EntryKind::Object),
                (0, Some(b), EntryKind::Object),
                (1, Some(c), EntryKind::Repeat),
            ]
        );
        assert!(entries[3].label.starts_with('!'));
    }

    #[test]
    fn test_query_scaffolding_is_ignored() {
        let mut heap = Heap::new();
        let root = heap.add_object(PyObject::int(7));
        let holder = heap.add_object(PyObject::list(vec![root]));
        let result_list = heap.add_object(PyObject::list(Vec::new()));
        let host = ScaffoldingHost { heap, result_list };

        let mut tree = ReferrerTree::new(&host, root);
        let entries: Vec<Entry> = tree.walk(0, None).collect();

        assert_eq!(
            entries.iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![Some(holder)]
        );
        assert!(tree.is_ignored(result_list));
    }

    #[test]
    fn test_engine_frames_are_skipped() {
        let mut heap = Heap::new();
        let root = heap.add_object(PyObject::dict(Vec::new()));
        let engine = frame(&mut heap, ENGINE_SOURCE, root);
        let user = frame(&mut heap, "app.py", root);

        let mut tree = ReferrerTree::new(&heap, root);
        let walk = tree.walk(0, None);
        let entries: Vec<Entry> = walk.collect();

        assert!(entries.iter().all(|e| e.id != Some(engine)));
        assert_eq!(entries[0].id, Some(user));
        assert_eq!(entries[0].label, "frame from app.py line 1");
    }

    #[test]
    fn test_root_holder_is_ignored_with_internals() {
        let mut heap = Heap::new();
        let root = heap.add_object(PyObject::int(7));
        let holder = heap.add_object(PyObject::list(vec![root]));
        let internals = heap.register_walker(root);

        let mut bare = ReferrerTree::new(&heap, root);
        let bare_ids: Vec<_> = bare.walk(0, None).filter_map(|e| e.id).collect();
        assert!(bare_ids.contains(&internals.root_holder.unwrap()));

        let mut tree = ReferrerTree::new(&heap, root);
        tree.set_internals(internals.clone());
        let ids: Vec<_> = tree.walk(0, None).filter_map(|e| e.id).collect();
        assert_eq!(ids, vec![holder]);
    }

    #[test]
    fn test_caller_locals_are_not_referrers() {
        let mut heap = Heap::new();
        let root = heap.add_object(PyObject::int(7));
        let key = heap.intern("leak");
        let locals = heap.add_object(PyObject::dict(vec![(key, root)]));
        let globals = heap.add_object(PyObject::dict(Vec::new()));
        let builtins = heap.add_object(PyObject::dict(Vec::new()));
        heap.enter_frame("app.py", 3, locals, globals, builtins).unwrap();

        let mut tree = ReferrerTree::new(&heap, root);
        assert_eq!(tree.walk(0, None).count(), 0);

        let mut out = Vec::new();
        tree.write_tree(&mut out, 10, None).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_max_depth_in_referrer_walk() {
        let mut heap = Heap::new();
        let root = heap.add_object(PyObject::int(7));
        let mut holder = heap.add_object(PyObject::list(vec![root]));
        for _ in 0..4 {
            holder = heap.add_object(PyObject::list(vec![holder]));
        }

        let mut tree = ReferrerTree::new(&heap, root);
        let entries: Vec<Entry> = tree.walk(0, Some(1)).collect();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].kind, EntryKind::MaxDepth);
        assert_eq!(entries[1].depth, 1);
    }
}
