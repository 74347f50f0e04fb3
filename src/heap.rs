use crate::DowserResult;
use crate::HeapStats;
use crate::error::DowserError;
use crate::introspect::{ExecutionContext, GraphIntrospector, Referrers};
use crate::object::{FrameInfo, ObjectData, ObjectId, PyObject};
use crate::tree::Internals;
use std::collections::{BTreeMap, HashMap};

/// In-process object heap with forward and reverse edge indexes.
///
/// Edges are derived from each object's [`ObjectData`] and re-derived on
/// every mutation, so the indexes never disagree with the payloads.
#[derive(Debug, Default)]
pub struct Heap {
    objects: BTreeMap<ObjectId, PyObject>,

    references: HashMap<ObjectId, Vec<ObjectId>>,

    reverse_references: HashMap<ObjectId, Vec<ObjectId>>,

    interned: HashMap<String, ObjectId>,

    frames: Vec<ObjectId>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_object(&mut self, obj: PyObject) -> ObjectId {
        let obj_id = obj.id;
        let targets = obj.referents();
        self.objects.insert(obj_id, obj);
        self.index(obj_id, targets);
        obj_id
    }

    /// Removes an object. Containers still naming it keep a dangling id,
    /// which walks skip and summaries report.
    pub fn remove_object(&mut self, obj_id: &ObjectId) -> Option<PyObject> {
        let obj = self.objects.remove(obj_id)?;
        self.unindex(*obj_id);
        self.reverse_references.remove(obj_id);
        self.frames.retain(|id| id != obj_id);
        self.interned.retain(|_, id| *id != *obj_id);
        Some(obj)
    }

    /// Replaces an object's payload. Instances keep their class name.
    pub fn set_data(&mut self, obj_id: ObjectId, data: ObjectData) -> DowserResult<()> {
        let obj = self
            .objects
            .get_mut(&obj_id)
            .ok_or(DowserError::ObjectNotFound(obj_id))?;

        if !matches!(data, ObjectData::Instance(_)) {
            obj.type_name = data.type_name().to_string();
        }
        let targets = data.referents();
        obj.data = data;

        self.unindex(obj_id);
        self.index(obj_id, targets);
        Ok(())
    }

    /// Appends `item` to a list, tuple or set.
    pub fn push_item(&mut self, container: ObjectId, item: ObjectId) -> DowserResult<()> {
        let obj = self
            .objects
            .get_mut(&container)
            .ok_or(DowserError::ObjectNotFound(container))?;

        match &mut obj.data {
            ObjectData::List(items) | ObjectData::Tuple(items) | ObjectData::Set(items) => {
                items.push(item);
            }
            _ => {
                return Err(DowserError::WrongKind {
                    id: container,
                    type_name: obj.type_name.clone(),
                    expected: "sequence",
                });
            }
        }

        self.references.entry(container).or_default().push(item);
        self.add_reverse(item, container);
        Ok(())
    }

    /// Inserts or replaces `key` in a dict.
    pub fn set_item(&mut self, dict: ObjectId, key: ObjectId, value: ObjectId) -> DowserResult<()> {
        let obj = self
            .objects
            .get_mut(&dict)
            .ok_or(DowserError::ObjectNotFound(dict))?;

        let ObjectData::Dict(pairs) = &mut obj.data else {
            return Err(DowserError::WrongKind {
                id: dict,
                type_name: obj.type_name.clone(),
                expected: "dict",
            });
        };

        match pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(pair) => pair.1 = value,
            None => pairs.push((key, value)),
        }
        let targets = obj.referents();

        self.unindex(dict);
        self.index(dict, targets);
        Ok(())
    }

    /// Returns the single shared str object for `text`.
    pub fn intern(&mut self, text: &str) -> ObjectId {
        if let Some(id) = self.interned.get(text) {
            return *id;
        }
        let id = self.add_object(PyObject::str(text));
        self.interned.insert(text.to_string(), id);
        id
    }

    /// Pushes a new activation on the call stack, linked to the current one.
    pub fn enter_frame(
        &mut self,
        filename: impl Into<String>,
        line: u32,
        locals: ObjectId,
        globals: ObjectId,
        builtins: ObjectId,
    ) -> DowserResult<ObjectId> {
        for binding in [locals, globals, builtins] {
            if !self.objects.contains_key(&binding) {
                return Err(DowserError::ObjectNotFound(binding));
            }
        }

        let frame = PyObject::new(ObjectData::Frame(FrameInfo {
            filename: filename.into(),
            line,
            back: self.frames.last().copied(),
            locals,
            globals,
            builtins,
        }));
        let frame_id = self.add_object(frame);
        self.frames.push(frame_id);
        Ok(frame_id)
    }

    /// Pops and frees the innermost activation.
    pub fn exit_frame(&mut self) -> DowserResult<PyObject> {
        let frame_id = self.frames.pop().ok_or(DowserError::NoActiveFrame)?;
        self.remove_object(&frame_id)
            .ok_or(DowserError::ObjectNotFound(frame_id))
    }

    /// Allocates heap objects mirroring a walker's bookkeeping for `root`:
    /// the walker instance, its attribute dict (which holds the root), and
    /// its seen and ignore dicts.
    pub fn register_walker(&mut self, root: ObjectId) -> Internals {
        let seen = self.add_object(PyObject::dict(Vec::new()));
        let ignore = self.add_object(PyObject::dict(Vec::new()));
        let pairs = vec![
            (self.intern("obj"), root),
            (self.intern("seen"), seen),
            (self.intern("_ignore"), ignore),
        ];
        let state = self.add_object(PyObject::dict(pairs));
        let walker = self.add_object(PyObject::instance("Tree", vec![state]));

        Internals {
            walker: Some(walker),
            state: Some(state),
            seen: Some(seen),
            ignore: Some(ignore),
            root_holder: Some(state),
        }
    }

    pub fn release_walker(&mut self, internals: &Internals) {
        for id in internals.ids() {
            self.remove_object(&id);
        }
    }

    pub fn get_object(&self, obj_id: &ObjectId) -> Option<&PyObject> {
        self.objects.get(obj_id)
    }

    pub fn contains(&self, obj_id: &ObjectId) -> bool {
        self.objects.contains_key(obj_id)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn reference_count(&self) -> usize {
        self.references.values().map(|refs| refs.len()).sum()
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    pub fn stats(&self) -> HeapStats {
        HeapStats {
            objects: self.object_count(),
            references: self.reference_count(),
            frames: self.frame_depth(),
            interned: self.interned.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn clear(&mut self) {
        self.objects.clear();
        self.references.clear();
        self.reverse_references.clear();
        self.interned.clear();
        self.frames.clear();
    }

    fn index(&mut self, from: ObjectId, targets: Vec<ObjectId>) {
        for to in &targets {
            self.add_reverse(*to, from);
        }
        self.references.insert(from, targets);
    }

    fn unindex(&mut self, from: ObjectId) {
        if let Some(targets) = self.references.remove(&from) {
            for to in targets {
                if let Some(reverse_refs) = self.reverse_references.get_mut(&to) {
                    reverse_refs.retain(|&id| id != from);
                }
            }
        }
    }

    fn add_reverse(&mut self, to: ObjectId, from: ObjectId) {
        let reverse_refs = self.reverse_references.entry(to).or_default();
        if !reverse_refs.contains(&from) {
            reverse_refs.push(from);
        }
    }

    fn live(&self, ids: Option<&Vec<ObjectId>>) -> Vec<ObjectId> {
        ids.map(|ids| {
            ids.iter()
                .copied()
                .filter(|id| self.objects.contains_key(id))
                .collect()
        })
        .unwrap_or_default()
    }
}

impl GraphIntrospector for Heap {
    fn object(&self, id: ObjectId) -> Option<&PyObject> {
        self.objects.get(&id)
    }

    fn referents(&self, id: ObjectId) -> Vec<ObjectId> {
        self.live(self.references.get(&id))
    }

    fn referrers(&self, id: ObjectId) -> Referrers {
        Referrers::new(self.live(self.reverse_references.get(&id)))
    }

    fn live_objects(&self) -> Vec<ObjectId> {
        self.objects.keys().copied().collect()
    }

    fn execution_context(&self, depth: usize) -> Option<ExecutionContext> {
        let frame_id = *self.frames.iter().rev().nth(depth)?;
        match &self.objects.get(&frame_id)?.data {
            ObjectData::Frame(frame) => Some(ExecutionContext {
                frame: frame_id,
                locals: frame.locals,
                globals: frame.globals,
                builtins: frame.builtins,
            }),
            _ => None,
        }
    }
}

/// Process-wide heap shared by every thread of the host.
pub mod global {
    use super::*;
    use crate::census;
    use crate::config::WalkConfig;
    use crate::cycles::CircularReferents;
    use crate::referents::ReferentTree;
    use crate::referrers::ReferrerTree;
    use parking_lot::RwLock;
    use std::io;
    use std::sync::{Arc, OnceLock};

    static HEAP: OnceLock<Arc<RwLock<Heap>>> = OnceLock::new();

    pub fn get_heap() -> Arc<RwLock<Heap>> {
        HEAP.get_or_init(|| Arc::new(RwLock::new(Heap::new())))
            .clone()
    }

    pub fn add_object(obj: PyObject) -> ObjectId {
        let binding = get_heap();
        let mut heap = binding.write();
        heap.add_object(obj)
    }

    pub fn remove_object(obj_id: &ObjectId) -> Option<PyObject> {
        let binding = get_heap();
        let mut heap = binding.write();
        heap.remove_object(obj_id)
    }

    pub fn census() -> Vec<(usize, String)> {
        let binding = get_heap();
        let heap = binding.read();
        census::count_objects(&*heap)
    }

    pub fn print_referents(root: ObjectId, config: &WalkConfig) -> io::Result<()> {
        let binding = get_heap();
        let heap = binding.read();
        let mut tree = ReferentTree::new(&*heap, root);
        tree.set_repr_limit(config.repr_limit);
        tree.print_tree(config.max_results, config.max_depth)
    }

    pub fn print_referrers(root: ObjectId, config: &WalkConfig) -> io::Result<()> {
        let binding = get_heap();
        let heap = binding.read();
        let mut tree = ReferrerTree::new(&*heap, root);
        tree.set_repr_limit(config.repr_limit);
        tree.print_tree(config.max_results, config.max_depth)
    }

    pub fn print_cycles(root: ObjectId, config: &WalkConfig) -> io::Result<()> {
        let binding = get_heap();
        let heap = binding.read();
        let mut tree = CircularReferents::new(&*heap, root);
        tree.set_repr_limit(config.repr_limit);
        tree.print_tree(config.max_results, config.max_depth)
    }
}
