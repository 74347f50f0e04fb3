use crate::introspect::GraphIntrospector;
use crate::object::ObjectId;
use crate::tree::{MAX_RESULTS_REACHED, Tree};
use log::debug;
use std::io::{self, Write};
use std::ops::{Deref, DerefMut};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleItem {
    /// Labels from the root's referent down to the root itself.
    Trail(Vec<String>),
    MaxResults,
}

/// Outward walk reporting paths that lead back to the root.
///
/// Every object is visited at most once per walk, the root included, so a
/// walk reports the first closing path it finds through each object.
pub struct CircularReferents<'g, G: GraphIntrospector + ?Sized> {
    tree: Tree<'g, G>,
    stops: usize,
}

impl<'g, G: GraphIntrospector + ?Sized> CircularReferents<'g, G> {
    pub fn new(graph: &'g G, root: ObjectId) -> Self {
        Self {
            tree: Tree::new(graph, root),
            stops: 0,
        }
    }

    pub fn walk(&mut self, max_results: usize, max_depth: Option<usize>) -> CycleWalk<'_, 'g, G> {
        CycleWalk::new(self, max_results, max_depth)
    }

    /// Paths cut off by the depth limit during the last walk.
    pub fn stops(&self) -> usize {
        self.stops
    }

    pub fn write_tree<W: Write + ?Sized>(
        &mut self,
        out: &mut W,
        max_results: usize,
        max_depth: Option<usize>,
    ) -> io::Result<()> {
        for item in self.walk(max_results, max_depth) {
            match item {
                CycleItem::Trail(trail) => writeln!(out, "{trail:?}")?,
                CycleItem::MaxResults => writeln!(out, "{MAX_RESULTS_REACHED}")?,
            }
        }
        if self.stops > 0 {
            writeln!(
                out,
                "{} paths stopped because max depth reached",
                self.stops
            )?;
        }
        Ok(())
    }

    pub fn print_tree(&mut self, max_results: usize, max_depth: Option<usize>) -> io::Result<()> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.write_tree(&mut out, max_results, max_depth)
    }
}

impl<'g, G: GraphIntrospector + ?Sized> Deref for CircularReferents<'g, G> {
    type Target = Tree<'g, G>;

    fn deref(&self) -> &Self::Target {
        &self.tree
    }
}

impl<G: GraphIntrospector + ?Sized> DerefMut for CircularReferents<'_, G> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.tree
    }
}

struct Level {
    depth: usize,
    edges: std::vec::IntoIter<ObjectId>,
    trail: Vec<String>,
}

pub struct CycleWalk<'w, 'g, G: GraphIntrospector + ?Sized> {
    walker: &'w mut CircularReferents<'g, G>,
    max_results: usize,
    max_depth: Option<usize>,
    stack: Vec<Level>,
    /// Root re-entry deferred to the next pull, after its trail was yielded.
    deferred: Option<(ObjectId, usize, Vec<String>)>,
    count: usize,
    finished: bool,
}

impl<'w, 'g, G: GraphIntrospector + ?Sized> CycleWalk<'w, 'g, G> {
    fn new(
        walker: &'w mut CircularReferents<'g, G>,
        max_results: usize,
        max_depth: Option<usize>,
    ) -> Self {
        walker.stops = 0;
        walker.tree.begin(false);
        let root = walker.tree.root();
        let max_depth = max_depth.filter(|&depth| depth > 0);
        debug!(
            "searching cycles through {root} (max_results={max_results}, \
             max_depth={max_depth:?}, ignoring {})",
            walker.tree.ignored_count()
        );

        let mut walk = Self {
            walker,
            max_results,
            max_depth,
            stack: Vec::new(),
            deferred: None,
            count: 0,
            finished: false,
        };
        walk.enter(root, 0, Vec::new());
        walk
    }

    pub fn stops(&self) -> usize {
        self.walker.stops
    }

    fn enter(&mut self, obj: ObjectId, depth: usize, trail: Vec<String>) {
        if self.max_depth.is_some_and(|max| depth >= max) {
            self.walker.stops += 1;
            return;
        }

        let edges = self.walker.tree.graph().referents(obj);
        self.stack.push(Level {
            depth,
            edges: edges.into_iter(),
            trail,
        });
    }

    fn advance(&mut self) -> Option<Vec<String>> {
        if let Some((id, depth, trail)) = self.deferred.take() {
            self.enter(id, depth, trail);
        }

        let root = self.walker.tree.root();
        loop {
            let level = self.stack.last_mut()?;
            let Some(id) = level.edges.next() else {
                self.stack.pop();
                continue;
            };

            if self.walker.tree.is_ignored(id) || !self.walker.tree.mark_seen(id) {
                continue;
            }

            let depth = level.depth;
            let mut trail = level.trail.clone();
            trail.push(self.walker.tree.label(id));

            if id == root {
                self.deferred = Some((id, depth + 1, trail.clone()));
                return Some(trail);
            }
            self.enter(id, depth + 1, trail);
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        self.stack.clear();
        self.deferred = None;
        debug!(
            "cycle search through {} finished: {} trails, {} depth stops",
            self.walker.tree.root(),
            self.count,
            self.walker.stops
        );
    }
}

impl<G: GraphIntrospector + ?Sized> Iterator for CycleWalk<'_, '_, G> {
    type Item = CycleItem;

    fn next(&mut self) -> Option<CycleItem> {
        if self.finished {
            return None;
        }

        if self.max_results > 0 && self.count >= self.max_results {
            self.finish();
            return Some(CycleItem::MaxResults);
        }

        match self.advance() {
            Some(trail) => {
                self.count += 1;
                Some(CycleItem::Trail(trail))
            }
            None => {
                self.finish();
                None
            }
        }
    }
}
