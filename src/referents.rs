use crate::introspect::GraphIntrospector;
use crate::object::ObjectId;
use crate::tree::{Direction, Tree, TreeWalk, write_entries};
use std::io::{self, Write};
use std::ops::{Deref, DerefMut};

/// Walks what the root holds, transitively.
pub struct ReferentTree<'g, G: GraphIntrospector + ?Sized>(Tree<'g, G>);

impl<'g, G: GraphIntrospector + ?Sized> ReferentTree<'g, G> {
    pub fn new(graph: &'g G, root: ObjectId) -> Self {
        Self(Tree::new(graph, root))
    }

    /// Walks the referents of the root, skipping duplicates and circular refs.
    pub fn walk(&mut self, max_results: usize, max_depth: Option<usize>) -> TreeWalk<'_, 'g, G> {
        TreeWalk::new(&mut self.0, Direction::Referents, max_results, max_depth)
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

impl<'g, G: GraphIntrospector + ?Sized> Deref for ReferentTree<'g, G> {
    type Target = Tree<'g, G>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<G: GraphIntrospector + ?Sized> DerefMut for ReferentTree<'_, G> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}
