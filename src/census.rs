use crate::introspect::GraphIntrospector;
use log::debug;
use std::collections::HashMap;

/// Counts live objects by type name, ascending by count, ties by name.
pub fn count_objects<G: GraphIntrospector + ?Sized>(graph: &G) -> Vec<(usize, String)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let live = graph.live_objects();
    for id in &live {
        if let Some(obj) = graph.object(*id) {
            *counts.entry(obj.type_name.as_str()).or_default() += 1;
        }
    }

    let mut census: Vec<(usize, String)> = counts
        .into_iter()
        .map(|(name, count)| (count, name.to_string()))
        .collect();
    census.sort();

    debug!("census of {} live objects: {} types", live.len(), census.len());
    census
}
