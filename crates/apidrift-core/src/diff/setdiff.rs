//! Name-keyed set difference.

use std::collections::BTreeMap;

use crate::contract::Named;

/// Entities of two collections split by name.
#[derive(Debug)]
pub struct Partition<'a, T> {
    /// Present only in the old collection, sorted by name.
    pub removed: Vec<&'a T>,
    /// Present only in the new collection, sorted by name.
    pub added: Vec<&'a T>,
    /// Present in both, as `(old, new)`, sorted by name.
    pub common: Vec<(&'a T, &'a T)>,
}

/// Split `old` and `new` into removed, added, and common entities by name.
///
/// If a name occurs more than once in a collection, the last occurrence
/// wins.
pub fn partition<'a, T: Named>(old: &'a [T], new: &'a [T]) -> Partition<'a, T> {
    let old_by_name: BTreeMap<&str, &T> = old.iter().map(|e| (e.name(), e)).collect();
    let mut new_by_name: BTreeMap<&str, &T> = new.iter().map(|e| (e.name(), e)).collect();

    let mut removed = Vec::new();
    let mut common = Vec::new();
    for (name, old_entity) in old_by_name {
        match new_by_name.remove(name) {
            Some(new_entity) => common.push((old_entity, new_entity)),
            None => removed.push(old_entity),
        }
    }
    Partition {
        removed,
        added: new_by_name.into_values().collect(),
        common,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&String]) -> Vec<String> {
        items.iter().map(|s| (*s).clone()).collect()
    }

    #[test]
    fn splits_by_name() {
        let old: Vec<String> = ["a", "b", "c"].map(String::from).to_vec();
        let new: Vec<String> = ["d", "b", "a"].map(String::from).to_vec();
        let p = partition(&old, &new);
        assert_eq!(names(&p.removed), ["c"]);
        assert_eq!(names(&p.added), ["d"]);
        let common: Vec<&str> = p.common.iter().map(|(o, _)| o.as_str()).collect();
        assert_eq!(common, ["a", "b"]);
    }

    #[test]
    fn empty_inputs() {
        let empty: Vec<String> = Vec::new();
        let some: Vec<String> = vec!["x".into()];
        let p = partition(&empty, &some);
        assert!(p.removed.is_empty());
        assert_eq!(p.added.len(), 1);
        let p = partition(&some, &empty);
        assert_eq!(p.removed.len(), 1);
        assert!(p.common.is_empty());
    }
}
