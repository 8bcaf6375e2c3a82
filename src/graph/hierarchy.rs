use crate::core::currency::Tag;
use crate::error::{MoneyError, Result};
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::{Dfs, Reversed};
use std::collections::{BTreeMap, BTreeSet};

/// A multi-parent derivation graph over classification tags.
///
/// Edges point from child to parent. A tag may have any number of parents,
/// so a trait can be both `stable` and `token/fungible` at once. The graph is
/// acyclic: [`Hierarchy::derive`] rejects any edge that would close a cycle.
///
/// Ancestor and descendant closures are recomputed eagerly after every
/// change, so queries are plain set lookups.
///
/// # Examples
///
/// ```
/// use coinage::graph::hierarchy::Hierarchy;
///
/// let h = Hierarchy::new("kind")
///     .derive("STABLECOIN", "CRYPTO").unwrap()
///     .derive("CRYPTO", "VIRTUAL").unwrap();
///
/// assert!(h.is_ancestor("STABLECOIN", "VIRTUAL"));
/// assert!(h.derive("VIRTUAL", "STABLECOIN").is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hierarchy {
    name: String,
    parents: BTreeMap<Tag, BTreeSet<Tag>>,
    ancestors: BTreeMap<Tag, BTreeSet<Tag>>,
    descendants: BTreeMap<Tag, BTreeSet<Tag>>,
}

impl Hierarchy {
    /// An empty hierarchy; `name` is only used in error reports.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Add the edge `child -> parent`, returning the new graph.
    ///
    /// Adding an existing edge is a no-op. A self edge or an edge that makes
    /// `child` its own ancestor fails with [`MoneyError::InvalidHierarchySpec`].
    pub fn derive(&self, child: impl Into<Tag>, parent: impl Into<Tag>) -> Result<Self> {
        let child = child.into();
        let parent = parent.into();

        if child.as_str().is_empty() || parent.as_str().is_empty() {
            return Err(self.invalid(&child, &parent, "tags must not be empty"));
        }
        if child == parent {
            return Err(self.invalid(&child, &parent, "a tag cannot derive from itself"));
        }
        if self.isa(&parent, &child) {
            return Err(self.invalid(&child, &parent, "edge would create a cycle"));
        }
        if self.parents_of(&child).contains(&parent) {
            return Ok(self.clone());
        }

        let mut parents = self.parents.clone();
        parents.entry(child).or_default().insert(parent);
        Ok(self.with_parents(parents))
    }

    /// Remove the edge `child -> parent` if present.
    pub fn underive(&self, child: impl Into<Tag>, parent: impl Into<Tag>) -> Self {
        let child = child.into();
        let parent = parent.into();
        let mut parents = self.parents.clone();
        if let Some(set) = parents.get_mut(&child) {
            set.remove(&parent);
            if set.is_empty() {
                parents.remove(&child);
            }
        }
        self.with_parents(parents)
    }

    /// Derive every edge of `other` into this graph.
    pub fn union(&self, other: &Hierarchy) -> Result<Self> {
        let mut merged = self.clone();
        for (child, parent) in other.edges() {
            merged = merged.derive(child.clone(), parent.clone())?;
        }
        Ok(merged)
    }

    /// Strict ancestry: `ancestor` is reachable from `tag` through one or more edges.
    pub fn is_ancestor(&self, tag: impl Into<Tag>, ancestor: impl Into<Tag>) -> bool {
        let tag = tag.into();
        let ancestor = ancestor.into();
        self.ancestors
            .get(&tag)
            .is_some_and(|set| set.contains(&ancestor))
    }

    /// Reflexive ancestry: `tag` equals `ancestor` or derives from it.
    pub fn isa(&self, tag: &Tag, ancestor: &Tag) -> bool {
        tag == ancestor
            || self
                .ancestors
                .get(tag)
                .is_some_and(|set| set.contains(ancestor))
    }

    pub fn parents_of(&self, tag: &Tag) -> BTreeSet<Tag> {
        self.parents.get(tag).cloned().unwrap_or_default()
    }

    pub fn ancestors_of(&self, tag: &Tag) -> BTreeSet<Tag> {
        self.ancestors.get(tag).cloned().unwrap_or_default()
    }

    pub fn descendants_of(&self, tag: &Tag) -> BTreeSet<Tag> {
        self.descendants.get(tag).cloned().unwrap_or_default()
    }

    /// All `(child, parent)` edges in tag order.
    pub fn edges(&self) -> impl Iterator<Item = (&Tag, &Tag)> {
        self.parents
            .iter()
            .flat_map(|(child, parents)| parents.iter().map(move |p| (child, p)))
    }

    /// Every tag that appears in an edge.
    pub fn tags(&self) -> BTreeSet<Tag> {
        self.edges()
            .flat_map(|(c, p)| [c.clone(), p.clone()])
            .collect()
    }

    /// The adjacency map `child -> parents`.
    pub fn parents(&self) -> &BTreeMap<Tag, BTreeSet<Tag>> {
        &self.parents
    }

    fn with_parents(&self, parents: BTreeMap<Tag, BTreeSet<Tag>>) -> Self {
        let (ancestors, descendants) = closures(&parents);
        Self {
            name: self.name.clone(),
            parents,
            ancestors,
            descendants,
        }
    }

    fn invalid(&self, child: &Tag, parent: &Tag, reason: &str) -> MoneyError {
        MoneyError::InvalidHierarchySpec {
            hierarchy: self.name.clone(),
            child: child.to_string(),
            parent: parent.to_string(),
            reason: reason.to_string(),
        }
    }
}

type Closure = BTreeMap<Tag, BTreeSet<Tag>>;

/// Transitive ancestor and descendant sets for every tag.
fn closures(parents: &BTreeMap<Tag, BTreeSet<Tag>>) -> (Closure, Closure) {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for (child, set) in parents {
        for parent in set {
            graph.add_edge(child.as_str(), parent.as_str(), ());
        }
    }

    let mut ancestors = Closure::new();
    let mut descendants = Closure::new();

    for node in graph.nodes() {
        let mut up = BTreeSet::new();
        let mut dfs = Dfs::new(&graph, node);
        while let Some(found) = dfs.next(&graph) {
            if found != node {
                up.insert(Tag::new(found));
            }
        }
        if !up.is_empty() {
            ancestors.insert(Tag::new(node), up);
        }

        let reversed = Reversed(&graph);
        let mut down = BTreeSet::new();
        let mut dfs = Dfs::new(reversed, node);
        while let Some(found) = dfs.next(reversed) {
            if found != node {
                down.insert(Tag::new(found));
            }
        }
        if !down.is_empty() {
            descendants.insert(Tag::new(node), down);
        }
    }

    (ancestors, descendants)
}

/// The three independent classification hierarchies of a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hierarchies {
    pub kind: Hierarchy,
    pub domain: Hierarchy,
    pub traits: Hierarchy,
}

impl Hierarchies {
    pub fn new() -> Self {
        Self {
            kind: Hierarchy::new("kind"),
            domain: Hierarchy::new("domain"),
            traits: Hierarchy::new("traits"),
        }
    }

    /// Edge-by-edge union of all three hierarchies.
    pub fn union(&self, other: &Hierarchies) -> Result<Self> {
        Ok(Self {
            kind: self.kind.union(&other.kind)?,
            domain: self.domain.union(&other.domain)?,
            traits: self.traits.union(&other.traits)?,
        })
    }
}

impl Default for Hierarchies {
    fn default() -> Self {
        Self::new()
    }
}
