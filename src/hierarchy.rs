//! Tree construction: from the flat person array to a rooted hierarchy.
//!
//! The flat dataset is relational (each record references `mother`/`father`
//! by name); tree layout wants a strict hierarchy. The builder bridges the
//! two by inserting a synthetic hidden *union* node for every co-parent pair
//! that has children, so a couple's offspring hang off a single branching
//! point. Sibling-ordering ids are assigned in document order as the tree is
//! expanded; the id counter is threaded through the recursion and returned,
//! never shared mutable state.

use std::collections::HashMap;

use crate::dataset::{
    children_of, dataset_depth, idx_by_name, person_by_name, twins_of,
};
use crate::person::Person;
use crate::validation::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("number of visible nodes ({visible}) differs from the pedigree dataset ({dataset})")]
    CountMismatch { visible: usize, dataset: usize },
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// What a hierarchy node wraps: the synthetic root, a dataset person, or a
/// hidden union standing in for a couple. One explicit variant type instead
/// of duck-typing on the node's fields.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Root,
    Person { idx: usize },
    Union { mother: String, father: String },
}

/// A node of the derived hierarchy. Rebuilt from scratch on every layout
/// pass and discarded after render; never persisted.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub name: String,
    pub kind: NodeKind,
    pub children: Vec<usize>,
    pub parent: Option<usize>,
    /// Sibling-ordering id: local to the build, not globally unique.
    pub id: Option<usize>,
    /// Generation count from the root (root = 0, top level = 1).
    pub depth: usize,
    /// Union nodes this person anchors as mother or father.
    pub unions: Vec<usize>,
    pub x: f64,
    pub y: f64,
}

impl TreeNode {
    fn new(name: String, kind: NodeKind, depth: usize, parent: Option<usize>) -> TreeNode {
        TreeNode {
            name,
            kind,
            children: Vec::new(),
            parent,
            id: None,
            depth,
            unions: Vec::new(),
            x: 0.0,
            y: 0.0,
        }
    }

    /// Union and root nodes exist for layout only and are not drawn.
    pub fn hidden(&self) -> bool {
        !matches!(self.kind, NodeKind::Person { .. })
    }

    pub fn person_idx(&self) -> Option<usize> {
        match self.kind {
            NodeKind::Person { idx } => Some(idx),
            _ => None,
        }
    }
}

/// A co-parent pair, in the order discovered during tree expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct PartnerPair {
    pub mother: String,
    pub father: String,
}

/// Arena-backed hierarchy: nodes linked by index, the super-root at slot 0.
#[derive(Debug, Clone)]
pub struct Hierarchy {
    pub nodes: Vec<TreeNode>,
    pub root: usize,
    pub partners: Vec<PartnerPair>,
    index: HashMap<String, usize>,
}

impl Hierarchy {
    pub fn node_by_name(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    fn add_node(&mut self, node: TreeNode) -> usize {
        let idx = self.nodes.len();
        self.index.insert(node.name.clone(), idx);
        self.nodes.push(node);
        idx
    }

    fn fresh_union_name(&self) -> String {
        let mut n = self.nodes.len();
        loop {
            let name = format!("hidden_{n}");
            if !self.index.contains_key(&name) {
                return name;
            }
            n += 1;
        }
    }

    /// All nodes reachable from the root, children before parents.
    pub fn flatten(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.nodes.len());
        fn recurse(h: &Hierarchy, n: usize, out: &mut Vec<usize>) {
            for &c in &h.nodes[n].children {
                recurse(h, c, out);
            }
            out.push(n);
        }
        recurse(self, self.root, &mut out);
        out
    }

    /// Visible nodes at a depth, sorted by x, minus the excluded names.
    pub fn nodes_at_depth(&self, depth: usize, exclude: &[&str]) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .flatten()
            .into_iter()
            .filter(|&n| {
                let node = &self.nodes[n];
                node.depth == depth && !node.hidden() && !exclude.contains(&node.name.as_str())
            })
            .collect();
        out.sort_by(|&a, &b| {
            self.nodes[a]
                .x
                .partial_cmp(&self.nodes[b].x)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        out
    }

    /// Partner pairs resolved to node indices; pairs with an unresolved
    /// member are skipped.
    pub fn partner_links(&self) -> Vec<(usize, usize)> {
        self.partners
            .iter()
            .filter_map(|pair| {
                Some((
                    self.node_by_name(&pair.mother)?,
                    self.node_by_name(&pair.father)?,
                ))
            })
            .collect()
    }

    /// Two partners are consanguineous when they sit at different
    /// generations or share an ancestor.
    pub fn consanguineous(&self, dataset: &[Person], a: usize, b: usize) -> bool {
        if self.nodes[a].depth != self.nodes[b].depth {
            return true;
        }
        let (Some(pa), Some(pb)) = (
            person_by_name(dataset, &self.nodes[a].name),
            person_by_name(dataset, &self.nodes[b].name),
        ) else {
            return false;
        };
        let names_a: Vec<&str> = crate::dataset::ancestors(dataset, pa)
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        crate::dataset::ancestors(dataset, pb)
            .iter()
            .any(|p| names_a.contains(&p.name.as_str()))
    }

    /// The number of rendered nodes, which must always equal the dataset
    /// length after a build.
    pub fn visible_count(&self) -> usize {
        self.flatten()
            .into_iter()
            .filter(|&n| !self.nodes[n].hidden())
            .count()
    }
}

/// Build the hierarchy for a dataset: super-root over the `top_level`
/// persons, recursive union insertion, sibling-id assignment. Fails when the
/// rendered node count would not match the dataset (a person unreachable
/// from the root), rather than silently dropping anyone.
pub fn build_hierarchy(dataset: &[Person]) -> Result<Hierarchy, BuildError> {
    let mut h = Hierarchy {
        nodes: Vec::with_capacity(dataset.len() * 2),
        root: 0,
        partners: Vec::new(),
        index: HashMap::new(),
    };
    let mut root = TreeNode::new("hidden_root".into(), NodeKind::Root, 0, None);
    root.id = Some(0);
    h.add_node(root);

    for (i, p) in dataset.iter().enumerate() {
        if p.top_level {
            let n = h.add_node(TreeNode::new(
                p.name.clone(),
                NodeKind::Person { idx: i },
                1,
                Some(0),
            ));
            h.nodes[0].children.push(n);
        }
    }

    expand(&mut h, dataset, 0, 1);

    let visible = h.visible_count();
    if visible != dataset.len() {
        return Err(BuildError::CountMismatch {
            visible,
            dataset: dataset.len(),
        });
    }
    Ok(h)
}

/// Depth-first expansion of one node: discover co-parent pairs among its
/// children, insert a union per pair, assign sibling ids, recurse. Returns
/// the next unused id.
fn expand(h: &mut Hierarchy, dataset: &[Person], node: usize, mut id: usize) -> usize {
    let children = h.nodes[node].children.clone();

    // every distinct (mother, father) pair with at least one child whose
    // sibling id is still unassigned
    let mut pairs: Vec<(String, String)> = Vec::new();
    for &c in &children {
        if h.nodes[c].id.is_some() {
            continue;
        }
        let cname = h.nodes[c].name.clone();
        for p in dataset {
            if (p.mother.as_deref() == Some(&cname) || p.father.as_deref() == Some(&cname))
                && let (Some(m), Some(f)) = (p.mother.as_deref(), p.father.as_deref())
            {
                let pair = (m.to_string(), f.to_string());
                if !pairs.contains(&pair) {
                    pairs.push(pair);
                }
            }
        }
    }

    for (mother_name, father_name) in pairs {
        let depth = h.nodes[node].depth + 1;
        let mother = resolve_person(h, dataset, &mother_name, depth);
        let father = resolve_person(h, dataset, &father_name, depth);

        let union = h.add_node(TreeNode::new(
            h.fresh_union_name(),
            NodeKind::Union {
                mother: mother_name.clone(),
                father: father_name.clone(),
            },
            depth,
            Some(node),
        ));

        // the couple's children hang off the union node
        if let (Some(mp), fp) = (
            person_by_name(dataset, &mother_name),
            person_by_name(dataset, &father_name),
        ) {
            for child in children_of(dataset, mp, fp) {
                if h.node_by_name(&child.name).is_none() {
                    let ci = idx_by_name(dataset, &child.name).unwrap_or(0);
                    let cn = h.add_node(TreeNode::new(
                        child.name.clone(),
                        NodeKind::Person { idx: ci },
                        depth + 1,
                        Some(union),
                    ));
                    h.nodes[union].children.push(cn);
                }
            }
        }

        if h.nodes[mother].id.is_none() && h.nodes[father].id.is_none() {
            id = set_children_ids(h, dataset, node, id);
        }

        // order the union relative to its parents by consulting the
        // grandparent generation: walk up the maternal lines and compare the
        // grandparents' positions
        let midx = idx_by_name(dataset, &mother_name);
        let fidx = idx_by_name(dataset, &father_name);
        let father_first = match (midx, fidx) {
            (Some(mi), Some(fi)) => {
                let (gm, gf) = grandparents_idx(dataset, mi, fi);
                gf < gm
            }
            _ => false,
        };
        if father_first {
            h.nodes[father].id = Some(id);
            h.nodes[union].id = Some(id + 1);
            h.nodes[mother].id = Some(id + 2);
        } else {
            h.nodes[mother].id = Some(id);
            h.nodes[union].id = Some(id + 1);
            h.nodes[father].id = Some(id + 2);
        }
        id += 3;

        id = pull_twins_adjacent(h, dataset, &mother_name, id);
        id = pull_twins_adjacent(h, dataset, &father_name, id);

        h.nodes[mother].unions.push(union);
        h.nodes[father].unions.push(union);
        h.nodes[node].children.push(union);
        h.partners.push(PartnerPair {
            mother: mother_name,
            father: father_name,
        });
    }

    id = set_children_ids(h, dataset, node, id);

    for c in h.nodes[node].children.clone() {
        id = expand(h, dataset, c, id);
    }
    id
}

/// Find a person's node anywhere in the tree, creating a detached node when
/// the person was never attached (the later visible-count check turns that
/// into a build failure instead of a silent drop).
fn resolve_person(h: &mut Hierarchy, dataset: &[Person], name: &str, depth: usize) -> usize {
    if let Some(n) = h.node_by_name(name) {
        return n;
    }
    let idx = idx_by_name(dataset, name).unwrap_or(0);
    h.add_node(TreeNode::new(
        name.to_string(),
        NodeKind::Person { idx },
        depth,
        None,
    ))
}

/// Sort a node's children so twins lie next to each other, then assign ids
/// in order to any child that has none.
fn set_children_ids(h: &mut Hierarchy, dataset: &[Person], node: usize, mut id: usize) -> usize {
    let mut children = h.nodes[node].children.clone();
    children.sort_by_key(|&c| {
        h.nodes[c]
            .person_idx()
            .and_then(|i| dataset.get(i))
            .and_then(|p| p.twin_kind().map(|k| (k.field(), p.twin_id(k).cloned())))
    });
    for &c in &children {
        if h.nodes[c].id.is_none() {
            h.nodes[c].id = Some(id);
            id += 1;
        }
    }
    h.nodes[node].children = children;
    id
}

/// Give a parent's twins ids adjacent to the couple, keeping twin symbols
/// side by side across generations.
fn pull_twins_adjacent(h: &mut Hierarchy, dataset: &[Person], name: &str, mut id: usize) -> usize {
    let Some(person) = person_by_name(dataset, name) else {
        return id;
    };
    for twin in twins_of(dataset, person) {
        if let Some(t) = h.node_by_name(&twin.name) {
            h.nodes[t].id = Some(id);
            id += 1;
        }
    }
    id
}

/// Walk up the maternal line from both partners to their earliest recorded
/// ancestors and return those dataset indices.
fn grandparents_idx(dataset: &[Person], midx: usize, fidx: usize) -> (usize, usize) {
    let mut gm = midx;
    let mut gf = fidx;
    loop {
        let (pm, pf) = (&dataset[gm], &dataset[gf]);
        if pm.mother.is_none() || pf.mother.is_none() || pm.noparents || pf.noparents {
            break;
        }
        let next_m = pm.mother.as_deref().and_then(|m| idx_by_name(dataset, m));
        let next_f = pf.mother.as_deref().and_then(|m| idx_by_name(dataset, m));
        match (next_m, next_f) {
            (Some(nm), Some(nf)) => {
                gm = nm;
                gf = nf;
            }
            _ => break,
        }
    }
    (gm, gf)
}

/// Normalize the top generation: anyone at generation 2 of the maternal
/// walk is marked `top_level`, and the top-level records are regrouped at
/// the front of the array with each person adjacent to their partners.
pub fn group_top_level(dataset: &[Person]) -> Vec<Person> {
    let mut dataset = dataset.to_vec();
    let names: Vec<String> = dataset.iter().map(|p| p.name.clone()).collect();
    for name in &names {
        if dataset_depth(&dataset, name) == 2
            && let Some(p) = dataset.iter_mut().find(|p| &p.name == name)
        {
            p.top_level = true;
        }
    }

    let mut top_level: Vec<Person> = Vec::new();
    let mut seen: Vec<String> = Vec::new();
    for p in &dataset {
        if p.top_level && !seen.contains(&p.name) {
            seen.push(p.name.clone());
            top_level.push(p.clone());
            for ptr in crate::dataset::partners_of(&dataset, p) {
                if !seen.contains(&ptr.to_string())
                    && let Some(q) = person_by_name(&dataset, ptr)
                {
                    seen.push(q.name.clone());
                    top_level.push(q.clone());
                }
            }
        }
    }

    let mut out: Vec<Person> = dataset.iter().filter(|p| !p.top_level).cloned().collect();
    for p in top_level.into_iter().rev() {
        out.insert(0, p);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::person::Sex;

    fn person(name: &str, sex: Sex) -> Person {
        Person::new(name, sex)
    }

    fn trio() -> Vec<Person> {
        let mut f = person("m21", Sex::M);
        f.top_level = true;
        let mut m = person("f21", Sex::F);
        m.top_level = true;
        let mut c = person("ch1", Sex::F);
        c.mother = Some("f21".into());
        c.father = Some("m21".into());
        c.proband = true;
        vec![f, m, c]
    }

    #[test]
    fn test_visible_count_matches_dataset() {
        let ds = trio();
        let h = build_hierarchy(&ds).unwrap();
        assert_eq!(h.visible_count(), ds.len());
    }

    #[test]
    fn test_one_union_per_couple() {
        let mut ds = trio();
        let mut c2 = person("ch2", Sex::M);
        c2.mother = Some("f21".into());
        c2.father = Some("m21".into());
        ds.push(c2);
        let h = build_hierarchy(&ds).unwrap();
        let unions: Vec<&TreeNode> = h
            .nodes
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Union { .. }))
            .collect();
        assert_eq!(unions.len(), 1);
        assert_eq!(unions[0].children.len(), 2);
        assert_eq!(h.partners.len(), 1);
    }

    #[test]
    fn test_union_between_parents() {
        let ds = trio();
        let h = build_hierarchy(&ds).unwrap();
        let m = h.node_by_name("f21").unwrap();
        let f = h.node_by_name("m21").unwrap();
        let u = h
            .nodes
            .iter()
            .position(|n| matches!(n.kind, NodeKind::Union { .. }))
            .unwrap();
        let (mid, uid, fid) = (
            h.nodes[m].id.unwrap(),
            h.nodes[u].id.unwrap(),
            h.nodes[f].id.unwrap(),
        );
        assert!(
            (mid < uid && uid < fid) || (fid < uid && uid < mid),
            "union id must order between its parents: {mid} {uid} {fid}"
        );
    }

    #[test]
    fn test_unreachable_person_fails_count_check() {
        let mut ds = trio();
        // neither top_level nor anyone's child
        ds.push(person("stray", Sex::U));
        assert!(matches!(
            build_hierarchy(&ds),
            Err(BuildError::CountMismatch { .. })
        ));
    }

    #[test]
    fn test_noparents_partner_included_in_tree() {
        let mut ds = trio();
        let mut spouse = person("sp", Sex::M);
        spouse.mother = Some("f21".into());
        spouse.father = Some("m21".into());
        spouse.noparents = true;
        ds.push(spouse);
        let mut gc = person("gc", Sex::U);
        gc.mother = Some("ch1".into());
        gc.father = Some("sp".into());
        ds.push(gc);
        let h = build_hierarchy(&ds).unwrap();
        assert_eq!(h.visible_count(), ds.len());
        // the spouse renders at the same generation as ch1
        let sp = h.node_by_name("sp").unwrap();
        let ch = h.node_by_name("ch1").unwrap();
        assert_eq!(h.nodes[sp].depth, h.nodes[ch].depth);
        assert_eq!(h.partners.len(), 2);
    }

    #[test]
    fn test_twins_sorted_adjacent() {
        let mut ds = trio();
        let mut t1 = person("tw1", Sex::F);
        t1.mother = Some("f21".into());
        t1.father = Some("m21".into());
        t1.mztwin = Some(crate::person::TwinId("1".into()));
        let mut other = person("mid", Sex::M);
        other.mother = Some("f21".into());
        other.father = Some("m21".into());
        let mut t2 = t1.clone();
        t2.name = "tw2".into();
        ds.insert(2, t1);
        ds.push(other);
        ds.push(t2);
        let h = build_hierarchy(&ds).unwrap();
        let a = h.nodes[h.node_by_name("tw1").unwrap()].id.unwrap();
        let b = h.nodes[h.node_by_name("tw2").unwrap()].id.unwrap();
        assert_eq!(a.abs_diff(b), 1, "twin ids must be adjacent: {a} {b}");
    }

    #[test]
    fn test_group_top_level_groups_partners() {
        let mut ds = trio();
        // a second top-level couple, interleaved
        let mut f2 = person("m22", Sex::M);
        f2.top_level = true;
        let mut m2 = person("f22", Sex::F);
        m2.top_level = true;
        let mut c2 = person("ch2", Sex::M);
        c2.mother = Some("f22".into());
        c2.father = Some("m22".into());
        ds.insert(1, f2);
        ds.push(m2);
        ds.push(c2);
        let grouped = group_top_level(&ds);
        let names: Vec<&str> = grouped.iter().map(|p| p.name.as_str()).collect();
        let m22 = names.iter().position(|n| *n == "m22").unwrap();
        let f22 = names.iter().position(|n| *n == "f22").unwrap();
        assert_eq!(m22.abs_diff(f22), 1, "partners must be adjacent: {names:?}");
        // all top-level records come first
        assert!(names.iter().take(4).all(|n| *n != "ch1" && *n != "ch2"));
    }
}
