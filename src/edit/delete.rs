//! Deleting a pedigree member.
//!
//! Deletion is the one edit that can tear the pedigree apart, so it runs as
//! a two-phase commit: the mutated copy is returned immediately when the
//! pedigree stays connected, but a deletion that would *newly* disconnect
//! it comes back as `NeedsConfirmation` and only `confirm()` releases the
//! dataset.

use tracing::debug;

use crate::dataset::{
    all_siblings, ancestors, copy_dataset, partners_of, person_by_name, person_by_name_mut,
    remove_by_name,
};
use crate::hierarchy::{Hierarchy, NodeKind};
use crate::person::Person;
use crate::twins::check_twins;
use crate::validation::{unconnected, validate_pedigree, Validate};

use super::EditError;

/// Result of a delete: committed outright, or awaiting user confirmation
/// because the pedigree would split.
#[derive(Debug)]
pub enum DeleteOutcome {
    Committed(Vec<Person>),
    NeedsConfirmation(PendingDelete),
}

/// A mutated-but-uncommitted dataset. Dropping it abandons the deletion;
/// `confirm` releases the new dataset for the caller to commit.
#[derive(Debug)]
pub struct PendingDelete {
    dataset: Vec<Person>,
    /// The names that would become unreachable.
    pub disconnected: Vec<String>,
}

impl PendingDelete {
    pub fn confirm(self) -> Vec<Person> {
        self.dataset
    }
}

/// Nearest visible layout neighbours of a node at its own generation,
/// excluding `excludes`: (left, right).
fn adjacent_nodes(
    h: &Hierarchy,
    node: usize,
    excludes: &[&str],
) -> (Option<usize>, Option<usize>) {
    let x = h.nodes[node].x;
    let mut lhs = None;
    let mut rhs = None;
    for d in h.nodes_at_depth(h.nodes[node].depth, excludes) {
        if h.nodes[d].x < x {
            lhs = Some(d);
        }
        if rhs.is_none() && h.nodes[d].x > x {
            rhs = Some(d);
        }
    }
    (lhs, rhs)
}

/// Remove a person from a copy of the committed dataset. When the person
/// anchors a union, placeholder co-parents go too, surviving children are
/// reparented to another partner (or to an adjacent family, or dropped),
/// and now-childless ancestor couples are pruned. Twin groups are
/// re-checked and the copy re-validated before the outcome is decided.
pub fn delete_node(
    h: &Hierarchy,
    mode: Validate,
    committed: &[Person],
    name: &str,
) -> Result<DeleteOutcome, EditError> {
    let mut dataset = copy_dataset(committed);
    let mut deletes: Vec<Person> = Vec::new();

    let node = h.node_by_name(name);
    let unions: Vec<usize> = node.map(|n| h.nodes[n].unions.clone()).unwrap_or_default();

    if unions.is_empty() {
        remove_by_name(&mut dataset, name);
    } else {
        for &u in &unions {
            let NodeKind::Union { mother, father } = h.nodes[u].kind.clone() else {
                continue;
            };
            for pname in [&mother, &father] {
                if let Some(p) = person_by_name(&dataset, pname)
                    && (p.name == name || p.noparents || p.top_level)
                    && let Some(removed) = remove_by_name(&mut dataset, pname)
                {
                    deletes.push(removed);
                }
            }

            let children_names: Vec<String> = h.nodes[u]
                .children
                .iter()
                .map(|&c| h.nodes[c].name.clone())
                .collect();
            let excludes: Vec<&str> = children_names.iter().map(|s| s.as_str()).collect();

            for cname in &children_names {
                let Some(child) = person_by_name(&dataset, cname).cloned() else {
                    continue;
                };
                if let Some(c) = person_by_name_mut(&mut dataset, cname) {
                    c.noparents = true;
                }
                let ptrs = partners_of(&dataset, &child);
                let ptr = ptrs
                    .first()
                    .and_then(|p| person_by_name(&dataset, p))
                    .cloned();
                match ptr {
                    Some(ptr) if ptr.mother != child.mother => {
                        if let Some(c) = person_by_name_mut(&mut dataset, cname) {
                            c.mother = ptr.mother.clone();
                            c.father = ptr.father.clone();
                        }
                    }
                    Some(_) => {
                        // keep the child at its generation by borrowing an
                        // adjacent family's parent references
                        let (new_mother, new_father) = match h.node_by_name(cname) {
                            Some(cn) => {
                                let (lhs, rhs) = adjacent_nodes(h, cn, &excludes);
                                let parents_of = |n: Option<usize>| {
                                    n.and_then(|n| person_by_name(&dataset, &h.nodes[n].name))
                                        .map(|p| (p.mother.clone(), p.father.clone()))
                                };
                                match parents_of(lhs).or_else(|| parents_of(rhs)) {
                                    Some(pair) => pair,
                                    None => (None, None),
                                }
                            }
                            None => (None, None),
                        };
                        if let Some(c) = person_by_name_mut(&mut dataset, cname) {
                            c.mother = new_mother;
                            c.father = new_father;
                            if !c.has_parent_refs() {
                                c.top_level = true;
                            }
                        }
                    }
                    None => {
                        // no partner to reparent to: the child survives with
                        // its parent links severed
                        if let Some(c) = person_by_name_mut(&mut dataset, cname) {
                            c.mother = None;
                            c.father = None;
                            c.top_level = true;
                        }
                    }
                }
            }
        }
    }

    // prune ancestor couples left childless by the removals
    for del in &deletes {
        if !all_siblings(&dataset, del, None).is_empty() {
            continue;
        }
        let couples: Vec<(String, String)> = ancestors(&dataset, del)
            .iter()
            .filter_map(|a| Some((a.mother.clone()?, a.father.clone()?)))
            .collect();
        for (m, f) in couples {
            debug!(mother = %m, father = %f, "pruning childless ancestor couple");
            remove_by_name(&mut dataset, &m);
            remove_by_name(&mut dataset, &f);
        }
    }

    check_twins(&mut dataset);

    // deletion is disallowed outright when the result fails validation
    validate_pedigree(mode, &dataset)?;

    let uc = unconnected(&dataset)?;
    let baseline = unconnected(committed).unwrap_or_default();
    if !uc.is_empty() && baseline.is_empty() {
        debug!(?uc, "deletion would split the pedigree");
        return Ok(DeleteOutcome::NeedsConfirmation(PendingDelete {
            dataset,
            disconnected: uc,
        }));
    }
    Ok(DeleteOutcome::Committed(dataset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::build_hierarchy;
    use crate::person::Sex;

    fn family() -> Vec<Person> {
        let mut dad = Person::new("dad", Sex::M);
        dad.top_level = true;
        let mut mum = Person::new("mum", Sex::F);
        mum.top_level = true;
        let mut c0 = Person::new("c0", Sex::F);
        c0.mother = Some("mum".into());
        c0.father = Some("dad".into());
        c0.proband = true;
        let mut c1 = Person::new("c1", Sex::M);
        c1.mother = Some("mum".into());
        c1.father = Some("dad".into());
        vec![dad, mum, c0, c1]
    }

    #[test]
    fn test_delete_leaf_commits_immediately() {
        let ds = family();
        let h = build_hierarchy(&ds).unwrap();
        let outcome = delete_node(&h, Validate::Default, &ds, "c1").unwrap();
        let DeleteOutcome::Committed(new_ds) = outcome else {
            panic!("leaf deletion must not prompt");
        };
        assert_eq!(new_ds.len(), 3);
        assert!(person_by_name(&new_ds, "c1").is_none());
        // the committed dataset is untouched
        assert_eq!(ds.len(), 4);
    }

    #[test]
    fn test_delete_parent_needs_confirmation() {
        // removing dad takes the couple with it and severs both children
        // into singletons: the pedigree splits, so the commit must wait for
        // confirmation
        let ds = family();
        let h = build_hierarchy(&ds).unwrap();
        let outcome = delete_node(&h, Validate::Default, &ds, "dad").unwrap();
        let DeleteOutcome::NeedsConfirmation(pending) = outcome else {
            panic!("splitting deletion must prompt");
        };
        assert_eq!(pending.disconnected, vec!["c1".to_string()]);
        assert_eq!(ds.len(), 4, "committed dataset untouched until confirm");
        let new_ds = pending.confirm();
        assert!(person_by_name(&new_ds, "dad").is_none());
        assert!(person_by_name(&new_ds, "mum").is_none());
        let c0 = person_by_name(&new_ds, "c0").unwrap();
        assert!(c0.noparents && c0.top_level);
    }

    #[test]
    fn test_delete_bridge_prunes_childless_ancestors() {
        // dad-mum -> c0; c0 + spouse -> grandkid. Deleting c0 removes the
        // placeholder spouse and leaves the grandparents childless, so the
        // whole upper couple is pruned; what remains is still connected.
        let mut ds = family();
        ds.truncate(3); // dad, mum, c0
        let mut spouse = Person::new("sp", Sex::M);
        spouse.mother = Some("mum".into());
        spouse.father = Some("dad".into());
        spouse.noparents = true;
        ds.push(spouse);
        let mut gk = Person::new("gk", Sex::F);
        gk.mother = Some("c0".into());
        gk.father = Some("sp".into());
        ds.push(gk);
        crate::dataset::set_proband(&mut ds, "gk");

        let h = build_hierarchy(&ds).unwrap();
        let outcome = delete_node(&h, Validate::Default, &ds, "c0").unwrap();
        let DeleteOutcome::Committed(new_ds) = outcome else {
            panic!("a fully pruned deletion stays connected and must commit");
        };
        let names: Vec<&str> = new_ds.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["gk"]);
        assert_eq!(ds.len(), 5, "committed dataset untouched");
    }

    #[test]
    fn test_delete_prunes_twin_markers() {
        let mut ds = family();
        ds[2].mztwin = Some(crate::person::TwinId("1".into()));
        ds[3].mztwin = Some(crate::person::TwinId("1".into()));
        let h = build_hierarchy(&ds).unwrap();
        let DeleteOutcome::Committed(new_ds) =
            delete_node(&h, Validate::Default, &ds, "c1").unwrap()
        else {
            panic!("expected commit");
        };
        let c0 = person_by_name(&new_ds, "c0").unwrap();
        assert_eq!(c0.mztwin, None, "orphaned twin id must be dropped");
    }
}
