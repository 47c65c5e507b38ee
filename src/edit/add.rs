//! Adding relatives: children, siblings, parents, partners.

use tracing::{debug, warn};

use crate::dataset::{
    adopted_siblings, all_children, all_siblings, dataset_depth, generate_name, idx_by_name,
    insert_at, person_by_name, person_by_name_mut,
};
use crate::hierarchy::Hierarchy;
use crate::person::{Person, Sex, TwinKind};
use crate::twins::{set_twins, unique_twin_id};

use super::EditError;

fn parse_twin_type(twin_type: Option<&str>) -> Result<Option<TwinKind>, EditError> {
    match twin_type {
        None => Ok(None),
        Some(s) => TwinKind::from_field(s)
            .map(Some)
            .ok_or_else(|| EditError::InvalidTwinType(s.to_string())),
    }
}

/// Sibling id and generation depth for a person, falling back to the flat
/// array when the person never made it into the last built tree.
fn tree_meta(h: Option<&Hierarchy>, dataset: &[Person], name: &str) -> Option<(i64, usize)> {
    if let Some(h) = h
        && let Some(n) = h.node_by_name(name)
    {
        let node = &h.nodes[n];
        if let Some(id) = node.id {
            return Some((id as i64, node.depth));
        }
    }
    let idx = idx_by_name(dataset, name)?;
    Some((idx as i64, dataset_depth(dataset, name) - 1))
}

/// Which of the two co-parents takes the mother and father roles, by
/// recorded sex with positional fallback.
fn parent_roles(a: &Person, b: &Person) -> (String, String) {
    let mut mother = None;
    let mut father = None;
    if a.sex == Sex::F {
        mother = Some(a.name.clone());
    }
    if a.sex == Sex::M {
        father = Some(a.name.clone());
    }
    if mother.is_none() && b.sex == Sex::F {
        mother = Some(b.name.clone());
    }
    if father.is_none() && b.sex == Sex::M {
        father = Some(b.name.clone());
    }
    let mother = mother.unwrap_or_else(|| a.name.clone());
    let father = father.unwrap_or_else(|| {
        if b.name == mother {
            a.name.clone()
        } else {
            b.name.clone()
        }
    });
    (mother, father)
}

/// Drop any auto-created placeholder child of this couple; a real child is
/// about to take its layout role.
fn remove_placeholder_children(dataset: &mut Vec<Person>, mother: &str, father: &str) {
    dataset.retain(|p| {
        !(p.partner_placeholder
            && p.mother.as_deref() == Some(mother)
            && p.father.as_deref() == Some(father))
    });
}

/// Insert a new sibling next to `name`, sharing its parents (or `top_level`
/// status). Returns the new person's name.
pub fn add_sibling(
    dataset: &mut Vec<Person>,
    name: &str,
    sex: Sex,
    insert_left: bool,
    twin_type: Option<&str>,
) -> Result<String, EditError> {
    let kind = parse_twin_type(twin_type)?;
    let node = person_by_name(dataset, name)
        .ok_or_else(|| EditError::PersonNotFound(name.to_string()))?
        .clone();

    let mut newbie = Person::new(generate_name(dataset, 4), sex);
    if node.top_level {
        newbie.top_level = true;
    } else {
        newbie.mother = node.mother.clone();
        newbie.father = node.father.clone();
    }
    let newbie_name = newbie.name.clone();

    let idx = idx_by_name(dataset, name).unwrap_or(0);
    let idx = if insert_left { idx } else { idx + 1 };
    insert_at(dataset, idx, newbie);

    if let Some(kind) = kind {
        set_twins(dataset, name, &newbie_name, kind);
    }
    Ok(newbie_name)
}

/// Add `count` children to a person. Someone with no co-parent on record
/// first gets a synthesized `noparents` placeholder partner of the opposite
/// sex. New children are spliced in at the first existing child's position,
/// or right after the person. Returns the new children's names.
pub fn add_child(
    dataset: &mut Vec<Person>,
    name: &str,
    sex: Sex,
    count: usize,
    twin_type: Option<&str>,
) -> Result<Vec<String>, EditError> {
    let kind = parse_twin_type(twin_type)?;
    let node = person_by_name(dataset, name)
        .ok_or_else(|| EditError::PersonNotFound(name.to_string()))?
        .clone();

    let children = all_children(dataset, &node, None);
    let (ptr_name, mut idx) = if children.is_empty() {
        let partner = add_sibling(
            dataset,
            name,
            node.sex.opposite(),
            node.sex == Sex::F,
            None,
        )?;
        if let Some(p) = person_by_name_mut(dataset, &partner) {
            p.noparents = true;
        }
        let idx = idx_by_name(dataset, name).unwrap_or(0) + 1;
        (partner, idx)
    } else {
        let c = children[0];
        let ptr = if c.father.as_deref() == Some(name) {
            c.mother.clone()
        } else {
            c.father.clone()
        };
        let idx = idx_by_name(dataset, &c.name).unwrap_or(0);
        (ptr.unwrap_or_default(), idx)
    };

    let twin_id = kind.and_then(|k| unique_twin_id(dataset, k));
    let mut new_children = Vec::with_capacity(count);
    for _ in 0..count {
        let mut child = Person::new(generate_name(dataset, 4), sex);
        if node.sex == Sex::F {
            child.mother = Some(node.name.clone());
            child.father = Some(ptr_name.clone());
        } else {
            child.mother = Some(ptr_name.clone());
            child.father = Some(node.name.clone());
        }
        if let Some(k) = kind {
            child.set_twin_id(k, twin_id.clone());
        }
        let (cm, cf) = (child.mother.clone(), child.father.clone());
        new_children.push(child.name.clone());
        insert_at(dataset, idx, child);
        idx += 1;
        if let (Some(m), Some(f)) = (cm, cf) {
            remove_placeholder_children(dataset, &m, &f);
        }
    }
    Ok(new_children)
}

/// Configuration for `add_partner`.
#[derive(Debug, Clone)]
pub struct PartnerConfig {
    /// Auto-detected as the opposite sex when absent.
    pub partner_sex: Option<Sex>,
    /// Also create a child, giving the layout a branching point.
    pub create_child: bool,
    pub child_sex: Sex,
}

impl Default for PartnerConfig {
    fn default() -> Self {
        PartnerConfig {
            partner_sex: None,
            create_child: true,
            child_sex: Sex::U,
        }
    }
}

/// Add a partner next to a person, female left of male by convention, and
/// (by default) a placeholder child after the couple. Remarriage is fine:
/// there is no cap on partners per person. Returns the partner's name.
pub fn add_partner(
    h: Option<&Hierarchy>,
    dataset: &mut Vec<Person>,
    name: &str,
    config: &PartnerConfig,
) -> Result<String, EditError> {
    let node = person_by_name(dataset, name)
        .ok_or_else(|| EditError::PersonNotFound(name.to_string()))?
        .clone();

    let partner_sex = match config.partner_sex {
        Some(s) => s,
        None => {
            if node.sex == Sex::U {
                warn!(person = %name, "person has unknown sex, partner defaults to unknown too");
            }
            node.sex.opposite()
        }
    };
    if partner_sex == node.sex && node.sex != Sex::U {
        warn!(person = %name, sex = %partner_sex, "partner has the same sex as person");
    }

    let mut partner = Person::new(generate_name(dataset, 4), partner_sex);
    let mother_exists = node
        .mother
        .as_deref()
        .is_some_and(|m| idx_by_name(dataset, m).is_some());
    let father_exists = node
        .father
        .as_deref()
        .is_some_and(|f| idx_by_name(dataset, f).is_some());
    if node.top_level || !node.has_parent_refs() {
        partner.top_level = true;
    } else {
        // copy the person's parents so the partner renders at the same
        // generation; the noparents flag suppresses the visual link
        if mother_exists {
            partner.mother = node.mother.clone();
        }
        if father_exists {
            partner.father = node.father.clone();
        }
        if !partner.has_parent_refs() {
            partner.top_level = true;
        }
    }
    partner.noparents = true;
    let partner_name = partner.name.clone();

    let idx = idx_by_name(dataset, name).unwrap_or(0);
    let idx = match node.sex {
        Sex::F => idx + 1, // male partner to the right
        Sex::M => idx,     // female partner to the left
        Sex::U => idx + 1,
    };
    insert_at(dataset, idx, partner);

    if config.create_child {
        let partner_rec = person_by_name(dataset, &partner_name)
            .ok_or_else(|| EditError::PersonNotFound(partner_name.clone()))?
            .clone();
        let (mother, father) = parent_roles(&node, &partner_rec);
        let mut child = Person::new(generate_name(dataset, 4), config.child_sex);
        child.mother = Some(mother);
        child.father = Some(father);
        child.partner_placeholder = true;
        let partner_idx = idx_by_name(dataset, &partner_name).unwrap_or(0);
        let person_idx = idx_by_name(dataset, name).unwrap_or(0);
        insert_at(dataset, partner_idx.max(person_idx) + 1, child);
    }

    Ok(partner_name)
}

/// Give a person parents. At the shallowest generation this restructures
/// the whole tree root: a fresh top-level couple adopts every existing
/// top-level individual. Deeper down, a grandparent couple is spliced in
/// next to one of the existing parents, on the side the sibling ids call
/// for, and adopted siblings inside the affected id window move to the new
/// couple.
pub fn add_parents(
    h: Option<&Hierarchy>,
    dataset: &mut Vec<Person>,
    name: &str,
) -> Result<(), EditError> {
    let (nid, depth) =
        tree_meta(h, dataset, name).ok_or_else(|| EditError::PersonNotFound(name.to_string()))?;
    let node = person_by_name(dataset, name)
        .ok_or_else(|| EditError::PersonNotFound(name.to_string()))?
        .clone();

    let mut pid: i64 = -101;
    let mut ptr_name: Option<String> = None;
    let children = all_children(dataset, &node, None);
    if let Some(c) = children.first() {
        let ptr = if c.mother.as_deref() == Some(name) {
            c.father.clone()
        } else {
            c.mother.clone()
        };
        if let Some(ptr) = ptr {
            if let Some((id, _)) = tree_meta(h, dataset, &ptr) {
                pid = id;
            }
            ptr_name = Some(ptr);
        }
    }

    let mother_name;
    let father_name;
    if depth == 1 {
        let mut mother = Person::new(generate_name(dataset, 4), Sex::F);
        mother.top_level = true;
        let mut father = Person::new(generate_name(dataset, 4), Sex::M);
        father.top_level = true;
        mother_name = mother.name.clone();
        father_name = father.name.clone();
        insert_at(dataset, 0, mother);
        insert_at(dataset, 0, father);

        // everyone at the old top generation becomes an adoptive child of
        // the new couple
        let reparent: Vec<String> = dataset
            .iter()
            .filter(|p| {
                (p.top_level || dataset_depth(dataset, &p.name) == 2)
                    && p.name != mother_name
                    && p.name != father_name
            })
            .map(|p| p.name.clone())
            .collect();
        for rname in reparent {
            if let Some(p) = person_by_name_mut(dataset, &rname) {
                p.top_level = false;
                p.noparents = true;
                p.mother = Some(mother_name.clone());
                p.father = Some(father_name.clone());
            }
        }
    } else {
        let node_mother = node
            .mother
            .as_deref()
            .ok_or_else(|| EditError::PersonNotFound(format!("mother of {name}")))?
            .to_string();
        let node_father = node
            .father
            .as_deref()
            .ok_or_else(|| EditError::PersonNotFound(format!("father of {name}")))?
            .to_string();
        let (mid, _) = tree_meta(h, dataset, &node_mother)
            .ok_or_else(|| EditError::PersonNotFound(node_mother.clone()))?;
        let (fid, _) = tree_meta(h, dataset, &node_father)
            .ok_or_else(|| EditError::PersonNotFound(node_father.clone()))?;

        let mut rid: i64 = 10000;
        let mut lid = nid;
        for sib in all_siblings(dataset, &node, None) {
            let sid = tree_meta(h, dataset, &sib.name).map(|(id, _)| id).unwrap_or(0);
            if sid < rid && sid > nid {
                rid = sid;
            }
            if sid < lid {
                lid = sid;
            }
        }
        let add_lhs = lid >= nid || (pid == lid && rid < 10000);
        debug!(lid, rid, nid, add_lhs, "adding parents");

        let anchor = if (!add_lhs && fid > mid) || (add_lhs && fid < mid) {
            node_father.clone()
        } else {
            node_mother.clone()
        };
        father_name = add_sibling(dataset, &anchor, Sex::M, add_lhs, None)?;
        mother_name = add_sibling(dataset, &anchor, Sex::F, add_lhs, None)?;

        // grandfather renders left of grandmother
        let faidx = idx_by_name(dataset, &father_name).unwrap_or(0);
        let moidx = idx_by_name(dataset, &mother_name).unwrap_or(0);
        if faidx > moidx {
            dataset.swap(faidx, moidx);
        }

        let orphans: Vec<String> = adopted_siblings(dataset, &node)
            .iter()
            .map(|p| p.name.to_string())
            .collect();
        for orphan in orphans {
            let oid = tree_meta(h, dataset, &orphan).map(|(id, _)| id).unwrap_or(0);
            if (add_lhs || nid < oid) && oid < rid
                && let Some(p) = person_by_name_mut(dataset, &orphan)
            {
                p.mother = Some(mother_name.clone());
                p.father = Some(father_name.clone());
            }
        }
    }

    if depth == 2 {
        for pname in [&mother_name, &father_name] {
            if let Some(p) = person_by_name_mut(dataset, pname) {
                p.top_level = true;
            }
        }
    }

    if let Some(p) = person_by_name_mut(dataset, name) {
        p.mother = Some(mother_name.clone());
        p.father = Some(father_name.clone());
        p.noparents = false;
    }

    // a noparents partner anchored to this person moves along
    let anchors_union = match h {
        Some(h) => h
            .node_by_name(name)
            .is_some_and(|n| !h.nodes[n].unions.is_empty()),
        None => false,
    };
    if anchors_union
        && let Some(ptr) = ptr_name
        && let Some(p) = person_by_name_mut(dataset, &ptr)
        && p.noparents
    {
        p.mother = Some(mother_name);
        p.father = Some(father_name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::person::TwinId;

    fn top_pair() -> Vec<Person> {
        let mut m1 = Person::new("m1", Sex::M);
        m1.top_level = true;
        let mut f1 = Person::new("f1", Sex::F);
        f1.top_level = true;
        f1.proband = true;
        vec![m1, f1]
    }

    #[test]
    fn test_add_partner_with_default_child() {
        // scenario: two unrelated top-level people, partner f1
        let mut ds = top_pair();
        let partner = add_partner(None, &mut ds, "f1", &PartnerConfig::default()).unwrap();
        assert_eq!(ds.len(), 4);
        assert_eq!(ds[0].name, "m1");
        assert_eq!(ds[1].name, "f1");
        assert_eq!(ds[2].name, partner);
        assert_eq!(ds[2].sex, Sex::M);
        assert!(ds[2].noparents && ds[2].top_level);
        let child = &ds[3];
        assert_eq!(child.sex, Sex::U);
        assert_eq!(child.mother.as_deref(), Some("f1"));
        assert_eq!(child.father.as_deref(), Some(partner.as_str()));
    }

    #[test]
    fn test_add_partner_without_child() {
        let mut ds = top_pair();
        let config = PartnerConfig {
            create_child: false,
            ..Default::default()
        };
        add_partner(None, &mut ds, "f1", &config).unwrap();
        assert_eq!(ds.len(), 3);
    }

    #[test]
    fn test_add_partner_sex_override() {
        let mut ds = top_pair();
        let config = PartnerConfig {
            partner_sex: Some(Sex::F),
            create_child: false,
            ..Default::default()
        };
        let partner = add_partner(None, &mut ds, "f1", &config).unwrap();
        let p = person_by_name(&ds, &partner).unwrap();
        assert_eq!(p.sex, Sex::F);
    }

    #[test]
    fn test_add_child_to_solo_mother() {
        let mut soloma = Person::new("soloMom", Sex::F);
        soloma.top_level = true;
        soloma.proband = true;
        let mut ds = vec![soloma];
        let children = add_child(&mut ds, "soloMom", Sex::F, 1, None).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(ds.len(), 3);
        let placeholder = ds
            .iter()
            .find(|p| p.name != "soloMom" && !children.contains(&p.name))
            .unwrap();
        assert_eq!(placeholder.sex, Sex::M);
        assert!(placeholder.noparents && placeholder.top_level);
        let child = person_by_name(&ds, &children[0]).unwrap();
        assert_eq!(child.mother.as_deref(), Some("soloMom"));
        assert_eq!(child.father.as_deref(), Some(placeholder.name.as_str()));
    }

    #[test]
    fn test_add_child_twins_share_group() {
        let mut ds = top_pair();
        let mut mom = Person::new("mom", Sex::F);
        mom.mother = Some("f1".into());
        mom.father = Some("m1".into());
        ds.push(mom);
        let before = ds.len();
        let children = add_child(&mut ds, "mom", Sex::F, 2, Some("mztwin")).unwrap();
        assert_eq!(children.len(), 2);
        // partner placeholder + 2 children
        assert_eq!(ds.len(), before + 3);
        let t1 = person_by_name(&ds, &children[0]).unwrap();
        let t2 = person_by_name(&ds, &children[1]).unwrap();
        assert_eq!(t1.sex, Sex::F);
        assert_eq!(t2.sex, Sex::F);
        assert!(t1.mztwin.is_some());
        assert_eq!(t1.mztwin, t2.mztwin);
    }

    #[test]
    fn test_invalid_twin_type_is_recoverable() {
        let mut ds = top_pair();
        let err = add_child(&mut ds, "f1", Sex::F, 1, Some("triplet")).unwrap_err();
        assert!(matches!(err, EditError::InvalidTwinType(_)));
        assert_eq!(ds.len(), 2, "failed edit must not change the copy");
    }

    #[test]
    fn test_add_sibling_positions() {
        let mut ds = top_pair();
        let mut kid = Person::new("kid", Sex::F);
        kid.mother = Some("f1".into());
        kid.father = Some("m1".into());
        ds.push(kid);
        let right = add_sibling(&mut ds, "kid", Sex::M, false, None).unwrap();
        assert_eq!(ds[3].name, right);
        let left = add_sibling(&mut ds, "kid", Sex::M, true, None).unwrap();
        assert_eq!(ds[2].name, left);
        assert_eq!(ds[2].mother.as_deref(), Some("f1"));
    }

    #[test]
    fn test_add_sibling_twin_sync() {
        let mut ds = top_pair();
        let mut kid = Person::new("kid", Sex::F);
        kid.mother = Some("f1".into());
        kid.father = Some("m1".into());
        kid.yob = Some(2000);
        ds.push(kid);
        let tw = add_sibling(&mut ds, "kid", Sex::F, false, Some("dztwin")).unwrap();
        let t = person_by_name(&ds, &tw).unwrap();
        assert_eq!(t.dztwin, Some(TwinId("1".into())));
        assert_eq!(t.yob, Some(2000));
        assert_eq!(person_by_name(&ds, "kid").unwrap().dztwin, t.dztwin);
    }

    #[test]
    fn test_add_parents_at_top_restructures_root() {
        let mut ds = top_pair();
        let mut kid = Person::new("kid", Sex::F);
        kid.mother = Some("f1".into());
        kid.father = Some("m1".into());
        ds.push(kid);
        add_parents(None, &mut ds, "f1").unwrap();
        assert_eq!(ds.len(), 5);
        let f1 = person_by_name(&ds, "f1").unwrap();
        assert!(!f1.top_level && f1.has_parent_refs() && !f1.noparents);
        // the old co-top-level m1 became an adoptive child of the new couple
        let m1 = person_by_name(&ds, "m1").unwrap();
        assert!(!m1.top_level && m1.noparents);
        assert_eq!(m1.mother, f1.mother);
        // the new couple sits at the front of the array
        assert!(ds[0].top_level && ds[1].top_level);
        assert_eq!(ds[0].sex, Sex::M);
        assert_eq!(ds[1].sex, Sex::F);
    }

    #[test]
    fn test_add_parents_deeper_adds_couple() {
        let mut ds = top_pair();
        for name in ["a", "b"] {
            let mut p = Person::new(name, Sex::F);
            p.mother = Some("f1".into());
            p.father = Some("m1".into());
            ds.push(p);
        }
        // partner of "a", married in with copied parent refs
        let mut sp = Person::new("sp", Sex::M);
        sp.mother = Some("f1".into());
        sp.father = Some("m1".into());
        sp.noparents = true;
        ds.push(sp);
        let before = ds.len();
        add_parents(None, &mut ds, "sp").unwrap();
        assert_eq!(ds.len(), before + 2);
        let sp = person_by_name(&ds, "sp").unwrap();
        assert!(!sp.noparents);
        let mo = sp.mother.clone().unwrap();
        let fa = sp.father.clone().unwrap();
        assert_eq!(person_by_name(&ds, &mo).unwrap().sex, Sex::F);
        assert_eq!(person_by_name(&ds, &fa).unwrap().sex, Sex::M);
        let faidx = idx_by_name(&ds, &fa).unwrap();
        let moidx = idx_by_name(&ds, &mo).unwrap();
        assert!(faidx < moidx, "grandfather left of grandmother");
    }

    #[test]
    fn test_add_child_removes_placeholder() {
        let mut ds = top_pair();
        add_partner(None, &mut ds, "f1", &PartnerConfig::default()).unwrap();
        assert_eq!(ds.len(), 4);
        add_child(&mut ds, "f1", Sex::M, 1, None).unwrap();
        // the placeholder child was replaced by the real one
        assert_eq!(ds.len(), 4);
        assert!(ds.iter().all(|p| !p.partner_placeholder));
    }
}
