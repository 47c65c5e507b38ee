//! Queries and ordered edits over the flat person array.
//!
//! The array is the single durable source of truth. Its order is not just
//! storage order: for siblings that have never been laid out, array position
//! encodes the initial left-to-right render order. Every structural edit
//! therefore goes through the splice helpers at the bottom of this module so
//! that the ordering contract lives in one place.

use rand::Rng;

use crate::person::{Person, Sex, TwinKind};

/// Index of a person by name.
pub fn idx_by_name(dataset: &[Person], name: &str) -> Option<usize> {
    dataset.iter().position(|p| p.name == name)
}

pub fn person_by_name<'a>(dataset: &'a [Person], name: &str) -> Option<&'a Person> {
    dataset.iter().find(|p| p.name == name)
}

pub fn person_by_name_mut<'a>(dataset: &'a mut [Person], name: &str) -> Option<&'a mut Person> {
    dataset.iter_mut().find(|p| p.name == name)
}

/// Index of the proband, if one is marked.
pub fn proband_idx(dataset: &[Person]) -> Option<usize> {
    dataset.iter().position(|p| p.proband)
}

/// Mark `name` as the proband and clear the flag everywhere else.
pub fn set_proband(dataset: &mut [Person], name: &str) {
    for p in dataset.iter_mut() {
        p.proband = p.name == name;
    }
}

/// Names of everyone this person has had a child with, in dataset order.
pub fn partners_of<'a>(dataset: &'a [Person], person: &Person) -> Vec<&'a str> {
    let mut ptrs: Vec<&str> = Vec::new();
    for p in dataset {
        let other = if p.mother.as_deref() == Some(&person.name) {
            p.father.as_deref()
        } else if p.father.as_deref() == Some(&person.name) {
            p.mother.as_deref()
        } else {
            None
        };
        if let Some(other) = other
            && !ptrs.contains(&other)
        {
            ptrs.push(other);
        }
    }
    ptrs
}

/// The children of a couple, keyed off the mother (who must be recorded as
/// female). `noparents` people are included: a married-in partner carries
/// copied parent references so the layout places them at their in-laws'
/// generation, and only the *link* is suppressed at render time.
pub fn children_of<'a>(
    dataset: &'a [Person],
    mother: &Person,
    father: Option<&Person>,
) -> Vec<&'a Person> {
    let mut children = Vec::new();
    let mut names: Vec<&str> = Vec::new();
    if mother.sex != Sex::F {
        return children;
    }
    for p in dataset {
        if p.mother.as_deref() == Some(&mother.name)
            && father.is_none_or(|f| p.father.as_deref() == Some(&f.name))
            && !names.contains(&p.name.as_str())
        {
            children.push(p);
            names.push(&p.name);
        }
    }
    children
}

/// Biological children of one parent (either role), optionally filtered by
/// sex. Excludes `noparents` records.
pub fn all_children<'a>(
    dataset: &'a [Person],
    person: &Person,
    sex: Option<Sex>,
) -> Vec<&'a Person> {
    dataset
        .iter()
        .filter(|p| {
            !p.noparents
                && (p.mother.as_deref() == Some(&person.name)
                    || p.father.as_deref() == Some(&person.name))
                && sex.is_none_or(|s| p.sex == s)
        })
        .collect()
}

/// Full siblings, optionally filtered by sex. Excludes `noparents` records
/// and people without a recorded mother.
pub fn siblings<'a>(dataset: &'a [Person], person: &Person, sex: Option<Sex>) -> Vec<&'a Person> {
    if person.mother.is_none() || person.noparents {
        return Vec::new();
    }
    all_siblings(dataset, person, sex)
}

/// Siblings sharing both recorded parents, adopted or not.
pub fn all_siblings<'a>(
    dataset: &'a [Person],
    person: &Person,
    sex: Option<Sex>,
) -> Vec<&'a Person> {
    dataset
        .iter()
        .filter(|p| {
            p.name != person.name
                && !p.noparents
                && p.mother.is_some()
                && p.mother == person.mother
                && p.father == person.father
                && sex.is_none_or(|s| p.sex == s)
        })
        .collect()
}

/// Siblings that share this person's parent references but carry the
/// `noparents` flag (adoptive placeholders, married-in partners).
pub fn adopted_siblings<'a>(dataset: &'a [Person], person: &Person) -> Vec<&'a Person> {
    dataset
        .iter()
        .filter(|p| {
            p.name != person.name
                && p.noparents
                && p.mother == person.mother
                && p.father == person.father
        })
        .collect()
}

/// This person's twins: siblings sharing the same twin-group id.
pub fn twins_of<'a>(dataset: &'a [Person], person: &Person) -> Vec<&'a Person> {
    let Some(kind) = person.twin_kind() else {
        return Vec::new();
    };
    let id = person.twin_id(kind);
    siblings(dataset, person, None)
        .into_iter()
        .filter(|p| p.twin_id(kind) == id)
        .collect()
}

/// Twins of a person by group id alone, without the sibling requirement.
/// Used while a twin group is being assembled and parent links may still be
/// in flux.
pub fn twin_group_members<'a>(
    dataset: &'a [Person],
    kind: TwinKind,
    id: &crate::person::TwinId,
) -> Vec<&'a Person> {
    dataset
        .iter()
        .filter(|p| p.twin_id(kind) == Some(id))
        .collect()
}

/// Generation count walked up the maternal line, starting at 1. A top-level
/// person (or one whose mother is absent from the dataset) comes out at 2.
pub fn dataset_depth(dataset: &[Person], name: &str) -> usize {
    let mut idx = idx_by_name(dataset, name);
    let mut depth = 1;
    while let Some(i) = idx {
        let p = &dataset[i];
        if p.mother.is_none() && !p.top_level {
            break;
        }
        idx = p.mother.as_deref().and_then(|m| idx_by_name(dataset, m));
        depth += 1;
    }
    depth
}

/// All ancestors of a person (following both parents, stopping at
/// `noparents`), the person included last.
pub fn ancestors<'a>(dataset: &'a [Person], person: &'a Person) -> Vec<&'a Person> {
    let mut out = Vec::new();
    fn recurse<'a>(dataset: &'a [Person], p: &'a Person, out: &mut Vec<&'a Person>) {
        if out.iter().any(|a: &&Person| a.name == p.name) {
            return;
        }
        if let (Some(m), Some(f), false) = (p.mother.as_deref(), p.father.as_deref(), p.noparents) {
            if let Some(mp) = person_by_name(dataset, m) {
                recurse(dataset, mp, out);
            }
            if let Some(fp) = person_by_name(dataset, f) {
                recurse(dataset, fp, out);
            }
        }
        out.push(p);
    }
    recurse(dataset, person, &mut out);
    out
}

/// A deep copy of the dataset for a mutator to work on. Mutators never touch
/// the array backing the current render.
pub fn copy_dataset(dataset: &[Person]) -> Vec<Person> {
    dataset.to_vec()
}

/// Generate a fresh record name: random letters, re-rolled on the unlikely
/// collision with an existing name.
pub fn generate_name(dataset: &[Person], len: usize) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    loop {
        let name: String = (0..len)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        if idx_by_name(dataset, &name).is_none() {
            return name;
        }
    }
}

/// Splice a record in at `idx`, clamped to the array bounds.
pub fn insert_at(dataset: &mut Vec<Person>, idx: usize, person: Person) {
    let idx = idx.min(dataset.len());
    dataset.insert(idx, person);
}

/// Splice a record in immediately after the named person (at the end if the
/// name is unknown).
pub fn insert_after(dataset: &mut Vec<Person>, name: &str, person: Person) {
    match idx_by_name(dataset, name) {
        Some(i) => insert_at(dataset, i + 1, person),
        None => dataset.push(person),
    }
}

/// Remove a record by name. Returns the removed person.
pub fn remove_by_name(dataset: &mut Vec<Person>, name: &str) -> Option<Person> {
    idx_by_name(dataset, name).map(|i| dataset.remove(i))
}
