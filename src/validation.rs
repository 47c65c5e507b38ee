//! Pedigree dataset validation and connectivity checks.

use std::collections::HashSet;

use tracing::warn;

use crate::dataset::{all_children, partners_of, person_by_name, proband_idx};
use crate::person::{Person, Sex};

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} has no IndivID")]
    MissingName(String),
    #[error("IndivID for family member {0} is not unique")]
    DuplicateName(String),
    #[error("Missing parent for {0}")]
    MissingParent(String),
    #[error("The mother (IndivID: {mother}) of family member {person} is missing from the pedigree")]
    MotherMissing { mother: String, person: String },
    #[error("The father (IndivID: {father}) of family member {person} is missing from the pedigree")]
    FatherMissing { father: String, person: String },
    #[error("The mother of family member {0} is not specified as female. All mothers in the pedigree must have sex specified as 'F'")]
    MotherNotFemale(String),
    #[error("The father of family member {0} is not specified as male. All fathers in the pedigree must have sex specified as 'M'")]
    FatherNotMale(String),
    #[error("More than one family found: {0}")]
    MultipleFamilies(String),
    #[error("empty pedigree data set")]
    EmptyDataset,
}

/// How `validate_pedigree` decides what to run. Callers may substitute
/// their own predicate or switch validation off entirely.
#[derive(Clone, Copy, Default)]
pub enum Validate {
    #[default]
    Default,
    Disabled,
    Custom(fn(&[Person]) -> Result<(), ValidationError>),
}

impl std::fmt::Debug for Validate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Validate::Default => f.write_str("Default"),
            Validate::Disabled => f.write_str("Disabled"),
            Validate::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

fn describe(p: &Person) -> String {
    let display = p.display_name.as_deref().unwrap_or("unnamed");
    format!("{display} (IndivID: {})", p.name)
}

/// Validate the dataset against the data-model invariants: both parents
/// present or neither, referenced parents exist with consistent sex, unique
/// non-empty names, a single family id. A break in connectivity is warned
/// about, never fatal here.
pub fn validate_pedigree(mode: Validate, dataset: &[Person]) -> Result<(), ValidationError> {
    match mode {
        Validate::Disabled => return Ok(()),
        Validate::Custom(f) => return f(dataset),
        Validate::Default => {}
    }

    let mut uniquenames: HashSet<&str> = HashSet::new();
    let mut famids: Vec<&str> = Vec::new();
    for p in dataset {
        if p.has_parent_refs() {
            let display = describe(p);
            let (Some(mother), Some(father)) = (p.mother.as_deref(), p.father.as_deref()) else {
                return Err(ValidationError::MissingParent(display));
            };
            let Some(m) = person_by_name(dataset, mother) else {
                return Err(ValidationError::MotherMissing {
                    mother: mother.to_string(),
                    person: display,
                });
            };
            let Some(f) = person_by_name(dataset, father) else {
                return Err(ValidationError::FatherMissing {
                    father: father.to_string(),
                    person: display,
                });
            };
            if m.sex != Sex::F {
                return Err(ValidationError::MotherNotFemale(display));
            }
            if f.sex != Sex::M {
                return Err(ValidationError::FatherNotMale(display));
            }
        }

        if p.name.is_empty() {
            return Err(ValidationError::MissingName(describe(p)));
        }
        if !uniquenames.insert(&p.name) {
            return Err(ValidationError::DuplicateName(describe(p)));
        }
        if let Some(famid) = p.famid.as_deref()
            && !famids.contains(&famid)
        {
            famids.push(famid);
        }
    }

    if famids.len() > 1 {
        return Err(ValidationError::MultipleFamilies(famids.join(", ")));
    }

    let uc = unconnected(dataset)?;
    if !uc.is_empty() {
        warn!(unconnected = ?uc, "individuals unconnected to pedigree");
    }
    Ok(())
}

/// Names of individuals not reachable from the proband (or the first record
/// when no proband is marked) over parent, partner and child edges.
///
/// A person's parents are only followed when the person, or one of their
/// partners, renders a parent link (`noparents` gating). Iteration is
/// bounded: the frontier can only grow `dataset.len()` times, but the cap
/// mirrors the original's safety valve.
pub fn unconnected(dataset: &[Person]) -> Result<Vec<String>, ValidationError> {
    let target = match proband_idx(dataset) {
        Some(i) => &dataset[i],
        None => {
            warn!("no proband defined for connectivity check");
            dataset.first().ok_or(ValidationError::EmptyDataset)?
        }
    };

    let mut connected: Vec<&str> = vec![target.name.as_str()];
    let mut change = true;
    let mut rounds = 0;
    while change && rounds < 200 {
        rounds += 1;
        let before = connected.len();
        for p in dataset {
            if connected.contains(&p.name.as_str()) {
                // follow parents if this person, or any partner, has a
                // rendered parent link
                let mut has_parent = p.name == target.name || !p.noparents;
                for ptr in partners_of(dataset, p) {
                    if person_by_name(dataset, ptr).is_some_and(|q| !q.noparents) {
                        has_parent = true;
                    }
                }
                if has_parent {
                    for parent in [p.mother.as_deref(), p.father.as_deref()].into_iter().flatten() {
                        if !connected.contains(&parent) {
                            connected.push(parent);
                        }
                    }
                }
            } else if !p.noparents
                && [p.mother.as_deref(), p.father.as_deref()]
                    .into_iter()
                    .flatten()
                    .any(|parent| connected.contains(&parent))
            {
                connected.push(&p.name);
            }
            include_children(&mut connected, p, dataset);
        }
        change = connected.len() != before;
    }

    Ok(dataset
        .iter()
        .filter(|p| !connected.contains(&p.name.as_str()))
        .map(|p| p.name.clone())
        .collect())
}

fn include_children<'a>(connected: &mut Vec<&'a str>, p: &'a Person, dataset: &'a [Person]) {
    if !connected.contains(&p.name.as_str()) {
        return;
    }
    for ptr in partners_of(dataset, p) {
        if !connected.contains(&ptr) {
            connected.push(ptr);
        }
    }
    for child in all_children(dataset, p, None) {
        if !connected.contains(&child.name.as_str()) {
            connected.push(&child.name);
            for ptr in partners_of(dataset, child) {
                if !connected.contains(&ptr) {
                    connected.push(ptr);
                }
            }
        }
    }
}

/// Whether a person's sex may be edited. A person referenced as a parent
/// with a known sex is locked: mothers must stay female and fathers male.
pub fn can_change_sex(dataset: &[Person], name: &str) -> bool {
    let Some(node) = person_by_name(dataset, name) else {
        return true;
    };
    if node.sex == Sex::U {
        return true;
    }
    !dataset
        .iter()
        .any(|p| p.mother.as_deref() == Some(name) || p.father.as_deref() == Some(name))
}

/// Age and year-of-birth consistency against `current_year`. For the
/// deceased the sum must simply not exceed the current year; for the living
/// the sum must land within two years of it (a birthday may not have
/// passed yet).
pub fn validate_age_yob(age: u32, yob: u32, status: u32, current_year: u32) -> bool {
    let sum = age + yob;
    match status {
        1 => current_year >= sum,
        0 => current_year >= sum && current_year - sum <= 2,
        _ => false,
    }
}
