//! Twin-group bookkeeping: id allocation, pairing, attribute sync, pruning.

use crate::dataset::twin_group_members;
use crate::person::{Person, TwinId, TwinKind, TWIN_ID_POOL};

/// Next free twin-group id for the given kind, or `None` when all ten are in
/// use.
pub fn unique_twin_id(dataset: &[Person], kind: TwinKind) -> Option<TwinId> {
    let mut pool: Vec<&str> = TWIN_ID_POOL.to_vec();
    for p in dataset {
        if let Some(id) = p.twin_id(kind) {
            pool.retain(|candidate| *candidate != id.0);
        }
    }
    pool.first().map(|id| TwinId((*id).to_string()))
}

/// Mark two siblings as twins of the given kind. The first twin's group id
/// is reused if present, otherwise a fresh one is allocated. Year of birth
/// and (while alive) age are copied onto the second twin. Returns `false`
/// when the id pool is exhausted.
pub fn set_twins(dataset: &mut [Person], first: &str, second: &str, kind: TwinKind) -> bool {
    let id = {
        let Some(d1) = dataset.iter().find(|p| p.name == first) else {
            return false;
        };
        match d1.twin_id(kind) {
            Some(id) => id.clone(),
            None => match unique_twin_id(dataset, kind) {
                Some(id) => id,
                None => return false,
            },
        }
    };

    let (yob, age) = {
        let Some(d1) = dataset.iter_mut().find(|p| p.name == first) else {
            return false;
        };
        if d1.twin_id(kind).is_none() {
            d1.set_twin_id(kind, Some(id.clone()));
        }
        (d1.yob, if d1.is_dead() { None } else { d1.age })
    };

    let Some(d2) = dataset.iter_mut().find(|p| p.name == second) else {
        return false;
    };
    d2.set_twin_id(kind, Some(id));
    if yob.is_some() {
        d2.yob = yob;
    }
    if age.is_some() {
        d2.age = age;
    }
    true
}

/// Propagate one twin's attributes to the rest of their group after an edit.
/// Monozygotic twins also share sex.
pub fn sync_twins(dataset: &mut [Person], name: &str) {
    let Some(d1) = dataset.iter().find(|p| p.name == name) else {
        return;
    };
    let Some(kind) = d1.twin_kind() else {
        return;
    };
    let id = d1.twin_id(kind).cloned();
    let sex = d1.sex;
    let yob = d1.yob;
    let age = if d1.is_dead() { None } else { d1.age };

    for d2 in dataset.iter_mut() {
        if d2.name != name && d2.twin_id(kind) == id.as_ref() {
            if kind == TwinKind::Monozygotic {
                d2.sex = sex;
            }
            if yob.is_some() {
                d2.yob = yob;
            }
            if age.is_some() {
                d2.age = age;
            }
        }
    }
}

/// Drop any twin-group id held by fewer than two people. Runs after every
/// structural deletion so orphaned twin markers never survive; idempotent.
pub fn check_twins(dataset: &mut [Person]) {
    for kind in TwinKind::ALL {
        let orphaned: Vec<String> = dataset
            .iter()
            .filter_map(|p| p.twin_id(kind).cloned())
            .filter(|id| twin_group_members(dataset, kind, id).len() < 2)
            .map(|id| id.0)
            .collect();
        if orphaned.is_empty() {
            continue;
        }
        for p in dataset.iter_mut() {
            if p.twin_id(kind).is_some_and(|id| orphaned.contains(&id.0)) {
                p.set_twin_id(kind, None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::person::Sex;

    fn sibs() -> Vec<Person> {
        let mut a = Person::new("a", Sex::F);
        a.mother = Some("m".into());
        a.father = Some("f".into());
        let mut b = a.clone();
        b.name = "b".into();
        let mut c = a.clone();
        c.name = "c".into();
        vec![a, b, c]
    }

    #[test]
    fn test_unique_twin_id_skips_used() {
        let mut ds = sibs();
        ds[0].mztwin = Some(TwinId("1".into()));
        ds[1].mztwin = Some(TwinId("1".into()));
        assert_eq!(
            unique_twin_id(&ds, TwinKind::Monozygotic),
            Some(TwinId("2".into()))
        );
        // the dizygotic pool is independent
        assert_eq!(
            unique_twin_id(&ds, TwinKind::Dizygotic),
            Some(TwinId("1".into()))
        );
    }

    #[test]
    fn test_set_twins_copies_yob_and_age() {
        let mut ds = sibs();
        ds[0].yob = Some(1990);
        ds[0].age = Some(35);
        assert!(set_twins(&mut ds, "a", "b", TwinKind::Monozygotic));
        assert_eq!(ds[1].mztwin, ds[0].mztwin);
        assert_eq!(ds[1].yob, Some(1990));
        assert_eq!(ds[1].age, Some(35));
    }

    #[test]
    fn test_sync_twins_mz_copies_sex() {
        let mut ds = sibs();
        set_twins(&mut ds, "a", "b", TwinKind::Monozygotic);
        ds[0].sex = Sex::M;
        sync_twins(&mut ds, "a");
        assert_eq!(ds[1].sex, Sex::M);
        assert_eq!(ds[2].sex, Sex::F);
    }

    #[test]
    fn test_check_twins_prunes_singletons() {
        let mut ds = sibs();
        ds[0].mztwin = Some(TwinId("1".into()));
        check_twins(&mut ds);
        assert_eq!(ds[0].mztwin, None);
    }

    #[test]
    fn test_check_twins_idempotent() {
        let mut ds = sibs();
        set_twins(&mut ds, "a", "b", TwinKind::Dizygotic);
        ds[2].dztwin = Some(TwinId("9".into()));
        check_twins(&mut ds);
        let once = ds.clone();
        check_twins(&mut ds);
        assert_eq!(ds, once);
        assert_eq!(ds[2].dztwin, None);
        assert!(ds[0].dztwin.is_some() && ds[1].dztwin.is_some());
    }
}
