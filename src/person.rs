//! Person records: the element type of the flat pedigree dataset.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// Biological sex as recorded on the pedigree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    M,
    F,
    U,
}

impl Sex {
    /// The sex a synthesized partner defaults to.
    pub fn opposite(self) -> Sex {
        match self {
            Sex::M => Sex::F,
            Sex::F => Sex::M,
            Sex::U => Sex::U,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Sex::M => "M",
            Sex::F => "F",
            Sex::U => "U",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Twin relationship flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwinKind {
    Monozygotic,
    Dizygotic,
}

impl TwinKind {
    pub const ALL: [TwinKind; 2] = [TwinKind::Monozygotic, TwinKind::Dizygotic];

    /// Parse the field name used in widget configuration and stored data.
    pub fn from_field(s: &str) -> Option<TwinKind> {
        match s {
            "mztwin" => Some(TwinKind::Monozygotic),
            "dztwin" => Some(TwinKind::Dizygotic),
            _ => None,
        }
    }

    pub fn field(self) -> &'static str {
        match self {
            TwinKind::Monozygotic => "mztwin",
            TwinKind::Dizygotic => "dztwin",
        }
    }
}

/// A twin-group identifier. The pool is `1..9` plus `"A"`, so at most ten
/// concurrent groups per twin kind. Incoming JSON may encode the id as a
/// number or a string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TwinId(pub String);

/// The identifiers available for twin groups.
pub const TWIN_ID_POOL: [&str; 10] = ["1", "2", "3", "4", "5", "6", "7", "8", "9", "A"];

impl<'de> Deserialize<'de> for TwinId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(s) => Ok(TwinId(s)),
            serde_json::Value::Number(n) => Ok(TwinId(n.to_string())),
            other => Err(de::Error::custom(format!(
                "twin id must be a number or string, got {other}"
            ))),
        }
    }
}

impl fmt::Display for TwinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Accept small integers (status, age, year of birth) encoded as either
/// JSON numbers or strings.
fn de_loose_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .map(|v| Some(v as u32))
            .ok_or_else(|| de::Error::custom(format!("expected a non-negative integer, got {n}"))),
        Some(serde_json::Value::String(s)) => {
            if s.is_empty() {
                return Ok(None);
            }
            s.parse::<u32>()
                .map(Some)
                .map_err(|_| de::Error::custom(format!("expected an integer, got {s:?}")))
        }
        Some(other) => Err(de::Error::custom(format!(
            "expected an integer or string, got {other}"
        ))),
    }
}

fn is_false(v: &bool) -> bool {
    !*v
}

/// A flat pedigree record. Identity is the unique `name`; `mother`/`father`
/// reference other records by name. Clinical keys (for example
/// `breast_cancer_diagnosis_age`) are free-form and kept in `clinical`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    #[serde(default = "default_sex")]
    pub sex: Sex,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mother: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub father: Option<String>,
    /// Parent links exist in the data but must not render as a biological
    /// relationship (adoptive or placeholder parentage).
    #[serde(default, skip_serializing_if = "is_false")]
    pub noparents: bool,
    /// Anchored at the shallowest generation, directly under the tree root.
    #[serde(default, skip_serializing_if = "is_false")]
    pub top_level: bool,
    /// The index individual. At most one per dataset.
    #[serde(default, skip_serializing_if = "is_false")]
    pub proband: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mztwin: Option<TwinId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dztwin: Option<TwinId>,
    /// 0 = alive, 1 = dead.
    #[serde(default, deserialize_with = "de_loose_u32", skip_serializing_if = "Option::is_none")]
    pub status: Option<u32>,
    #[serde(default, deserialize_with = "de_loose_u32", skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, deserialize_with = "de_loose_u32", skip_serializing_if = "Option::is_none")]
    pub yob: Option<u32>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub adopted_in: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub adopted_out: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub miscarriage: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub termination: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub stillbirth: bool,
    /// Excluded from risk calculations; rendered with a dashed border.
    #[serde(default, skip_serializing_if = "is_false")]
    pub exclude: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub affected: bool,
    /// Name of a divorced partner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub divorced: Option<String>,
    /// Auto-created child giving a childless couple a layout branching
    /// point; replaced when a real child is added.
    #[serde(default, skip_serializing_if = "is_false")]
    pub partner_placeholder: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub famid: Option<String>,
    /// Free-form disease/clinical keys, prefixed by disease type.
    #[serde(flatten)]
    pub clinical: BTreeMap<String, serde_json::Value>,
}

fn default_sex() -> Sex {
    Sex::U
}

impl Person {
    /// A bare record with only identity and sex, the shape every mutator
    /// starts from.
    pub fn new(name: impl Into<String>, sex: Sex) -> Person {
        Person {
            name: name.into(),
            sex,
            display_name: None,
            mother: None,
            father: None,
            noparents: false,
            top_level: false,
            proband: false,
            mztwin: None,
            dztwin: None,
            status: None,
            age: None,
            yob: None,
            adopted_in: false,
            adopted_out: false,
            miscarriage: false,
            termination: false,
            stillbirth: false,
            exclude: false,
            affected: false,
            divorced: None,
            partner_placeholder: false,
            famid: None,
            clinical: BTreeMap::new(),
        }
    }

    pub fn is_dead(&self) -> bool {
        self.status == Some(1)
    }

    /// Either parent reference present.
    pub fn has_parent_refs(&self) -> bool {
        self.mother.is_some() || self.father.is_some()
    }

    pub fn twin_id(&self, kind: TwinKind) -> Option<&TwinId> {
        match kind {
            TwinKind::Monozygotic => self.mztwin.as_ref(),
            TwinKind::Dizygotic => self.dztwin.as_ref(),
        }
    }

    pub fn set_twin_id(&mut self, kind: TwinKind, id: Option<TwinId>) {
        match kind {
            TwinKind::Monozygotic => self.mztwin = id,
            TwinKind::Dizygotic => self.dztwin = id,
        }
    }

    /// The twin kind this person belongs to, monozygotic taking precedence
    /// as in the original data model.
    pub fn twin_kind(&self) -> Option<TwinKind> {
        if self.mztwin.is_some() {
            Some(TwinKind::Monozygotic)
        } else if self.dztwin.is_some() {
            Some(TwinKind::Dizygotic)
        } else {
            None
        }
    }

    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

/// Check whether a person carries a clinical key with the given disease
/// prefix (`prefix` itself or `prefix_*`).
pub fn prefix_in_person(prefix: &str, person: &Person) -> bool {
    person
        .clinical
        .keys()
        .any(|k| k == prefix || (k.starts_with(prefix) && k[prefix.len()..].starts_with('_')))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sex_opposite() {
        assert_eq!(Sex::M.opposite(), Sex::F);
        assert_eq!(Sex::F.opposite(), Sex::M);
        assert_eq!(Sex::U.opposite(), Sex::U);
    }

    #[test]
    fn test_twin_id_from_number_or_string() {
        let p: Person = serde_json::from_str(r#"{"name":"a","sex":"F","mztwin":1}"#).unwrap();
        assert_eq!(p.mztwin, Some(TwinId("1".into())));
        let p: Person = serde_json::from_str(r#"{"name":"b","sex":"F","mztwin":"A"}"#).unwrap();
        assert_eq!(p.mztwin, Some(TwinId("A".into())));
    }

    #[test]
    fn test_status_from_number_or_string() {
        let p: Person = serde_json::from_str(r#"{"name":"a","sex":"M","status":"1"}"#).unwrap();
        assert!(p.is_dead());
        let p: Person = serde_json::from_str(r#"{"name":"b","sex":"M","status":0}"#).unwrap();
        assert!(!p.is_dead());
    }

    #[test]
    fn test_clinical_keys_flattened() {
        let p: Person = serde_json::from_str(
            r#"{"name":"a","sex":"F","breast_cancer_diagnosis_age":42}"#,
        )
        .unwrap();
        assert!(prefix_in_person("breast_cancer", &p));
        assert!(!prefix_in_person("ovarian_cancer", &p));
        assert!(!prefix_in_person("breast_cancer_diagnosis_age_x", &p));
    }

    #[test]
    fn test_roundtrip_keeps_flags() {
        let p: Person =
            serde_json::from_str(r#"{"name":"a","sex":"F","top_level":true,"proband":true}"#)
                .unwrap();
        let json = serde_json::to_string(&p).unwrap();
        let q: Person = serde_json::from_str(&json).unwrap();
        assert_eq!(p, q);
    }
}
