//! Build configuration with documented defaults.

use serde::{Deserialize, Serialize};

use crate::person::{Person, Sex};
use crate::validation::Validate;

/// A disease type and the colour its marker is filled with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Disease {
    #[serde(rename = "type")]
    pub kind: String,
    pub colour: String,
}

impl Disease {
    fn new(kind: &str, colour: &str) -> Disease {
        Disease {
            kind: kind.to_string(),
            colour: colour.to_string(),
        }
    }
}

/// Pedigree build options. Every field has a default; `build` returns the
/// normalized value it actually used so callers can chain follow-up edits
/// off it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Identity of the target container, used to key render state.
    pub target: String,
    pub dataset: Vec<Person>,
    pub width: f64,
    pub height: f64,
    pub symbol_size: f64,
    pub font_size: String,
    pub font_family: String,
    pub font_weight: u32,
    pub background: String,
    pub node_background: String,
    pub node_border_color: String,
    pub node_border_color_with_data: String,
    pub link_color: String,
    pub affected_fill_color: String,
    pub clash_indicator_color: String,
    pub dead_line_color: String,
    pub exclude_fill_color: String,
    pub diseases: Vec<Disease>,
    /// Label keys rendered under each symbol, in order.
    pub labels: Vec<String>,
    /// Year used for age/year-of-birth consistency checks. Filled from the
    /// host clock when absent.
    pub current_year: Option<u32>,
    /// Render hidden nodes and emit extra diagnostics.
    pub debug: bool,
    #[serde(skip)]
    pub validate: Validate,
}

impl Default for Options {
    fn default() -> Self {
        let mut father = Person::new("m21", Sex::M);
        father.display_name = Some("father".into());
        father.top_level = true;
        let mut mother = Person::new("f21", Sex::F);
        mother.display_name = Some("mother".into());
        mother.top_level = true;
        let mut me = Person::new("ch1", Sex::F);
        me.display_name = Some("me".into());
        me.mother = Some("f21".into());
        me.father = Some("m21".into());
        me.proband = true;

        Options {
            target: "pedigree_edit".into(),
            dataset: vec![father, mother, me],
            width: 600.0,
            height: 400.0,
            symbol_size: 35.0,
            font_size: ".75em".into(),
            font_family: "Helvetica".into(),
            font_weight: 700,
            background: "#FAFAFA".into(),
            node_background: "#fdfdfd".into(),
            node_border_color: "grey".into(),
            node_border_color_with_data: "#303030".into(),
            link_color: "#000".into(),
            affected_fill_color: "darkgrey".into(),
            clash_indicator_color: "#D5494A".into(),
            dead_line_color: "black".into(),
            exclude_fill_color: "lightgrey".into(),
            diseases: vec![
                Disease::new("breast_cancer", "#F68F35"),
                Disease::new("breast_cancer2", "pink"),
                Disease::new("ovarian_cancer", "#306430"),
                Disease::new("pancreatic_cancer", "#4289BA"),
                Disease::new("prostate_cancer", "#D5494A"),
            ],
            labels: vec!["age".into(), "yob".into()],
            current_year: None,
            debug: false,
            validate: Validate::Default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = Options::default();
        assert_eq!(opts.dataset.len(), 3);
        assert_eq!(opts.symbol_size, 35.0);
        assert_eq!(opts.diseases.len(), 5);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let opts: Options = serde_json::from_str(r#"{"width": 800}"#).unwrap();
        assert_eq!(opts.width, 800.0);
        assert_eq!(opts.height, 400.0);
        assert_eq!(opts.target, "pedigree_edit");
    }
}
