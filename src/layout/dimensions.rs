//! Tree drawing-area sizing.
//!
//! The requested SVG size is only a floor: a generation crowded with
//! symbols, or a pedigree many generations deep, grows the layout area so
//! the tidy-tree walk has room to keep nodes apart.

use std::collections::HashMap;

use crate::dataset::{all_children, dataset_depth};
use crate::person::Person;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeDimensions {
    pub width: f64,
    pub height: f64,
}

/// Score each generation by how much horizontal room its members need
/// (children fan out below, a second parent widens the couple), then size
/// the drawing area from the busiest generation and the generation count.
pub fn tree_dimensions(
    dataset: &[Person],
    svg_width: f64,
    svg_height: f64,
    symbol_size: f64,
) -> TreeDimensions {
    let mut generation: HashMap<usize, f64> = HashMap::new();
    let mut maxscore = 0.0f64;
    for p in dataset {
        let depth = dataset_depth(dataset, &p.name);
        let nchildren = all_children(dataset, p, None).len();
        let mut score = 1.0;
        if nchildren > 0 {
            score += 0.55 + nchildren as f64 * 0.25;
        }
        if p.father.is_some() {
            score += 0.25;
        }
        let entry = generation.entry(depth).or_insert(0.0);
        *entry += score;
        if *entry > maxscore {
            maxscore = *entry;
        }
    }

    let max_depth = generation.len() as f64 * symbol_size * 3.5;
    let width = (svg_width - symbol_size).max(maxscore * symbol_size * 1.65);
    let height = (svg_height - symbol_size).max(max_depth);
    TreeDimensions { width, height }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::person::Sex;

    #[test]
    fn test_small_family_uses_svg_size() {
        let mut f = Person::new("dad", Sex::M);
        f.top_level = true;
        let mut m = Person::new("mum", Sex::F);
        m.top_level = true;
        let dims = tree_dimensions(&[f, m], 600.0, 400.0, 35.0);
        assert_eq!(dims.width, 600.0 - 35.0);
        assert_eq!(dims.height, 400.0 - 35.0);
    }

    #[test]
    fn test_wide_generation_grows_width() {
        let mut ds = vec![];
        let mut f = Person::new("dad", Sex::M);
        f.top_level = true;
        let mut m = Person::new("mum", Sex::F);
        m.top_level = true;
        ds.push(f);
        ds.push(m);
        for i in 0..12 {
            let mut c = Person::new(format!("c{i}"), Sex::U);
            c.mother = Some("mum".into());
            c.father = Some("dad".into());
            ds.push(c);
        }
        let dims = tree_dimensions(&ds, 600.0, 400.0, 35.0);
        assert!(dims.width > 600.0);
    }
}
