pub mod cache;
pub mod dataset;
pub mod edit;
pub mod hierarchy;
pub mod layout;
pub mod measure;
pub mod options;
pub mod pedigree;
pub mod person;
pub mod svg;
pub mod twins;
pub mod validation;

use wasm_bindgen::prelude::*;

use options::Options;
use pedigree::PedigreeContext;
use person::Person;

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

/// Render a pedigree dataset (a JSON array of person records) to SVG.
#[wasm_bindgen(js_name = "pedigreeToSvg")]
pub fn pedigree_to_svg(dataset_json: &str, options_json: Option<String>) -> Result<String, String> {
    let dataset: Vec<Person> =
        serde_json::from_str(dataset_json).map_err(|e| e.to_string())?;
    let mut opts: Options = match options_json.as_deref() {
        Some(json) => serde_json::from_str(json).map_err(|e| e.to_string())?,
        None => Options::default(),
    };
    opts.dataset = dataset;
    #[cfg(target_arch = "wasm32")]
    if opts.current_year.is_none() {
        opts.current_year = Some(js_sys::Date::new_0().get_full_year());
    }

    let mut ctx = PedigreeContext::new();
    pedigree::build(&mut ctx, opts).map_err(|e| e.to_string())?;
    ctx.svg()
        .map(str::to_string)
        .ok_or_else(|| "no render produced".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pedigree_to_svg_roundtrip() {
        let dataset = r#"[
            {"name":"m21","sex":"M","top_level":true},
            {"name":"f21","sex":"F","top_level":true},
            {"name":"ch1","sex":"F","mother":"f21","father":"m21","proband":true}
        ]"#;
        let svg = pedigree_to_svg(dataset, None).unwrap();
        assert!(svg.starts_with("<svg"));
    }

    #[test]
    fn test_pedigree_to_svg_reports_validation_errors() {
        let dataset = r#"[{"name":"ch1","sex":"F","mother":"f21","father":"m21"}]"#;
        let err = pedigree_to_svg(dataset, None).unwrap_err();
        assert!(err.to_lowercase().contains("missing"));
    }
}
