//! Approximate text metrics for SVG labels.

use unicode_width::UnicodeWidthStr;

pub struct LabelMetrics {
    pub char_width: f64,
    pub line_height: f64,
}

impl Default for LabelMetrics {
    fn default() -> Self {
        Self {
            char_width: 6.5,
            line_height: 14.0,
        }
    }
}

impl LabelMetrics {
    pub fn text_width(&self, text: &str) -> f64 {
        UnicodeWidthStr::width(text) as f64 * self.char_width
    }

    /// Trim a label to fit `max_width`, appending an ellipsis when anything
    /// was cut.
    pub fn fit_label(&self, text: &str, max_width: f64) -> String {
        if self.text_width(text) <= max_width {
            return text.to_string();
        }
        let budget = (max_width / self.char_width).floor() as usize;
        let mut out = String::new();
        let mut used = 0usize;
        for c in text.chars() {
            let w = UnicodeWidthStr::width(c.to_string().as_str());
            if used + w + 1 > budget {
                break;
            }
            out.push(c);
            used += w;
        }
        out.push('…');
        out
    }
}
