//! SVG rendering of a laid-out pedigree.
//!
//! Symbols follow clinical convention: squares for males, circles for
//! females, a rotated square for unknown sex and a triangle for a pregnancy
//! loss. Decorative flourishes (adoption brackets, disease pie sectors,
//! the proband arrowhead, divorce slashes) are deliberately not drawn; the
//! classes that would carry them are still emitted for styling hooks.

use std::fmt::Write;

use crate::hierarchy::{Hierarchy, NodeKind};
use crate::layout::clash::{stepped_path, PartnerRoute};
use crate::measure::LabelMetrics;
use crate::options::Options;
use crate::person::{prefix_in_person, Person, Sex};

pub struct SvgRenderer {
    metrics: LabelMetrics,
}

impl Default for SvgRenderer {
    fn default() -> Self {
        Self {
            metrics: LabelMetrics::default(),
        }
    }
}

impl SvgRenderer {
    pub fn render(
        &self,
        opts: &Options,
        dataset: &[Person],
        h: &Hierarchy,
        routes: &[PartnerRoute],
    ) -> String {
        let mut svg = String::new();
        writeln!(
            &mut svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{ht}" viewBox="0 0 {w} {ht}">"#,
            w = opts.width,
            ht = opts.height
        )
        .unwrap();

        writeln!(
            &mut svg,
            r#"<style>
  .partner-link {{ fill: none; }}
  .child-link {{ fill: none; }}
  .label {{ font-family: {font}; font-size: {size}; font-weight: {weight}; text-anchor: middle; }}
</style>"#,
            font = opts.font_family,
            size = opts.font_size,
            weight = opts.font_weight
        )
        .unwrap();

        writeln!(
            &mut svg,
            r#"<rect width="100%" height="100%" rx="6" ry="6" stroke="{}" stroke-width="1" fill="{}"/>"#,
            opts.node_border_color, opts.background
        )
        .unwrap();

        // links first so symbols draw over them
        for route in routes {
            self.render_partner_link(&mut svg, opts, dataset, h, route);
        }
        self.render_child_links(&mut svg, opts, dataset, h);

        for &i in &h.flatten() {
            let node = &h.nodes[i];
            if node.hidden() && !opts.debug {
                continue;
            }
            match node.kind {
                NodeKind::Person { idx } => {
                    if let Some(p) = dataset.get(idx) {
                        self.render_person(&mut svg, opts, p, node.x, node.y);
                    }
                }
                _ if opts.debug => {
                    writeln!(
                        &mut svg,
                        r#"<circle cx="{}" cy="{}" r="{}" fill="pink"/>"#,
                        node.x,
                        node.y,
                        opts.symbol_size / 5.0
                    )
                    .unwrap();
                }
                _ => {}
            }
        }

        writeln!(&mut svg, "</svg>").unwrap();
        svg
    }

    fn render_partner_link(
        &self,
        svg: &mut String,
        opts: &Options,
        dataset: &[Person],
        h: &Hierarchy,
        route: &PartnerRoute,
    ) {
        let mother = &h.nodes[route.mother];
        let father = &h.nodes[route.father];
        let consanguineous = h.consanguineous(dataset, route.mother, route.father);
        let divorced = dataset
            .iter()
            .find(|p| p.name == mother.name)
            .is_some_and(|p| p.divorced.as_deref() == Some(father.name.as_str()));

        let mut classes = vec!["partner", "partner-link"];
        if consanguineous {
            classes.push("consanguineous");
        }
        if divorced {
            classes.push("divorced");
        }

        let mid = route
            .clash
            .as_ref()
            .map(|xs| {
                stepped_path(xs, route.dx, route.y, route.dy2, 0.0, opts.symbol_size, None).0
            })
            .unwrap_or_default();

        let mut d = format!(
            "M{},{}{}L{},{}",
            route.x1, route.y, mid, route.x2, route.y
        );
        if consanguineous {
            // double line between consanguineous partners
            let cshift = 3.0;
            let mid2 = route
                .clash
                .as_ref()
                .map(|xs| {
                    stepped_path(
                        xs,
                        route.dx,
                        route.y,
                        route.dy2,
                        cshift,
                        opts.symbol_size,
                        None,
                    )
                    .0
                })
                .unwrap_or_default();
            write!(
                &mut d,
                "M{},{}{}L{},{}",
                route.x1,
                route.y - cshift,
                mid2,
                route.x2,
                route.y - cshift
            )
            .unwrap();
        }

        // clashing links are visually flagged
        let (stroke, extra) = if route.clash.is_some() {
            (
                opts.clash_indicator_color.as_str(),
                r#" stroke-width="2.5" stroke-dasharray="5,5""#,
            )
        } else {
            (opts.link_color.as_str(), "")
        };

        writeln!(
            svg,
            r#"<path class="{}" fill="none" stroke="{}"{} d="{}"/>"#,
            classes.join(" "),
            stroke,
            extra,
            d
        )
        .unwrap();
    }

    fn render_child_links(
        &self,
        svg: &mut String,
        opts: &Options,
        dataset: &[Person],
        h: &Hierarchy,
    ) {
        for &i in &h.flatten() {
            let target = &h.nodes[i];
            let Some(parent) = target.parent else {
                continue;
            };
            let source = &h.nodes[parent];
            if !matches!(source.kind, NodeKind::Union { .. }) {
                continue;
            }
            let Some(pidx) = target.person_idx() else {
                continue;
            };
            let Some(person) = dataset.get(pidx) else {
                continue;
            };
            if (person.noparents || target.hidden()) && !opts.debug {
                continue;
            }

            let mut classes = vec!["link", "child-link"];
            if person.adopted_in {
                classes.push("adopted-link");
            }
            if person.mztwin.is_some() {
                classes.push("mz-twin-link");
            }
            if person.dztwin.is_some() {
                classes.push("dz-twin-link");
            }

            let d = self.child_link_path(opts, dataset, h, source, target, person);
            writeln!(
                svg,
                r#"<path class="{}" fill="none" stroke="{}" stroke-width="1" d="{}"/>"#,
                classes.join(" "),
                opts.link_color,
                d
            )
            .unwrap();
        }
    }

    /// Orthogonal drop from the union to the child; twins share a fork
    /// point midway between the group, monozygotic twins with a cross bar.
    fn child_link_path(
        &self,
        opts: &Options,
        dataset: &[Person],
        h: &Hierarchy,
        source: &crate::hierarchy::TreeNode,
        target: &crate::hierarchy::TreeNode,
        person: &Person,
    ) -> String {
        if person.twin_kind().is_some() {
            let twins = crate::dataset::twins_of(dataset, person);
            if !twins.is_empty() {
                let mut twinx = 0.0;
                let mut xmin = target.x;
                for t in &twins {
                    if let Some(tn) = h.node_by_name(&t.name) {
                        let tx = h.nodes[tn].x;
                        if tx < xmin {
                            xmin = tx;
                        }
                        twinx += tx;
                    }
                }
                let xmid = (target.x + twinx) / (twins.len() as f64 + 1.0);
                let ymid = (source.y + target.y) / 2.0;
                let mut xhbar = String::new();
                if xmin == target.x && person.mztwin.is_some() {
                    // horizontal bar marking monozygotic twins
                    let xx = (xmid + target.x) / 2.0;
                    let yy = (ymid + (target.y - opts.symbol_size / 2.0)) / 2.0;
                    xhbar = format!("M{},{}L{},{}", xx, yy, xmid + (xmid - xx), yy);
                }
                return format!(
                    "M{},{}V{}H{}L{},{}{}",
                    source.x,
                    source.y,
                    ymid,
                    xmid,
                    target.x,
                    target.y - opts.symbol_size / 2.0,
                    xhbar
                );
            }
        }

        // a couple joined across generations hangs the drop from midway
        // between the two parents' rows
        if let NodeKind::Union { mother, father } = &source.kind
            && let (Some(ma), Some(pa)) = (h.node_by_name(mother), h.node_by_name(father))
            && h.nodes[ma].depth != h.nodes[pa].depth
        {
            let ymid = (h.nodes[ma].y + h.nodes[pa].y) / 2.0;
            return format!("M{},{}H{}V{}", source.x, ymid, target.x, target.y);
        }

        format!(
            "M{},{}V{}H{}V{}",
            source.x,
            source.y,
            (source.y + target.y) / 2.0,
            target.x,
            target.y
        )
    }

    fn render_person(&self, svg: &mut String, opts: &Options, p: &Person, x: f64, y: f64) {
        let s = opts.symbol_size;
        let half = s / 2.0;

        let mut classes = vec!["node"];
        classes.push(match p.sex {
            Sex::M => "male",
            Sex::F => "female",
            Sex::U => "unknown-sex",
        });
        if p.proband {
            classes.push("proband");
        }
        if p.affected {
            classes.push("affected");
        }
        if p.adopted_in || p.adopted_out {
            classes.push("adopted");
        }
        if p.is_dead() {
            classes.push("deceased");
        }

        writeln!(
            svg,
            r#"<g class="{}" transform="translate({},{})">"#,
            classes.join(" "),
            x,
            y
        )
        .unwrap();

        let fill = self.symbol_fill(opts, p);
        let stroke = if p.age.is_some() && p.yob.is_some() && !p.exclude {
            &opts.node_border_color_with_data
        } else {
            &opts.node_border_color
        };
        let stroke_width = s * 0.05;
        let dash = if p.exclude {
            r#" stroke-dasharray="3,3""#
        } else {
            ""
        };

        if p.miscarriage || p.termination {
            writeln!(
                svg,
                r#"<polygon points="0,{} {},{} {},{}" fill="{}" stroke="{}" stroke-width="{}"{}/>"#,
                -half, half, half, -half, half, fill, stroke, stroke_width, dash
            )
            .unwrap();
        } else {
            match p.sex {
                Sex::F => writeln!(
                    svg,
                    r#"<circle r="{}" fill="{}" stroke="{}" stroke-width="{}"{}/>"#,
                    half, fill, stroke, stroke_width, dash
                )
                .unwrap(),
                Sex::M => writeln!(
                    svg,
                    r#"<rect x="{}" y="{}" width="{}" height="{}" fill="{}" stroke="{}" stroke-width="{}"{}/>"#,
                    -half, -half, s, s, fill, stroke, stroke_width, dash
                )
                .unwrap(),
                Sex::U => writeln!(
                    svg,
                    r#"<rect x="{}" y="{}" width="{}" height="{}" transform="rotate(45)" fill="{}" stroke="{}" stroke-width="{}"{}/>"#,
                    -half, -half, s, s, fill, stroke, stroke_width, dash
                )
                .unwrap(),
            }
        }

        if p.is_dead() {
            writeln!(
                svg,
                r#"<line stroke="{}" x1="{}" y1="{}" x2="{}" y2="{}"/>"#,
                opts.dead_line_color,
                -0.6 * s,
                0.6 * s,
                0.6 * s,
                -0.6 * s
            )
            .unwrap();
        }

        self.render_labels(svg, opts, p);
        writeln!(svg, "</g>").unwrap();
    }

    fn symbol_fill<'a>(&self, opts: &'a Options, p: &Person) -> &'a str {
        if p.exclude {
            return &opts.exclude_fill_color;
        }
        for disease in &opts.diseases {
            if prefix_in_person(&disease.kind, p) {
                return &disease.colour;
            }
        }
        if p.affected {
            return &opts.affected_fill_color;
        }
        &opts.node_background
    }

    fn render_labels(&self, svg: &mut String, opts: &Options, p: &Person) {
        let mut lines: Vec<String> = Vec::new();
        if let Some(name) = &p.display_name {
            lines.push(self.metrics.fit_label(name, opts.symbol_size * 3.0));
        }
        let mut details: Vec<String> = Vec::new();
        for key in &opts.labels {
            match key.as_str() {
                "age" => {
                    if let Some(age) = p.age {
                        details.push(format!("{age}y"));
                    }
                }
                "yob" => {
                    if let Some(yob) = p.yob {
                        details.push(format!("b. {yob}"));
                    }
                }
                "stillbirth" => {
                    if p.stillbirth {
                        details.push("SB".into());
                    }
                }
                other => {
                    if let Some(v) = p.clinical.get(other) {
                        details.push(format!("{other}: {v}"));
                    }
                }
            }
        }
        if !details.is_empty() {
            lines.push(details.join(" "));
        }

        let mut y = opts.symbol_size * 0.9;
        for line in lines {
            writeln!(svg, r#"<text class="label" x="0" y="{}">{}</text>"#, y, line).unwrap();
            y += self.metrics.line_height;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::build_hierarchy;
    use crate::layout::clash::route_partner_links;
    use crate::layout::{adjust::adjust_coords, pedigree_separation, tidy::layout_tree};

    fn render_default() -> String {
        let opts = Options::default();
        let dataset = crate::hierarchy::group_top_level(&opts.dataset);
        let mut h = build_hierarchy(&dataset).unwrap();
        layout_tree(&mut h, opts.width, opts.height, pedigree_separation);
        adjust_coords(&mut h, opts.symbol_size);
        let routes = route_partner_links(&mut h, opts.symbol_size);
        SvgRenderer::default().render(&opts, &dataset, &h, &routes)
    }

    #[test]
    fn test_render_default_trio() {
        let svg = render_default();
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>\n"));
        // one male square, one proband circle plus the mother's circle
        assert_eq!(svg.matches("<rect x=").count(), 1);
        assert_eq!(svg.matches("<circle r=").count(), 2);
        assert!(svg.contains("partner-link"));
        assert!(svg.contains("child-link"));
        assert!(svg.contains("proband"));
    }

    #[test]
    fn test_hidden_nodes_only_in_debug() {
        let svg = render_default();
        assert!(!svg.contains("pink"));
    }

    #[test]
    fn test_disease_fill() {
        let mut opts = Options::default();
        opts.dataset[2]
            .clinical
            .insert("breast_cancer_diagnosis_age".into(), serde_json::json!(41));
        let dataset = crate::hierarchy::group_top_level(&opts.dataset);
        let mut h = build_hierarchy(&dataset).unwrap();
        layout_tree(&mut h, opts.width, opts.height, pedigree_separation);
        let routes = route_partner_links(&mut h, opts.symbol_size);
        let svg = SvgRenderer::default().render(&opts, &dataset, &h, &routes);
        assert!(svg.contains("#F68F35"));
    }
}
