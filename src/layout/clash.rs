//! Partner-link clash detection and stepped rerouting.
//!
//! A partner link is the horizontal line joining two co-parents. When
//! another symbol at the same generation sits strictly between the
//! partners, the straight line would cut through it: the link is instead
//! routed as a stepped detour over the intruders, and the couple's union
//! node is lifted to the detour height so the child link does not re-cross.

use tracing::debug;

use crate::hierarchy::{Hierarchy, NodeKind};

/// A detected crossing: the partner pair plus the x-coordinates of the
/// intervening symbols, sorted ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct Clash {
    pub mother: String,
    pub father: String,
    pub xs: Vec<f64>,
}

/// The routing result for one partner link, ready for the renderer.
#[derive(Debug, Clone)]
pub struct PartnerRoute {
    /// Hierarchy node indices.
    pub mother: usize,
    pub father: usize,
    /// Left and right ends of the link.
    pub x1: f64,
    pub x2: f64,
    /// Height the link is drawn at (lifted when clashing).
    pub y: f64,
    /// Sorted intruder x-coordinates, when the link clashes.
    pub clash: Option<Vec<f64>>,
    /// Horizontal clearance either side of a detour.
    pub dx: f64,
    /// Top of the detour.
    pub dy2: f64,
}

/// The x-coordinates of visible nodes lying strictly between two partners
/// at their shared height, or `None` when the straight line is clear.
pub fn check_clash(h: &Hierarchy, mother: usize, father: usize) -> Option<Vec<f64>> {
    let (mn, fn_) = (&h.nodes[mother], &h.nodes[father]);
    let x1 = mn.x.min(fn_.x);
    let x2 = mn.x.max(fn_.x);
    let dy = mn.y;

    let mut xs: Vec<f64> = h
        .flatten()
        .into_iter()
        .filter_map(|i| {
            let node = &h.nodes[i];
            (!node.hidden()
                && node.name != mn.name
                && node.name != fn_.name
                && (node.y - dy).abs() < f64::EPSILON
                && node.x > x1
                && node.x < x2)
                .then_some(node.x)
        })
        .collect();
    if xs.is_empty() {
        return None;
    }
    xs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    Some(xs)
}

/// Every clashing partner link, for downstream visual flagging.
pub fn detect_clashes(h: &Hierarchy) -> Vec<Clash> {
    let mut clashes = Vec::new();
    for (mother, father) in h.partner_links() {
        if let Some(xs) = check_clash(h, mother, father) {
            debug!(
                mother = %h.nodes[mother].name,
                father = %h.nodes[father].name,
                ?xs,
                "partner link clash"
            );
            clashes.push(Clash {
                mother: h.nodes[mother].name.clone(),
                father: h.nodes[father].name.clone(),
                xs,
            });
        }
    }
    clashes
}

/// End of the contiguous run of intruders starting at `from`: neighbours
/// closer than `symbol_size * 1.25` merge into one detour.
fn run_end(clash: &[f64], from: usize, symbol_size: f64) -> usize {
    let mut i = from;
    while i + 1 < clash.len() && (clash[i] - clash[i + 1]).abs() < symbol_size * 1.25 {
        i += 1;
    }
    i
}

/// The mid-section of a stepped link path: up, across and back down around
/// each contiguous run of intruders. Returns the path fragment and whether
/// `union_x` falls inside any detour span (the union then needs lifting to
/// the detour top).
pub fn stepped_path(
    clash: &[f64],
    dx: f64,
    dy1: f64,
    dy2: f64,
    cshift: f64,
    symbol_size: f64,
    union_x: Option<f64>,
) -> (String, bool) {
    let mut path = String::new();
    let mut union_inside = false;
    let mut j = 0;
    while j < clash.len() {
        let k = run_end(clash, j, symbol_size);
        let dx1 = clash[j] - dx - cshift;
        let dx2 = clash[k] + dx + cshift;
        if let Some(ux) = union_x
            && ux > dx1
            && ux < dx2
        {
            union_inside = true;
        }
        path.push_str(&format!(
            "L{},{}L{},{}L{},{}L{},{}",
            dx1,
            dy1 - cshift,
            dx1,
            dy2 - cshift,
            dx2,
            dy2 - cshift,
            dx2,
            dy1 - cshift
        ));
        j = k + 1;
    }
    (path, union_inside)
}

/// Route every partner link. Clashing links are lifted by an accumulating
/// per-depth offset so repeated clashes at one generation stack cleanly,
/// and the union node directly above each rerouted couple is pulled up
/// clear of the detour.
pub fn route_partner_links(h: &mut Hierarchy, symbol_size: f64) -> Vec<PartnerRoute> {
    let mut clash_depth: std::collections::HashMap<usize, f64> = std::collections::HashMap::new();
    let links = h.partner_links();
    let mut routes = Vec::with_capacity(links.len());

    for (mother, father) in links {
        let (mx, fx) = (h.nodes[mother].x, h.nodes[father].x);
        let x1 = mx.min(fx);
        let x2 = mx.max(fx);
        let mut y = h.nodes[mother].y;
        let mut dx = 0.0;
        let mut dy2 = y;

        let clash = check_clash(h, mother, father);
        if let Some(xs) = &clash {
            let depth = h.nodes[mother].depth;
            let offset = clash_depth.entry(depth).or_insert(0.0);
            *offset += 4.0;
            y -= *offset;
            dx = *offset + symbol_size / 2.0 + 2.0;
            dy2 = y - symbol_size / 2.0 - 3.0;

            // the union node for this exact couple follows the detour
            let union = h.nodes[mother].unions.iter().copied().find(|&u| {
                matches!(
                    &h.nodes[u].kind,
                    NodeKind::Union { mother: m, father: f }
                        if *m == h.nodes[mother].name && *f == h.nodes[father].name
                )
            });
            if let Some(u) = union {
                h.nodes[u].y = y;
                let (_, inside) =
                    stepped_path(xs, dx, y, dy2, 0.0, symbol_size, Some(h.nodes[u].x));
                if inside {
                    h.nodes[u].y = dy2;
                }
            }
        }

        routes.push(PartnerRoute {
            mother,
            father,
            x1,
            x2,
            y,
            clash,
            dx,
            dy2,
        });
    }
    routes
}
