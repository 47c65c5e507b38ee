//! Post-layout coordinate adjustment.
//!
//! The tidy-tree walk knows nothing about couples, so a union node rarely
//! lands midway between its two parents and child links pick up kinks. Two
//! post-order passes rewrite x-coordinates to fix the cosmetics without
//! introducing overlaps. Two passes approximate a fixed point well enough
//! for clinical pedigrees; deeper nestings may keep a residual kink, which
//! is accepted behaviour.
//!
//! Collision testing uses a fixed threshold of `symbol_size * 1.15` in x at
//! equal depth rather than true geometric overlap. That calibration is part
//! of the observable layout contract; do not tighten it.

use tracing::debug;

use crate::hierarchy::{Hierarchy, NodeKind};

/// Overlap threshold factor relative to the symbol size.
const OVERLAP_FACTOR: f64 = 1.15;

/// Would placing something at `xnew` on `depth` collide with any node other
/// than the excluded ones? Hidden nodes count: they occupy layout space.
pub fn overlap(h: &Hierarchy, symbol_size: f64, xnew: f64, depth: usize, exclude: &[&str]) -> bool {
    h.flatten().into_iter().any(|n| {
        let node = &h.nodes[n];
        node.depth == depth
            && !exclude.contains(&node.name.as_str())
            && (xnew - node.x).abs() < symbol_size * OVERLAP_FACTOR
    })
}

fn descendants(h: &Hierarchy, node: usize) -> Vec<usize> {
    let mut out = vec![node];
    let mut i = 0;
    while i < out.len() {
        out.extend(h.nodes[out[i]].children.iter().copied());
        i += 1;
    }
    out
}

/// Would shifting every descendant of `node` left by `diff` collide at any
/// of their depths? The moving subtree is excluded from its own test.
fn subtree_overlaps(h: &Hierarchy, symbol_size: f64, node: usize, diff: f64) -> bool {
    let moving = descendants(h, node);
    let moving_names: Vec<&str> = moving.iter().map(|&d| h.nodes[d].name.as_str()).collect();
    for &d in &moving {
        if d == node {
            continue;
        }
        let xnew = h.nodes[d].x - diff;
        if overlap(h, symbol_size, xnew, h.nodes[d].depth, &moving_names) {
            return true;
        }
    }
    false
}

/// Centre union nodes between their parents and pull child positions into
/// line, in two post-order passes.
pub fn adjust_coords(h: &mut Hierarchy, symbol_size: f64) {
    let root = h.root;
    recurse(h, symbol_size, root);
    recurse(h, symbol_size, root);
}

fn recurse(h: &mut Hierarchy, symbol_size: f64, node: usize) {
    let children = h.nodes[node].children.clone();
    if children.is_empty() {
        return;
    }
    for &c in &children {
        recurse(h, symbol_size, c);
    }

    let NodeKind::Union { mother, father } = h.nodes[node].kind.clone() else {
        return;
    };
    let (Some(fa), Some(mo)) = (h.node_by_name(&father), h.node_by_name(&mother)) else {
        return;
    };

    let xmid = (h.nodes[fa].x + h.nodes[mo].x) / 2.0;
    let node_name = h.nodes[node].name.clone();
    let depth = h.nodes[node].depth;

    if !overlap(h, symbol_size, xmid, depth, &[&node_name]) {
        let diff = h.nodes[node].x - xmid;
        h.nodes[node].x = xmid;

        let hidden0 = h.nodes[children[0]].hidden();
        let hidden1 = children.len() > 1 && h.nodes[children[1]].hidden();
        if children.len() == 2 && (hidden0 || hidden1) {
            if !(hidden0 && hidden1) {
                // a visible child next to a nested union: snap the visible
                // one to the midpoint unless that crosses the union or
                // collides
                let (visible, nested) = if hidden0 {
                    (children[1], children[0])
                } else {
                    (children[0], children[1])
                };
                let (vx, nx) = (h.nodes[visible].x, h.nodes[nested].x);
                let crosses = !((vx < nx && xmid < nx) || (vx > nx && xmid > nx));
                let vis_name = h.nodes[visible].name.clone();
                if !crosses
                    && !overlap(h, symbol_size, xmid, h.nodes[visible].depth, &[&vis_name])
                {
                    h.nodes[visible].x = xmid;
                }
            }
        } else if children.len() == 1 && !h.nodes[children[0]].hidden() {
            let child = children[0];
            let child_name = h.nodes[child].name.clone();
            if !overlap(h, symbol_size, xmid, h.nodes[child].depth, &[&child_name]) {
                h.nodes[child].x = xmid;
            }
        } else if diff != 0.0 && !subtree_overlaps(h, symbol_size, node, diff) {
            if children.len() == 1 {
                h.nodes[children[0]].x = xmid;
            } else {
                let all = descendants(h, node);
                debug!(
                    union = %node_name,
                    descendants = all.len(),
                    diff,
                    "shifting subtree under union"
                );
                for d in all {
                    if d != node {
                        h.nodes[d].x -= diff;
                    }
                }
            }
        }
    } else {
        // correctness override: a union may never sit outside the span of
        // its own parents
        let nx = h.nodes[node].x;
        let (fx, mx) = (h.nodes[fa].x, h.nodes[mo].x);
        if (nx < fx && nx < mx) || (nx > fx && nx > mx) {
            h.nodes[node].x = xmid;
        }
    }
}
