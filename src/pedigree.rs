//! Build and rebuild entrypoints.
//!
//! `PedigreeContext` replaces the original's process-wide registry of built
//! trees: the caller owns it and threads it into later edits, so there is
//! no ambient global state. The whole pipeline runs synchronously inside
//! one build call; a build requested while another is in flight is dropped,
//! not queued, which keeps rapid duplicate triggers from stacking edits.

use std::cell::Cell;

use tracing::{debug, error};

use crate::cache::HistoryCache;
use crate::hierarchy::{build_hierarchy, group_top_level, BuildError, Hierarchy};
use crate::layout::adjust::adjust_coords;
use crate::layout::clash::{detect_clashes, route_partner_links, Clash, PartnerRoute};
use crate::layout::dimensions::tree_dimensions;
use crate::layout::pedigree_separation;
use crate::layout::tidy::layout_tree;
use crate::options::Options;
use crate::person::Person;
use crate::svg::SvgRenderer;
use crate::validation::validate_pedigree;

/// Everything one build pass produced. Replaced wholesale on the next
/// successful build; a failed build leaves the previous artifacts alone.
#[derive(Debug)]
pub struct BuildArtifacts {
    /// The dataset in normalized (top-level-grouped) order.
    pub dataset: Vec<Person>,
    pub hierarchy: Hierarchy,
    pub clashes: Vec<Clash>,
    pub routes: Vec<PartnerRoute>,
    pub svg: String,
}

/// Owner of the render state for one pedigree container.
#[derive(Debug, Default)]
pub struct PedigreeContext {
    pub cache: HistoryCache,
    artifacts: Option<BuildArtifacts>,
    building: Cell<bool>,
}

impl PedigreeContext {
    pub fn new() -> PedigreeContext {
        PedigreeContext::default()
    }

    pub fn artifacts(&self) -> Option<&BuildArtifacts> {
        self.artifacts.as_ref()
    }

    pub fn svg(&self) -> Option<&str> {
        self.artifacts.as_ref().map(|a| a.svg.as_str())
    }
}

/// Outcome of a build request.
#[derive(Debug)]
pub enum BuildOutcome {
    /// The pipeline ran; the normalized options are returned for chaining.
    Built(Options),
    /// Dropped: a build was already in progress.
    Skipped(Options),
}

impl BuildOutcome {
    /// The options, whether or not the pipeline ran.
    pub fn into_options(self) -> Options {
        match self {
            BuildOutcome::Built(o) | BuildOutcome::Skipped(o) => o,
        }
    }
}

struct BuildGuard<'a>(&'a Cell<bool>);

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Run the full pipeline: validate, normalize the top generation, build the
/// hierarchy, lay it out, adjust, detect clashes, render. Returns the
/// normalized options actually used.
pub fn build(ctx: &mut PedigreeContext, mut opts: Options) -> Result<BuildOutcome, BuildError> {
    if ctx.building.get() {
        debug!("build ignored: build already in progress");
        return Ok(BuildOutcome::Skipped(opts));
    }
    ctx.building.set(true);
    let _guard = BuildGuard(&ctx.building);

    if ctx.cache.nstore() == 0 {
        ctx.cache.init(opts.dataset.clone());
    }

    validate_pedigree(opts.validate, &opts.dataset)?;

    let dataset = group_top_level(&opts.dataset);
    opts.dataset = dataset.clone();

    let mut hierarchy = build_hierarchy(&dataset)?;

    let dims = tree_dimensions(&dataset, opts.width, opts.height, opts.symbol_size);
    debug!(width = dims.width, height = dims.height, "tree dimensions");
    layout_tree(&mut hierarchy, dims.width, dims.height, pedigree_separation);
    adjust_coords(&mut hierarchy, opts.symbol_size);

    let clashes = detect_clashes(&hierarchy);
    let routes = route_partner_links(&mut hierarchy, opts.symbol_size);

    let svg = SvgRenderer::default().render(&opts, &dataset, &hierarchy, &routes);

    ctx.artifacts = Some(BuildArtifacts {
        dataset,
        hierarchy,
        clashes,
        routes,
        svg,
    });
    Ok(BuildOutcome::Built(opts))
}

/// Clear prior render state and build again. On failure the error is logged
/// and propagated; the previous artifacts are already gone, so no partial
/// state survives a failed consistency check.
pub fn rebuild(ctx: &mut PedigreeContext, opts: Options) -> Result<BuildOutcome, BuildError> {
    if ctx.building.get() {
        debug!("rebuild ignored: build already in progress");
        return Ok(BuildOutcome::Skipped(opts));
    }
    ctx.artifacts = None;
    build(ctx, opts).inspect_err(|e| error!(error = %e, "rebuild failed"))
}

/// The mutators' commit path: push an edited dataset into the history and
/// trigger the single rebuild the change-event contract calls for.
pub fn commit_and_rebuild(
    ctx: &mut PedigreeContext,
    mut opts: Options,
    dataset: Vec<Person>,
) -> Result<BuildOutcome, BuildError> {
    ctx.cache.push(dataset.clone());
    opts.dataset = dataset;
    rebuild(ctx, opts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::{add_partner, PartnerConfig};
    use crate::person::{Person, Sex};

    #[test]
    fn test_build_default_options() {
        let mut ctx = PedigreeContext::new();
        let outcome = build(&mut ctx, Options::default()).unwrap();
        let BuildOutcome::Built(opts) = outcome else {
            panic!("expected a build");
        };
        assert_eq!(opts.dataset.len(), 3);
        assert!(ctx.svg().is_some());
        let artifacts = ctx.artifacts().unwrap();
        assert_eq!(artifacts.hierarchy.visible_count(), 3);
        assert_eq!(artifacts.clashes.len(), 0);
        assert_eq!(ctx.cache.nstore(), 1);
    }

    #[test]
    fn test_build_failure_propagates_and_keeps_no_artifacts() {
        let mut ctx = PedigreeContext::new();
        let mut opts = Options::default();
        // orphan: mother reference points nowhere
        opts.dataset.push({
            let mut p = Person::new("orphan", Sex::F);
            p.mother = Some("nobody".into());
            p.father = Some("m21".into());
            p
        });
        assert!(rebuild(&mut ctx, opts).is_err());
        assert!(ctx.artifacts().is_none());
    }

    #[test]
    fn test_reentrant_build_is_dropped() {
        let mut ctx = PedigreeContext::new();
        ctx.building.set(true);
        let outcome = build(&mut ctx, Options::default()).unwrap();
        assert!(matches!(outcome, BuildOutcome::Skipped(_)));
        assert!(ctx.artifacts().is_none());
        ctx.building.set(false);
        let outcome = build(&mut ctx, Options::default()).unwrap();
        assert!(matches!(outcome, BuildOutcome::Built(_)));
    }

    #[test]
    fn test_edit_then_commit_flow() {
        let mut ctx = PedigreeContext::new();
        let opts = build(&mut ctx, Options::default()).unwrap().into_options();

        // the mutator works on a copy of the committed dataset
        let mut copy = crate::dataset::copy_dataset(ctx.cache.current().unwrap());
        add_partner(
            Some(&ctx.artifacts().unwrap().hierarchy),
            &mut copy,
            "ch1",
            &PartnerConfig::default(),
        )
        .unwrap();
        assert_eq!(ctx.cache.current().unwrap().len(), 3, "live dataset untouched");

        let outcome = commit_and_rebuild(&mut ctx, opts, copy).unwrap();
        let BuildOutcome::Built(opts) = outcome else {
            panic!("expected rebuild");
        };
        assert_eq!(opts.dataset.len(), 5);
        assert_eq!(ctx.cache.nstore(), 2);
        assert_eq!(ctx.artifacts().unwrap().hierarchy.visible_count(), 5);
    }

    #[test]
    fn test_undo_navigates_history() {
        let mut ctx = PedigreeContext::new();
        let opts = build(&mut ctx, Options::default()).unwrap().into_options();
        let mut copy = crate::dataset::copy_dataset(ctx.cache.current().unwrap());
        crate::edit::add_child(&mut copy, "ch1", Sex::M, 1, None).unwrap();
        commit_and_rebuild(&mut ctx, opts, copy).unwrap();
        assert_eq!(ctx.cache.current().unwrap().len(), 5);
        let previous = ctx.cache.previous().unwrap();
        assert_eq!(previous.len(), 3);
    }
}
