//! Birth-death tree simulation in continuous time and in discrete generations.
//!
//! Provides three growth engines over [`PhyloTree`]:
//!
//! - [`simulate_continuous_birth_death`]: competing exponential clocks per
//!   lineage, optionally evolving rates, with stop-at-size, stop-at-time and
//!   General Sampling Approach (GSA) termination.
//! - [`simulate_discrete_birth_death`]: each lineage draws once per generation
//!   against its birth and death probabilities.
//! - [`simulate_pure_birth`]: a uniform-rate Yule process with one taxon per tip.
//!
//! The GSA follows Hartmann, Wong & Stadler (2010), "Sampling Trees from
//! Evolutionary Models", Syst. Biol. 59(4):465-476.

use log::{debug, trace};

use bdsim_core::{BdsimError, RandomSource, Result, Summarizable};

use crate::events::{draw_waiting_time, select_weighted, total_rate};
use crate::taxon::{randomly_assign_taxa, TaxonNamespace};
use crate::tree::{NodeId, PhyloTree, Rates};

/// Configuration for [`simulate_continuous_birth_death`].
///
/// At least one of `ntax`, a taxon namespace, or `max_time` must bound the
/// process. When several are given, growth stops at whichever is met first.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BirthDeathConfig {
    /// Per-lineage birth rate of the seed lineage.
    pub birth_rate: f64,
    /// Per-lineage death rate of the seed lineage.
    pub death_rate: f64,
    /// Std. dev. of the Gaussian change to the birth rate at each split.
    pub birth_rate_sd: f64,
    /// Std. dev. of the Gaussian change to the death rate at each split.
    pub death_rate_sd: f64,
    /// Grow until the tree has this many tips.
    pub ntax: Option<usize>,
    /// Grow for at most this much time.
    pub max_time: Option<f64>,
    /// Grow up to this many tips, then sample a moment at which the tree had
    /// exactly the target number of tips.
    pub gsa_ntax: Option<usize>,
    /// Restart from a single lineage on total extinction instead of failing.
    pub repeat_until_success: bool,
    /// Label the final tips with taxa.
    pub assign_taxa: bool,
    /// Create new taxa when the namespace has fewer taxa than tips.
    pub create_required_taxa: bool,
}

impl Default for BirthDeathConfig {
    fn default() -> Self {
        Self {
            birth_rate: 1.0,
            death_rate: 0.0,
            birth_rate_sd: 0.0,
            death_rate_sd: 0.0,
            ntax: None,
            max_time: None,
            gsa_ntax: None,
            repeat_until_success: true,
            assign_taxa: true,
            create_required_taxa: true,
        }
    }
}

/// Configuration for [`simulate_discrete_birth_death`].
///
/// Rates are per-generation probabilities.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiscreteBirthDeathConfig {
    /// Per-generation split probability of the seed lineage.
    pub birth_rate: f64,
    /// Per-generation death probability of the seed lineage.
    pub death_rate: f64,
    /// Std. dev. of the Gaussian change to the birth probability at each split.
    pub birth_rate_sd: f64,
    /// Std. dev. of the Gaussian change to the death probability at each split.
    pub death_rate_sd: f64,
    /// Grow until the tree has this many tips.
    pub ntax: Option<usize>,
    /// Grow for at most this many generations.
    pub max_generations: Option<usize>,
    /// On death of the last lineage, reset the generation count and carry on
    /// instead of failing.
    pub repeat_until_success: bool,
    /// Label the final tips with taxa.
    pub assign_taxa: bool,
    /// Create new taxa when the namespace has fewer taxa than tips.
    pub create_required_taxa: bool,
}

impl Default for DiscreteBirthDeathConfig {
    fn default() -> Self {
        Self {
            birth_rate: 0.5,
            death_rate: 0.0,
            birth_rate_sd: 0.0,
            death_rate_sd: 0.0,
            ntax: None,
            max_generations: None,
            repeat_until_success: false,
            assign_taxa: true,
            create_required_taxa: true,
        }
    }
}

fn check_rate(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(BdsimError::InvalidInput(format!(
            "{} must be finite and >= 0, got {}",
            name, value
        )));
    }
    Ok(())
}

fn check_target(target: Option<usize>) -> Result<()> {
    if target == Some(0) {
        return Err(BdsimError::InvalidInput(
            "target number of tips must be >= 1".into(),
        ));
    }
    Ok(())
}

/// Seed a fresh tree, or fill in missing rates on the tips of a given one.
fn prepare_tree(tree: Option<PhyloTree>, rates: Rates) -> PhyloTree {
    let mut tree = tree.unwrap_or_default();
    for leaf in tree.leaves() {
        if tree[leaf].rates.is_none() {
            tree[leaf].rates = Some(rates);
        }
    }
    tree
}

/// Split `node` into two zero-length children whose rates are the parent's
/// plus independent Gaussian noise, floored at zero.
fn split_lineage<R: RandomSource + ?Sized>(
    tree: &mut PhyloTree,
    node: NodeId,
    fallback: Rates,
    birth_rate_sd: f64,
    death_rate_sd: f64,
    rng: &mut R,
) -> Result<[NodeId; 2]> {
    let parent = tree[node].rates.unwrap_or(fallback);
    let mut children = [0; 2];
    for slot in children.iter_mut() {
        let child = tree.new_child(node)?;
        let birth = (parent.birth + rng.gauss(0.0, birth_rate_sd)).max(0.0);
        let death = (parent.death + rng.gauss(0.0, death_rate_sd)).max(0.0);
        tree[child].rates = Some(Rates::new(birth, death));
        *slot = child;
    }
    Ok(children)
}

fn assign_taxa<R: RandomSource + ?Sized>(
    tree: &mut PhyloTree,
    namespace: Option<&mut TaxonNamespace>,
    create_required_taxa: bool,
    rng: &mut R,
) -> Result<()> {
    match namespace {
        Some(ns) => randomly_assign_taxa(tree, ns, create_required_taxa, rng),
        None => {
            let mut ns = TaxonNamespace::new();
            randomly_assign_taxa(tree, &mut ns, create_required_taxa, rng)
        }
    }
}

// ── Continuous time ────────────────────────────────────────────────────────

/// How a continuous-time run decides to stop.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Termination {
    /// Only `max_time` bounds the run.
    Time,
    /// Stop the first time the tree reaches `target` tips.
    Size { target: usize },
    /// Grow to `stop_at` tips, then sample a slice spent at `target` tips.
    Gsa { target: usize, stop_at: usize },
}

impl Termination {
    fn from_config(config: &BirthDeathConfig, target: Option<usize>) -> Result<Self> {
        match (target, config.gsa_ntax) {
            (None, Some(_)) => Err(BdsimError::InvalidInput(
                "gsa_ntax requires ntax or a taxon namespace".into(),
            )),
            (None, None) if config.max_time.is_none() => Err(BdsimError::InvalidInput(
                "at least one of ntax, a taxon namespace, or max_time must be given".into(),
            )),
            (None, None) => Ok(Termination::Time),
            (Some(target), None) => Ok(Termination::Size { target }),
            (Some(target), Some(gsa)) if gsa <= target => Err(BdsimError::InvalidInput(format!(
                "gsa_ntax ({}) must be greater than the target number of tips ({})",
                gsa, target
            ))),
            (Some(target), Some(gsa)) => Ok(Termination::Gsa {
                target,
                stop_at: gsa,
            }),
        }
    }

    fn target(&self) -> Option<usize> {
        match *self {
            Termination::Time => None,
            Termination::Size { target } | Termination::Gsa { target, .. } => Some(target),
        }
    }
}

/// Time the tree spent at the target size, with each tip's edge length at
/// the start of that interval.
#[derive(Debug, Clone)]
struct TimeSlice {
    duration: f64,
    edges: Vec<(NodeId, f64)>,
}

/// Mutable state of one continuous-time run.
struct ContinuousRun<'a> {
    config: &'a BirthDeathConfig,
    termination: Termination,
    tree: PhyloTree,
    /// Live tips, in the order their rates enter the event vector.
    active: Vec<NodeId>,
    extinct_tips: Vec<NodeId>,
    slices: Vec<TimeSlice>,
    total_time: f64,
    initial_root_length: f64,
}

impl<'a> ContinuousRun<'a> {
    fn new(config: &'a BirthDeathConfig, termination: Termination, tree: Option<PhyloTree>) -> Self {
        let tree = prepare_tree(tree, Self::process_rates(config));
        let active = tree.leaves();
        let initial_root_length = tree[tree.root()].edge_length;
        Self {
            config,
            termination,
            tree,
            active,
            extinct_tips: Vec::new(),
            slices: Vec::new(),
            total_time: 0.0,
            initial_root_length,
        }
    }

    fn process_rates(config: &BirthDeathConfig) -> Rates {
        Rates::new(config.birth_rate, config.death_rate)
    }

    fn should_stop(&self) -> bool {
        match self.termination {
            Termination::Time => self
                .config
                .max_time
                .map_or(false, |max_time| self.total_time >= max_time),
            Termination::Size { target } => self.active.len() > target,
            Termination::Gsa { stop_at, .. } => self.active.len() >= stop_at,
        }
    }

    /// `[b0, d0, b1, d1, ...]` over the active tips.
    fn event_rates(&self) -> Vec<f64> {
        let fallback = Self::process_rates(self.config);
        let mut rates = Vec::with_capacity(2 * self.active.len());
        for &leaf in &self.active {
            let r = self.tree[leaf].rates.unwrap_or(fallback);
            rates.push(r.birth);
            rates.push(r.death);
        }
        rates
    }

    fn extend_active(&mut self, dt: f64) {
        for &leaf in &self.active {
            self.tree[leaf].edge_length += dt;
        }
        self.total_time += dt;
    }

    /// Discard everything below the root after total extinction.
    fn restart(&mut self) -> Result<()> {
        let root = self.tree.root();
        let children = self.tree[root].children.clone();
        for child in children {
            self.tree.prune_subtree(child, false)?;
        }
        self.tree[root].edge_length = self.initial_root_length;
        self.active = vec![root];
        self.extinct_tips.clear();
        self.total_time = 0.0;
        Ok(())
    }

    fn grow<R: RandomSource + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        while !self.should_stop() {
            let rates = self.event_rates();
            if rates.iter().all(|&r| r == 0.0) {
                // Nothing can happen any more: only a time bound can end the run.
                let Some(max_time) = self.config.max_time else {
                    return Err(BdsimError::InvalidInput(
                        "all lineages have zero birth and death rates".into(),
                    ));
                };
                self.extend_active(max_time - self.total_time);
                break;
            }
            let total = total_rate(&rates)?;
            let waiting_time = draw_waiting_time(total, rng);
            let remaining = self
                .config
                .max_time
                .map_or(f64::INFINITY, |max_time| max_time - self.total_time);
            let step = waiting_time.min(remaining);

            if self.termination.target() == Some(self.active.len()) {
                let edges = self
                    .active
                    .iter()
                    .map(|&leaf| (leaf, self.tree[leaf].edge_length))
                    .collect();
                self.slices.push(TimeSlice {
                    duration: step,
                    edges,
                });
                trace!("recorded time slice {} ({:.6})", self.slices.len(), step);
                if matches!(self.termination, Termination::Size { .. }) {
                    break;
                }
            }

            self.extend_active(step);
            if waiting_time > remaining {
                trace!("next event falls after max_time; stopping");
                break;
            }

            let index = select_weighted(&rates, total, rng);
            let leaf = self.active.remove(index / 2);
            if index % 2 == 0 {
                let children = split_lineage(
                    &mut self.tree,
                    leaf,
                    Self::process_rates(self.config),
                    self.config.birth_rate_sd,
                    self.config.death_rate_sd,
                    rng,
                )?;
                self.active.extend(children);
                trace!("t={:.6}: birth at node {}", self.total_time, leaf);
            } else if !self.active.is_empty() {
                self.extinct_tips.push(leaf);
                trace!("t={:.6}: death at node {}", self.total_time, leaf);
            } else if !self.slices.is_empty() {
                debug!("total extinction after reaching the target size; sampling recorded slices");
                break;
            } else if self.config.repeat_until_success {
                debug!("total extinction at t={:.6}; restarting", self.total_time);
                self.restart()?;
            } else {
                return Err(BdsimError::TotalExtinction);
            }
        }
        Ok(())
    }

    /// Roll the tree back to a moment at which it had the target size.
    fn apply_time_slice<R: RandomSource + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        if self.slices.is_empty() {
            return Ok(());
        }
        let chosen = match self.termination {
            Termination::Gsa { .. } => self.choose_slice(rng),
            _ => self.slices.len() - 1,
        };
        // Tips grow through the whole slice, up to the event that ended it.
        let offset = self.slices[chosen].duration;
        debug!(
            "using time slice {} of {} (offset {:.6})",
            chosen + 1,
            self.slices.len(),
            offset
        );
        let edges = std::mem::take(&mut self.slices[chosen].edges);
        for (node, length) in edges {
            let children = self.tree[node].children.clone();
            for child in children {
                self.tree.prune_subtree(child, false)?;
            }
            let tree = &self.tree;
            self.extinct_tips
                .retain(|&tip| tip != node && tree.contains(tip));
            self.tree[node].edge_length = length + offset;
        }
        Ok(())
    }

    /// Pick a slice with probability proportional to its duration.
    fn choose_slice<R: RandomSource + ?Sized>(&self, rng: &mut R) -> usize {
        let total: f64 = self.slices.iter().map(|s| s.duration).sum();
        let mut r = rng.random() * total;
        for (i, slice) in self.slices.iter().enumerate() {
            if r < slice.duration {
                return i;
            }
            r -= slice.duration;
        }
        self.slices.len() - 1
    }

    /// Remove dead lineages and the unifurcations they leave behind.
    fn prune_extinct(&mut self) -> Result<()> {
        for tip in std::mem::take(&mut self.extinct_tips) {
            if !self.tree.contains(tip) {
                continue;
            }
            let mut node = tip;
            while let Some(parent) = self.tree[node].parent {
                if self.tree[parent].children.len() != 1 {
                    break;
                }
                node = parent;
            }
            if self.tree[node].parent.is_some() {
                self.tree.prune_subtree(node, false)?;
            }
        }
        self.tree.suppress_unifurcations();
        Ok(())
    }
}

/// Simulate a birth-death tree with edge lengths in continuous time.
///
/// Each live lineage carries its own birth and death rate; waiting times are
/// exponential in the summed rate of all lineages. Daughter lineages inherit
/// the parent's rates plus Gaussian noise with `birth_rate_sd` /
/// `death_rate_sd` (zero keeps rates constant).
///
/// Growth starts from `tree` if given (tips without rates take the process
/// rates), otherwise from a single root lineage. The target size is
/// `config.ntax`, or the size of `namespace`. When `config.gsa_ntax` is set
/// the tree is grown to that size (or to extinction) and then cut back to a
/// moment, sampled proportionally to time, at which it had the target size.
///
/// Extinct lineages are removed and unifurcations suppressed before the tree
/// is returned. With `assign_taxa`, tips receive random taxa from `namespace`
/// (new taxa are created as needed if `create_required_taxa`).
///
/// # Errors
///
/// - [`BdsimError::InvalidInput`] for missing or contradictory termination
///   settings, invalid rates, or when both `tree` and `namespace` are given.
/// - [`BdsimError::TotalExtinction`] if every lineage dies and
///   `repeat_until_success` is false.
///
/// # Examples
///
/// ```
/// use bdsim_phylo::birth_death::{simulate_continuous_birth_death, BirthDeathConfig};
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
///
/// let config = BirthDeathConfig {
///     birth_rate: 1.0,
///     death_rate: 0.2,
///     ntax: Some(12),
///     ..Default::default()
/// };
/// let mut rng = StdRng::seed_from_u64(42);
/// let tree = simulate_continuous_birth_death(&config, None, None, &mut rng).unwrap();
/// assert_eq!(tree.leaf_count(), 12);
/// ```
pub fn simulate_continuous_birth_death<R: RandomSource + ?Sized>(
    config: &BirthDeathConfig,
    tree: Option<PhyloTree>,
    mut namespace: Option<&mut TaxonNamespace>,
    rng: &mut R,
) -> Result<PhyloTree> {
    check_rate("birth_rate", config.birth_rate)?;
    check_rate("death_rate", config.death_rate)?;
    check_rate("birth_rate_sd", config.birth_rate_sd)?;
    check_rate("death_rate_sd", config.death_rate_sd)?;
    if let Some(max_time) = config.max_time {
        check_rate("max_time", max_time)?;
    }
    if tree.is_some() && namespace.is_some() {
        return Err(BdsimError::InvalidInput(
            "cannot specify both a starting tree and a taxon namespace".into(),
        ));
    }
    let target = config.ntax.or(namespace.as_deref().map(TaxonNamespace::len));
    check_target(target)?;
    let termination = Termination::from_config(config, target)?;

    let mut run = ContinuousRun::new(config, termination, tree);
    run.grow(rng)?;
    run.apply_time_slice(rng)?;
    run.prune_extinct()?;

    let mut tree = run.tree.compact();
    if config.assign_taxa {
        assign_taxa(
            &mut tree,
            namespace.as_deref_mut(),
            config.create_required_taxa,
            rng,
        )?;
    }
    debug!(
        "continuous birth-death finished at t={:.6}: {}",
        run.total_time,
        tree.summary()
    );
    Ok(tree)
}

// ── Discrete generations ───────────────────────────────────────────────────

/// Simulate a birth-death tree with edge lengths in whole generations.
///
/// Every generation, each tip present at its start gains one unit of edge
/// length and draws `u ~ U(0, 1)`: `u < birth` splits it, `u < birth + death`
/// kills it (the tip is pruned and the unifurcation suppressed). Growth stops
/// once the tree has `ntax` tips (or as many as `namespace` holds) or after
/// `max_generations`; once the target size is reached mid-generation the
/// remaining tips only age. Afterwards all tips are extended by the number of
/// generations until the next event would have fired.
///
/// If the last lineage (the root) dies, the run fails with
/// [`BdsimError::TotalExtinction`], or with `repeat_until_success` the
/// generation count is reset and growth continues from the surviving root.
///
/// # Errors
///
/// Returns an error if no termination condition is given, rates are invalid,
/// both `tree` and `namespace` are given, or on total extinction without retry.
pub fn simulate_discrete_birth_death<R: RandomSource + ?Sized>(
    config: &DiscreteBirthDeathConfig,
    tree: Option<PhyloTree>,
    mut namespace: Option<&mut TaxonNamespace>,
    rng: &mut R,
) -> Result<PhyloTree> {
    check_rate("birth_rate", config.birth_rate)?;
    check_rate("death_rate", config.death_rate)?;
    check_rate("birth_rate_sd", config.birth_rate_sd)?;
    check_rate("death_rate_sd", config.death_rate_sd)?;
    if config.ntax.is_none() && namespace.is_none() && config.max_generations.is_none() {
        return Err(BdsimError::InvalidInput(
            "at least one of ntax, a taxon namespace, or max_generations must be given".into(),
        ));
    }
    if tree.is_some() && namespace.is_some() {
        return Err(BdsimError::InvalidInput(
            "cannot specify both a starting tree and a taxon namespace".into(),
        ));
    }
    let target = config.ntax.or(namespace.as_deref().map(TaxonNamespace::len));
    check_target(target)?;
    let max_generations = config.max_generations;
    let process_rates = Rates::new(config.birth_rate, config.death_rate);

    let mut tree = prepare_tree(tree, process_rates);
    let mut leaves = tree.leaves();
    let mut n_tips = leaves.len();
    let mut generation = 0usize;
    let below_target = |n: usize| target.map_or(true, |t| n < t);

    while below_target(n_tips) && max_generations.map_or(true, |g| generation < g) {
        for &leaf in &leaves {
            tree[leaf].edge_length += 1.0;
            if !below_target(n_tips) {
                continue;
            }
            let rates = tree[leaf].rates.unwrap_or(process_rates);
            let u = rng.uniform(0.0, 1.0);
            if u < rates.birth {
                split_lineage(
                    &mut tree,
                    leaf,
                    process_rates,
                    config.birth_rate_sd,
                    config.death_rate_sd,
                    rng,
                )?;
                n_tips += 1;
            } else if u < rates.birth + rates.death {
                if leaf != tree.root() {
                    tree.prune_subtree(leaf, true)?;
                    n_tips -= 1;
                } else if config.repeat_until_success {
                    debug!("last lineage died in generation {}; resetting", generation);
                    generation = 0;
                } else {
                    return Err(BdsimError::TotalExtinction);
                }
            }
        }
        generation += 1;
        leaves = tree.leaves();
        n_tips = leaves.len();
        trace!("generation {}: {} tips", generation, n_tips);
    }

    // Age the final tips until the next generation in which an event would fire.
    let p_event = config.birth_rate + config.death_rate;
    let mut extra = 0usize;
    if p_event > 0.0 || max_generations.is_some() {
        while max_generations.map_or(true, |g| generation + extra < g) {
            if rng.uniform(0.0, 1.0) < p_event {
                break;
            }
            extra += 1;
        }
    }
    for &leaf in &leaves {
        tree[leaf].edge_length += extra as f64;
    }

    let mut tree = tree.compact();
    if config.assign_taxa {
        assign_taxa(
            &mut tree,
            namespace.as_deref_mut(),
            config.create_required_taxa,
            rng,
        )?;
    }
    debug!(
        "discrete birth-death finished after {} generations: {}",
        generation + extra,
        tree.summary()
    );
    Ok(tree)
}

// ── Pure birth ─────────────────────────────────────────────────────────────

/// Simulate a uniform-rate pure-birth (Yule) tree with one tip per taxon.
///
/// With `k` tips the waiting time to the next split is exponential with rate
/// `k / birth_rate`; the splitting tip is chosen uniformly. After the last
/// split every tip is extended by one more waiting time, and taxon `i` of
/// `namespace` is assigned to the `i`-th tip in preorder.
///
/// # Errors
///
/// Returns an error if `namespace` is empty or `birth_rate` is not positive.
///
/// # Examples
///
/// ```
/// use bdsim_phylo::birth_death::simulate_pure_birth;
/// use bdsim_phylo::taxon::TaxonNamespace;
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
///
/// let ns = TaxonNamespace::with_generated(8);
/// let mut rng = StdRng::seed_from_u64(1);
/// let tree = simulate_pure_birth(&ns, 1.0, &mut rng).unwrap();
/// assert_eq!(tree.leaf_count(), 8);
/// assert_eq!(tree.leaf_names().len(), 8);
/// ```
pub fn simulate_pure_birth<R: RandomSource + ?Sized>(
    namespace: &TaxonNamespace,
    birth_rate: f64,
    rng: &mut R,
) -> Result<PhyloTree> {
    if namespace.is_empty() {
        return Err(BdsimError::InvalidInput(
            "taxon namespace must not be empty".into(),
        ));
    }
    if !birth_rate.is_finite() || birth_rate <= 0.0 {
        return Err(BdsimError::InvalidInput(format!(
            "birth_rate must be finite and > 0, got {}",
            birth_rate
        )));
    }

    let mut tree = PhyloTree::new();
    let mut leaves = vec![tree.root()];
    while leaves.len() < namespace.len() {
        let waiting_time = rng.expovariate(leaves.len() as f64 / birth_rate);
        for &leaf in &leaves {
            tree[leaf].edge_length += waiting_time;
        }
        let idx = rng.choice_index(leaves.len());
        let parent = leaves[idx];
        let c1 = tree.new_child(parent)?;
        let c2 = tree.new_child(parent)?;
        leaves[idx] = c1;
        leaves.insert(idx + 1, c2);
    }
    let waiting_time = rng.expovariate(leaves.len() as f64 / birth_rate);
    for &leaf in &leaves {
        tree[leaf].edge_length += waiting_time;
    }

    let mut tree = tree.compact();
    for (idx, leaf) in tree.leaves().into_iter().enumerate() {
        tree[leaf].name = namespace.get(idx).map(str::to_string);
    }
    debug!("pure-birth tree finished: {}", tree.summary());
    Ok(tree)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn continuous_tip_count_matches_target(
            ntax in 2usize..20,
            extra in 0usize..6,
            birth in 0.5f64..2.0,
            death_frac in 0.0f64..0.8,
            seed in any::<u64>(),
        ) {
            let config = BirthDeathConfig {
                birth_rate: birth,
                death_rate: birth * death_frac,
                ntax: Some(ntax),
                gsa_ntax: if extra == 0 { None } else { Some(ntax + extra) },
                ..Default::default()
            };
            let mut rng = StdRng::seed_from_u64(seed);
            let tree = simulate_continuous_birth_death(&config, None, None, &mut rng).unwrap();
            prop_assert_eq!(tree.leaf_count(), ntax);
            for id in tree.iter_preorder() {
                prop_assert!(tree[id].edge_length >= 0.0);
            }
            prop_assert!(tree[tree.root()].is_root());
        }

        #[test]
        fn discrete_tip_count_matches_target(
            ntax in 2usize..15,
            birth in 0.1f64..0.6,
            death_frac in 0.0f64..0.5,
            seed in any::<u64>(),
        ) {
            let config = DiscreteBirthDeathConfig {
                birth_rate: birth,
                death_rate: birth * death_frac,
                ntax: Some(ntax),
                repeat_until_success: true,
                ..Default::default()
            };
            let mut rng = StdRng::seed_from_u64(seed);
            let tree = simulate_discrete_birth_death(&config, None, None, &mut rng).unwrap();
            prop_assert_eq!(tree.leaf_count(), ntax);
            for id in tree.iter_preorder() {
                prop_assert!(tree[id].edge_length >= 0.0);
            }
        }

        #[test]
        fn pure_birth_taxa_are_distinct(n in 1usize..40, seed in any::<u64>()) {
            let ns = TaxonNamespace::with_generated(n);
            let mut rng = StdRng::seed_from_u64(seed);
            let tree = simulate_pure_birth(&ns, 1.0, &mut rng).unwrap();
            prop_assert_eq!(tree.leaf_count(), n);
            let mut names = tree.leaf_names();
            names.dedup();
            prop_assert_eq!(names.len(), n);
        }
    }
}
