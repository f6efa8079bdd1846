//! Protracted Speciation Model (PSM).
//!
//! Speciation takes time: a split first creates an *incipient* species, which
//! may later complete speciation (become a *full* species), branch again, or
//! go extinct. Five competing event types drive the process:
//!
//! | index | event                  | rate                                   |
//! |-------|------------------------|----------------------------------------|
//! | 0     | full species birth     | `full_species_birth_rate * n_full`     |
//! | 1     | full species death     | `full_species_extinction_rate * n_full`|
//! | 2     | incipient birth        | `incipient_species_birth_rate * n_inc` |
//! | 3     | incipient completion   | `incipient_species_conversion_rate * n_inc` |
//! | 4     | incipient death        | `incipient_species_extinction_rate * n_inc` |
//!
//! A sample holds the full lineage tree and a derived tree of the surviving
//! full species only. See Rosindell, Cornell, Hubbell & Etienne (2010),
//! "Protracted speciation revitalizes the neutral theory of biodiversity",
//! Ecol. Lett. 13:716-727.

use log::{debug, trace};

use bdsim_core::{BdsimError, RandomSource, Result, Summarizable};

use crate::events::{draw_waiting_time, select_weighted, total_rate};
use crate::tree::{LineageId, Node, NodeId, PhyloTree};

/// Per-lineage event rates of the protracted speciation process.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PsmRates {
    pub full_species_birth_rate: f64,
    pub full_species_extinction_rate: f64,
    pub incipient_species_birth_rate: f64,
    pub incipient_species_conversion_rate: f64,
    pub incipient_species_extinction_rate: f64,
}

impl PsmRates {
    fn validate(&self) -> Result<()> {
        let named = [
            ("full_species_birth_rate", self.full_species_birth_rate),
            ("full_species_extinction_rate", self.full_species_extinction_rate),
            ("incipient_species_birth_rate", self.incipient_species_birth_rate),
            (
                "incipient_species_conversion_rate",
                self.incipient_species_conversion_rate,
            ),
            (
                "incipient_species_extinction_rate",
                self.incipient_species_extinction_rate,
            ),
        ];
        for (name, value) in named {
            if !value.is_finite() || value < 0.0 {
                return Err(BdsimError::InvalidInput(format!(
                    "{} must be finite and >= 0, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Options for [`ProtractedSpeciationModel::generate_sample`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PsmOptions {
    /// Length of time to run the process for.
    pub max_time: f64,
    /// Start from an incipient rather than a full species.
    pub is_initial_species_incipient: bool,
    /// Rerun the process from scratch when every lineage dies.
    pub is_retry_on_total_extinction: bool,
    /// Give up after this many reruns; `None` never gives up.
    pub max_retries: Option<usize>,
}

impl PsmOptions {
    pub fn new(max_time: f64) -> Self {
        Self {
            max_time,
            is_initial_species_incipient: false,
            is_retry_on_total_extinction: true,
            max_retries: Some(1000),
        }
    }
}

/// One evolutionary line tracked by the process.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Lineage {
    /// 1-based, in order of creation.
    pub index: usize,
    /// Lineage this one split off from.
    pub parent: Option<LineageId>,
    pub is_full_species: bool,
    pub speciation_initiation_time: f64,
    pub speciation_completion_time: Option<f64>,
    pub extinction_time: Option<f64>,
    /// Nodes of the lineage tree this lineage has occupied, oldest first.
    pub node_history: Vec<NodeId>,
    /// Node of the parent lineage at which this lineage branched off.
    pub origin_node: Option<NodeId>,
}

impl Lineage {
    /// The lineage's current node.
    ///
    /// # Panics
    ///
    /// Panics if the history is empty, which never holds for lineages
    /// produced by [`ProtractedSpeciationModel::generate_sample`].
    pub fn node(&self) -> NodeId {
        self.node_history[self.node_history.len() - 1]
    }

    pub fn is_extinct(&self) -> bool {
        self.extinction_time.is_some()
    }
}

/// Result of one successful protracted speciation run.
#[derive(Debug, Clone)]
pub struct PsmSample {
    /// Tree of every lineage, full and incipient, with extinct ones pruned.
    /// Node ids match the lineages' node histories; detached ids belong to
    /// pruned or collapsed nodes.
    pub protracted_speciation_tree: PhyloTree,
    /// Tree of the surviving full species; `None` if there are none.
    pub pruned_tree: Option<PhyloTree>,
    /// Every lineage created during the run, indexed by `LineageId`.
    pub lineages: Vec<Lineage>,
    pub elapsed_time: f64,
}

impl Summarizable for PsmSample {
    fn summary(&self) -> String {
        let surviving = self.lineages.iter().filter(|l| !l.is_extinct()).count();
        let full = self
            .lineages
            .iter()
            .filter(|l| !l.is_extinct() && l.is_full_species)
            .count();
        format!(
            "PsmSample: t={:.4}, {} lineages ({} surviving, {} full species)",
            self.elapsed_time,
            self.lineages.len(),
            surviving,
            full
        )
    }
}

/// Sampler for the protracted speciation process.
///
/// # Examples
///
/// ```
/// use bdsim_phylo::protracted::{ProtractedSpeciationModel, PsmOptions, PsmRates};
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
///
/// let psm = ProtractedSpeciationModel::new(PsmRates {
///     full_species_birth_rate: 0.5,
///     full_species_extinction_rate: 0.1,
///     incipient_species_birth_rate: 0.5,
///     incipient_species_conversion_rate: 1.0,
///     incipient_species_extinction_rate: 0.1,
/// })
/// .unwrap();
/// let mut rng = StdRng::seed_from_u64(11);
/// let sample = psm.generate_sample(&PsmOptions::new(4.0), &mut rng).unwrap();
/// assert_eq!(sample.elapsed_time, 4.0);
/// assert!(!sample.lineages.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct ProtractedSpeciationModel {
    rates: PsmRates,
}

impl ProtractedSpeciationModel {
    /// # Errors
    ///
    /// Returns an error if any rate is negative or not finite.
    pub fn new(rates: PsmRates) -> Result<Self> {
        rates.validate()?;
        Ok(Self { rates })
    }

    pub fn rates(&self) -> &PsmRates {
        &self.rates
    }

    /// Run the process for `options.max_time`.
    ///
    /// # Errors
    ///
    /// - [`BdsimError::InvalidInput`] if `max_time` is negative or not finite.
    /// - [`BdsimError::TotalExtinction`] if every lineage dies and retries are
    ///   disabled or exhausted.
    pub fn generate_sample<R: RandomSource + ?Sized>(
        &self,
        options: &PsmOptions,
        rng: &mut R,
    ) -> Result<PsmSample> {
        if !options.max_time.is_finite() || options.max_time < 0.0 {
            return Err(BdsimError::InvalidInput(format!(
                "max_time must be finite and >= 0, got {}",
                options.max_time
            )));
        }
        let mut retries = 0usize;
        loop {
            let mut run = PsmRun::new(!options.is_initial_species_incipient);
            match run.simulate(&self.rates, options.max_time, rng) {
                Ok(()) => {
                    let sample = run.finish()?;
                    debug!("{}", sample.summary());
                    return Ok(sample);
                }
                Err(e) if e.is_total_extinction() && options.is_retry_on_total_extinction => {
                    retries += 1;
                    if options.max_retries.map_or(false, |max| retries > max) {
                        debug!("total extinction; giving up after {} retries", retries - 1);
                        return Err(e);
                    }
                    debug!("total extinction at t={:.6}; retry {}", run.time, retries);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// State of a single run.
struct PsmRun {
    tree: PhyloTree,
    lineages: Vec<Lineage>,
    full: Vec<LineageId>,
    incipient: Vec<LineageId>,
    time: f64,
    node_counter: usize,
}

impl PsmRun {
    fn new(is_full_species: bool) -> Self {
        let mut run = Self {
            tree: PhyloTree::new(),
            lineages: Vec::new(),
            full: Vec::new(),
            incipient: Vec::new(),
            time: 0.0,
            node_counter: 0,
        };
        let initial = run.new_lineage(None, is_full_species, None);
        let root = run.tree.root();
        run.register_node(initial, root);
        run
    }

    fn new_lineage(
        &mut self,
        parent: Option<LineageId>,
        is_full_species: bool,
        origin_node: Option<NodeId>,
    ) -> LineageId {
        let id = self.lineages.len();
        self.lineages.push(Lineage {
            index: id + 1,
            parent,
            is_full_species,
            speciation_initiation_time: self.time,
            speciation_completion_time: None,
            extinction_time: None,
            node_history: Vec::new(),
            origin_node,
        });
        if is_full_species {
            self.full.push(id);
        } else {
            self.incipient.push(id);
        }
        id
    }

    fn register_node(&mut self, lineage: LineageId, node: NodeId) {
        self.node_counter += 1;
        let index = self.lineages[lineage].index;
        self.tree[node].label = Some(format!("L{}.n{}", index, self.node_counter));
        self.tree[node].lineage = Some(lineage);
        self.lineages[lineage].node_history.push(node);
    }

    fn advance(&mut self, dt: f64) {
        for &id in self.full.iter().chain(self.incipient.iter()) {
            let node = self.lineages[id].node();
            self.tree[node].edge_length += dt;
        }
        self.time += dt;
    }

    fn simulate<R: RandomSource + ?Sized>(
        &mut self,
        rates: &PsmRates,
        max_time: f64,
        rng: &mut R,
    ) -> Result<()> {
        loop {
            let n_full = self.full.len() as f64;
            let n_incipient = self.incipient.len() as f64;
            let weights = [
                rates.full_species_birth_rate * n_full,
                rates.full_species_extinction_rate * n_full,
                rates.incipient_species_birth_rate * n_incipient,
                rates.incipient_species_conversion_rate * n_incipient,
                rates.incipient_species_extinction_rate * n_incipient,
            ];
            if weights.iter().all(|&w| w == 0.0) {
                self.advance(max_time - self.time);
                return Ok(());
            }
            let total = total_rate(&weights)?;
            let waiting_time = draw_waiting_time(total, rng);
            if self.time + waiting_time > max_time {
                self.advance(max_time - self.time);
                self.time = max_time;
                return Ok(());
            }
            self.advance(waiting_time);

            match select_weighted(&weights, total, rng) {
                0 => self.split(true, rng)?,
                1 => self.go_extinct(true, rng)?,
                2 => self.split(false, rng)?,
                3 => self.complete_speciation(rng),
                _ => self.go_extinct(false, rng)?,
            }
        }
    }

    /// A lineage buds off a new incipient species.
    fn split<R: RandomSource + ?Sized>(&mut self, from_full: bool, rng: &mut R) -> Result<()> {
        let population = if from_full { &self.full } else { &self.incipient };
        let parent = population[rng.choice_index(population.len())];
        let parent_node = self.lineages[parent].node();
        let daughter = self.new_lineage(Some(parent), false, Some(parent_node));
        let c1 = self.tree.new_child(parent_node)?;
        self.register_node(parent, c1);
        let c2 = self.tree.new_child(parent_node)?;
        self.register_node(daughter, c2);
        trace!(
            "t={:.6}: L{} buds off L{}",
            self.time,
            self.lineages[parent].index,
            self.lineages[daughter].index
        );
        Ok(())
    }

    fn go_extinct<R: RandomSource + ?Sized>(&mut self, from_full: bool, rng: &mut R) -> Result<()> {
        let population = if from_full {
            &mut self.full
        } else {
            &mut self.incipient
        };
        let id = population.remove(rng.choice_index(population.len()));
        self.lineages[id].extinction_time = Some(self.time);
        trace!("t={:.6}: L{} goes extinct", self.time, self.lineages[id].index);
        if self.full.is_empty() && self.incipient.is_empty() {
            return Err(BdsimError::TotalExtinction);
        }
        let node = self.lineages[id].node();
        self.tree.prune_subtree(node, true)
    }

    fn complete_speciation<R: RandomSource + ?Sized>(&mut self, rng: &mut R) {
        let id = self
            .incipient
            .remove(rng.choice_index(self.incipient.len()));
        self.full.push(id);
        let lineage = &mut self.lineages[id];
        lineage.is_full_species = true;
        lineage.speciation_completion_time = Some(self.time);
        trace!("t={:.6}: L{} completes speciation", self.time, lineage.index);
    }

    fn finish(mut self) -> Result<PsmSample> {
        let (pruned_tree, daughters) = self.assemble_pruned_tree()?;
        self.tree.calc_node_ages(None)?;
        for id in daughters {
            if let Some(origin) = self.lineages[id].origin_node {
                if self.tree.contains(origin) {
                    self.tree[origin].is_full_speciation_event = true;
                }
            }
        }
        Ok(PsmSample {
            protracted_speciation_tree: self.tree,
            pruned_tree,
            lineages: self.lineages,
            elapsed_time: self.time,
        })
    }

    /// Build the tree of surviving full species.
    ///
    /// Each lineage carries the top node of the pruned clade descending
    /// through it. Lineages are visited from the most recent initiation
    /// backwards; a daughter with a non-empty clade either hands its top to
    /// its parent or, if the parent already has one, joins both under a
    /// branching node dated at the daughter's initiation. Also returns the
    /// daughters that produced branching nodes.
    fn assemble_pruned_tree(&self) -> Result<(Option<PhyloTree>, Vec<LineageId>)> {
        let mut nodes: Vec<Node> = Vec::new();
        let mut top: Vec<Option<NodeId>> = vec![None; self.lineages.len()];

        let mut survivors = self.full.clone();
        survivors.sort_unstable();
        for id in survivors {
            let leaf = push_pruned_node(&mut nodes, id, self.lineages[id].index, 0.0);
            nodes[leaf].name = nodes[leaf].label.clone();
            top[id] = Some(leaf);
        }

        let mut order: Vec<LineageId> = (0..self.lineages.len()).collect();
        order.sort_by(|&a, &b| {
            self.lineages[b]
                .speciation_initiation_time
                .total_cmp(&self.lineages[a].speciation_initiation_time)
                .then(b.cmp(&a))
        });

        let mut daughters = Vec::new();
        for id in order {
            let (Some(parent), Some(daughter_top)) = (self.lineages[id].parent, top[id]) else {
                continue;
            };
            top[parent] = Some(match top[parent] {
                None => daughter_top,
                Some(parent_top) => {
                    let age = self.time - self.lineages[id].speciation_initiation_time;
                    let branch =
                        push_pruned_node(&mut nodes, parent, self.lineages[parent].index, age);
                    for child in [parent_top, daughter_top] {
                        nodes[child].parent = Some(branch);
                        nodes[branch].children.push(child);
                    }
                    daughters.push(id);
                    branch
                }
            });
        }

        let Some(root) = top.first().copied().flatten() else {
            return Ok((None, daughters));
        };
        let mut tree = PhyloTree::from_nodes(nodes, root)?;
        tree.set_edge_lengths_from_node_ages()?;
        tree.suppress_unifurcations();
        Ok((Some(tree.compact()), daughters))
    }
}

fn push_pruned_node(nodes: &mut Vec<Node>, lineage: LineageId, index: usize, age: f64) -> NodeId {
    let id = nodes.len();
    nodes.push(Node {
        id,
        parent: None,
        children: Vec::new(),
        edge_length: 0.0,
        name: None,
        label: Some(format!("L{}", index)),
        age: Some(age),
        rates: None,
        lineage: Some(lineage),
        is_full_speciation_event: false,
    });
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::VecDeque;

    /// Replays fixed draws in order.
    #[derive(Default)]
    struct Scripted {
        uniforms: VecDeque<f64>,
        waits: VecDeque<f64>,
        choices: VecDeque<usize>,
    }

    impl RandomSource for Scripted {
        fn random(&mut self) -> f64 {
            self.uniforms.pop_front().unwrap()
        }
        fn expovariate(&mut self, _rate: f64) -> f64 {
            self.waits.pop_front().unwrap()
        }
        fn gauss(&mut self, mu: f64, _sigma: f64) -> f64 {
            mu
        }
        fn choice_index(&mut self, _len: usize) -> usize {
            self.choices.pop_front().unwrap()
        }
    }

    fn rates(bf: f64, df: f64, bi: f64, ci: f64, di: f64) -> PsmRates {
        PsmRates {
            full_species_birth_rate: bf,
            full_species_extinction_rate: df,
            incipient_species_birth_rate: bi,
            incipient_species_conversion_rate: ci,
            incipient_species_extinction_rate: di,
        }
    }

    fn tip_depths(tree: &PhyloTree) -> Vec<f64> {
        tree.leaves()
            .into_iter()
            .map(|leaf| {
                let mut depth = 0.0;
                let mut cur = Some(leaf);
                while let Some(id) = cur {
                    depth += tree[id].edge_length;
                    cur = tree[id].parent;
                }
                depth
            })
            .collect()
    }

    #[test]
    fn scripted_run_builds_expected_trees() {
        // t=1: L1 buds off L2; t=1.5: L2 completes; t=2: L2 buds off L3; stop at 3.
        let psm = ProtractedSpeciationModel::new(rates(1.0, 0.0, 0.0, 1.0, 0.0)).unwrap();
        let mut rng = Scripted {
            uniforms: VecDeque::from(vec![0.5, 0.9, 0.1]),
            waits: VecDeque::from(vec![1.0, 0.5, 0.5, 10.0]),
            choices: VecDeque::from(vec![0, 0, 1]),
        };
        let sample = psm.generate_sample(&PsmOptions::new(3.0), &mut rng).unwrap();
        assert_eq!(sample.elapsed_time, 3.0);
        assert_eq!(sample.lineages.len(), 3);

        let l2 = &sample.lineages[1];
        assert_eq!(l2.parent, Some(0));
        assert!(l2.is_full_species);
        assert_eq!(l2.speciation_initiation_time, 1.0);
        assert_eq!(l2.speciation_completion_time, Some(1.5));
        assert_eq!(l2.origin_node, Some(0));
        assert!(!sample.lineages[2].is_full_species);

        let psm_tree = &sample.protracted_speciation_tree;
        assert_eq!(psm_tree.leaf_count(), 3);
        assert_eq!(psm_tree[0].label.as_deref(), Some("L1.n1"));
        assert_eq!(psm_tree[0].edge_length, 1.0);
        let labels: Vec<_> = psm_tree
            .iter_preorder()
            .filter_map(|id| psm_tree[id].label.clone())
            .collect();
        assert_eq!(labels, vec!["L1.n1", "L1.n2", "L2.n3", "L2.n4", "L3.n5"]);
        assert!(psm_tree[0].is_full_speciation_event);
        assert!(!psm_tree[l2.node_history[0]].is_full_speciation_event);

        let pruned = sample.pruned_tree.unwrap();
        assert_eq!(pruned.leaf_count(), 2);
        assert_eq!(pruned.leaf_names(), vec!["L1", "L2"]);
        assert_eq!(pruned.internal_node_ages(Some(1e-12)).unwrap(), vec![2.0]);
        for leaf in pruned.leaves() {
            assert_eq!(pruned[leaf].edge_length, 2.0);
        }
    }

    #[test]
    fn no_events_gives_single_lineage() {
        let psm = ProtractedSpeciationModel::new(rates(0.0, 0.0, 0.0, 0.0, 0.0)).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let sample = psm.generate_sample(&PsmOptions::new(2.0), &mut rng).unwrap();
        assert_eq!(sample.lineages.len(), 1);
        assert_eq!(sample.protracted_speciation_tree[0].edge_length, 2.0);
        let pruned = sample.pruned_tree.unwrap();
        assert_eq!(pruned.node_count(), 1);
        assert_eq!(pruned.leaf_names(), vec!["L1"]);
    }

    #[test]
    fn incipient_start_without_completion_has_no_pruned_tree() {
        let psm = ProtractedSpeciationModel::new(rates(0.0, 0.0, 1.0, 0.0, 0.0)).unwrap();
        let options = PsmOptions {
            is_initial_species_incipient: true,
            ..PsmOptions::new(2.0)
        };
        let mut rng = StdRng::seed_from_u64(2);
        let sample = psm.generate_sample(&options, &mut rng).unwrap();
        assert!(sample.pruned_tree.is_none());
        assert!(sample.lineages.iter().all(|l| !l.is_full_species));
    }

    #[test]
    fn extinction_without_retry_fails() {
        let psm = ProtractedSpeciationModel::new(rates(0.0, 1.0, 0.0, 0.0, 0.0)).unwrap();
        let options = PsmOptions {
            is_retry_on_total_extinction: false,
            ..PsmOptions::new(100.0)
        };
        let mut rng = StdRng::seed_from_u64(3);
        let err = psm.generate_sample(&options, &mut rng).unwrap_err();
        assert!(err.is_total_extinction());
    }

    #[test]
    fn retries_are_bounded() {
        let psm = ProtractedSpeciationModel::new(rates(0.0, 1.0, 0.0, 0.0, 0.0)).unwrap();
        let mut rng = StdRng::seed_from_u64(4);
        for max_retries in [0, 3] {
            let options = PsmOptions {
                max_retries: Some(max_retries),
                ..PsmOptions::new(100.0)
            };
            assert!(psm.generate_sample(&options, &mut rng).unwrap_err().is_total_extinction());
        }
    }

    #[test]
    fn invalid_parameters_rejected() {
        assert!(ProtractedSpeciationModel::new(rates(-1.0, 0.0, 0.0, 0.0, 0.0)).is_err());
        assert!(ProtractedSpeciationModel::new(rates(0.0, f64::NAN, 0.0, 0.0, 0.0)).is_err());
        let psm = ProtractedSpeciationModel::new(rates(1.0, 0.0, 0.0, 0.0, 0.0)).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        assert!(psm.generate_sample(&PsmOptions::new(-1.0), &mut rng).is_err());
    }

    #[test]
    fn random_runs_are_consistent() {
        let psm = ProtractedSpeciationModel::new(rates(0.6, 0.1, 0.6, 0.8, 0.2)).unwrap();
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let sample = psm.generate_sample(&PsmOptions::new(4.0), &mut rng).unwrap();
            let tree = &sample.protracted_speciation_tree;

            let surviving: Vec<&Lineage> =
                sample.lineages.iter().filter(|l| !l.is_extinct()).collect();
            assert_eq!(tree.leaf_count(), surviving.len());
            for lineage in &surviving {
                assert!(tree[lineage.node()].is_leaf());
                assert!(tree.contains(lineage.node()));
            }
            for depth in tip_depths(tree) {
                assert!((depth - 4.0).abs() < 1e-9, "tip depth {}", depth);
            }
            for (i, lineage) in sample.lineages.iter().enumerate() {
                assert_eq!(lineage.index, i + 1);
                assert!(!lineage.node_history.is_empty());
                if let Some(parent) = lineage.parent {
                    assert!(parent < i);
                }
            }

            let full_survivors = surviving.iter().filter(|l| l.is_full_species).count();
            match &sample.pruned_tree {
                None => assert_eq!(full_survivors, 0),
                Some(pruned) => {
                    assert_eq!(pruned.leaf_count(), full_survivors);
                    assert!(pruned.internal_node_ages(Some(1e-9)).is_ok());
                    for id in pruned.iter_preorder() {
                        assert!(pruned[id].edge_length >= 0.0);
                        assert_ne!(pruned[id].children.len(), 1);
                    }
                }
            }
        }
    }

    #[test]
    fn summary_counts_lineages() {
        let psm = ProtractedSpeciationModel::new(rates(0.0, 0.0, 0.0, 0.0, 0.0)).unwrap();
        let mut rng = StdRng::seed_from_u64(6);
        let sample = psm.generate_sample(&PsmOptions::new(1.0), &mut rng).unwrap();
        assert_eq!(
            sample.summary(),
            "PsmSample: t=1.0000, 1 lineages (1 surviving, 1 full species)"
        );
    }
}
