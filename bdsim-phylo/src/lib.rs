//! Birth-death tree simulation and Yule model fitting.
//!
//! Features:
//!
//! - **Tree data structures**: Rooted arena trees with pruning and unifurcation suppression
//! - **Birth-death simulation**: Continuous-time with GSA sampling, discrete generations, pure birth
//! - **Protracted speciation**: Incipient/full species lineages and the derived species tree
//! - **Yule fitting**: Maximum-likelihood birth rate from node ages or an ultrametric tree
//!
//! # Examples
//!
//! ```
//! use bdsim_phylo::{fit_yule_model_to_tree, simulate_pure_birth, TaxonNamespace};
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let ns = TaxonNamespace::with_generated(50);
//! let mut rng = StdRng::seed_from_u64(2024);
//! let tree = simulate_pure_birth(&ns, 1.5, &mut rng).unwrap();
//! let fit = fit_yule_model_to_tree(&tree).unwrap();
//! assert!(fit.birth_rate > 0.0);
//! ```

pub mod birth_death;
pub mod events;
pub mod protracted;
pub mod taxon;
pub mod tree;
pub mod yule;

pub use birth_death::{
    simulate_continuous_birth_death, simulate_discrete_birth_death, simulate_pure_birth,
    BirthDeathConfig, DiscreteBirthDeathConfig,
};
pub use protracted::{Lineage, ProtractedSpeciationModel, PsmOptions, PsmRates, PsmSample};
pub use taxon::{randomly_assign_taxa, TaxonNamespace};
pub use tree::{LineageId, Node, NodeId, PhyloTree, Rates};
pub use yule::{fit_yule_model, fit_yule_model_to_tree, NodeAgeSource, YuleFit, YuleFitOptions};
