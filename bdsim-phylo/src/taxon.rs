//! Taxon namespaces and assignment of taxa to simulated tips.

use bdsim_core::{BdsimError, RandomSource, Result};

use crate::tree::PhyloTree;

/// An ordered collection of distinct taxon labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TaxonNamespace {
    labels: Vec<String>,
}

impl TaxonNamespace {
    /// An empty namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// A namespace holding the given labels, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if a label appears twice.
    pub fn from_labels<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ns = Self::new();
        for label in labels {
            let label = label.into();
            if ns.contains(&label) {
                return Err(BdsimError::InvalidInput(format!(
                    "duplicate taxon label '{}'",
                    label
                )));
            }
            ns.labels.push(label);
        }
        Ok(ns)
    }

    /// A namespace of `n` generated labels `T1..Tn`.
    pub fn with_generated(n: usize) -> Self {
        Self {
            labels: (1..=n).map(|i| format!("T{}", i)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Append a fresh `T<n>` label that does not clash with existing ones.
    pub fn new_taxon(&mut self) -> &str {
        let mut n = self.labels.len() + 1;
        let mut label = format!("T{}", n);
        while self.contains(&label) {
            n += 1;
            label = format!("T{}", n);
        }
        self.labels.push(label);
        &self.labels[self.labels.len() - 1]
    }
}

/// Give every unnamed tip a distinct taxon drawn at random from `namespace`.
///
/// Labels already used by named tips are not reused. When the namespace runs
/// out, new taxa are appended to it if `create_required_taxa` is set.
///
/// # Errors
///
/// Returns an error if the tree has more unnamed tips than available taxa and
/// `create_required_taxa` is false.
pub fn randomly_assign_taxa<R: RandomSource + ?Sized>(
    tree: &mut PhyloTree,
    namespace: &mut TaxonNamespace,
    create_required_taxa: bool,
    rng: &mut R,
) -> Result<()> {
    let leaves = tree.leaves();
    let used: Vec<String> = leaves
        .iter()
        .filter_map(|&id| tree[id].name.clone())
        .collect();
    let mut available: Vec<String> = namespace
        .labels()
        .iter()
        .filter(|l| !used.contains(l))
        .cloned()
        .collect();

    for id in leaves {
        if tree[id].name.is_some() {
            continue;
        }
        let label = if available.is_empty() {
            if !create_required_taxa {
                return Err(BdsimError::InvalidInput(format!(
                    "tree has more tips than the {} taxa in the namespace",
                    namespace.len()
                )));
            }
            namespace.new_taxon().to_string()
        } else {
            let idx = rng.choice_index(available.len());
            available.remove(idx)
        };
        tree[id].name = Some(label);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn four_tips() -> PhyloTree {
        let mut tree = PhyloTree::new();
        let a = tree.new_child(0).unwrap();
        let b = tree.new_child(0).unwrap();
        for p in [a, b] {
            tree.new_child(p).unwrap();
            tree.new_child(p).unwrap();
        }
        tree
    }

    #[test]
    fn generated_labels() {
        let ns = TaxonNamespace::with_generated(3);
        assert_eq!(ns.labels(), &["T1", "T2", "T3"]);
        assert_eq!(ns.get(1), Some("T2"));
    }

    #[test]
    fn duplicate_labels_rejected() {
        assert!(TaxonNamespace::from_labels(["a", "b", "a"]).is_err());
    }

    #[test]
    fn new_taxon_skips_existing_labels() {
        let mut ns = TaxonNamespace::from_labels(["T2"]).unwrap();
        assert_eq!(ns.new_taxon(), "T3");
        assert_eq!(ns.len(), 2);
    }

    #[test]
    fn assigns_distinct_taxa() {
        let mut tree = four_tips();
        let mut ns = TaxonNamespace::from_labels(["a", "b", "c", "d", "e"]).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        randomly_assign_taxa(&mut tree, &mut ns, false, &mut rng).unwrap();
        let names = tree.leaf_names();
        assert_eq!(names.len(), 4);
        let mut dedup = names.clone();
        dedup.dedup();
        assert_eq!(dedup, names);
        assert_eq!(ns.len(), 5);
    }

    #[test]
    fn creates_required_taxa() {
        let mut tree = four_tips();
        let mut ns = TaxonNamespace::from_labels(["a", "b"]).unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        randomly_assign_taxa(&mut tree, &mut ns, true, &mut rng).unwrap();
        assert_eq!(tree.leaf_names().len(), 4);
        assert_eq!(ns.len(), 4);
    }

    #[test]
    fn refuses_to_create_when_disallowed() {
        let mut tree = four_tips();
        let mut ns = TaxonNamespace::from_labels(["a"]).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        assert!(randomly_assign_taxa(&mut tree, &mut ns, false, &mut rng).is_err());
    }
}
