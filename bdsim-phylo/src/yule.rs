//! Maximum-likelihood fit of the Yule (pure-birth) model.
//!
//! The estimate uses internal node ages only (time from each branching point
//! to the tips). See Nee (2001), "Inferring speciation rates from
//! phylogenies", Evolution 55:661-668, and Yule (1924).

use bdsim_core::{BdsimError, Result};

use crate::tree::PhyloTree;

/// Where the internal node ages come from.
#[derive(Debug, Clone, Copy)]
pub enum NodeAgeSource<'a> {
    /// Ages are computed from an ultrametric tree.
    Tree(&'a PhyloTree),
    /// Ages given directly, in any order.
    Ages(&'a [f64]),
}

/// Options for [`fit_yule_model`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct YuleFitOptions {
    /// Tolerance for the ultrametricity check on trees; `None` skips it.
    pub ultrametricity_precision: Option<f64>,
    /// Return [`BdsimError::Likelihood`] instead of a `-inf` log-likelihood
    /// when the ages admit no finite likelihood.
    pub fail_on_degenerate_likelihood: bool,
}

impl Default for YuleFitOptions {
    fn default() -> Self {
        Self {
            ultrametricity_precision: Some(1e-7),
            fail_on_degenerate_likelihood: false,
        }
    }
}

/// Fitted Yule model.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct YuleFit {
    pub birth_rate: f64,
    /// Finite, or `-inf` for degenerate input.
    pub log_likelihood: f64,
}

/// Maximum-likelihood birth rate and its log-likelihood.
///
/// With ages sorted oldest first (`x0` the oldest), `lo` is one plus the
/// number of ages tied with `x0` and `up = n + 1`:
///
/// ```text
/// rate = (up - lo) / (lo * x0 + sum of ages below x0)
/// logL = sum_{k=lo}^{up-1} ln k + (up - lo) ln rate + (lo - up)
/// ```
///
/// # Errors
///
/// - [`BdsimError::InvalidInput`] for ages that are negative or not finite.
/// - [`BdsimError::NotUltrametric`] if a tree fails the precision check.
/// - [`BdsimError::Likelihood`] for degenerate ages (none at all, e.g. a
///   one-tip tree, or every age tied with the oldest) when
///   `fail_on_degenerate_likelihood` is set. Otherwise such input yields
///   `birth_rate = 0` and a `-inf` log-likelihood.
///
/// # Examples
///
/// ```
/// use bdsim_phylo::yule::{fit_yule_model, NodeAgeSource, YuleFitOptions};
///
/// let fit = fit_yule_model(NodeAgeSource::Ages(&[5.0, 3.0, 1.0]), &YuleFitOptions::default())
///     .unwrap();
/// assert!((fit.birth_rate - 2.0 / 14.0).abs() < 1e-12);
/// ```
pub fn fit_yule_model(source: NodeAgeSource<'_>, options: &YuleFitOptions) -> Result<YuleFit> {
    let mut ages = match source {
        NodeAgeSource::Tree(tree) => tree.internal_node_ages(options.ultrametricity_precision)?,
        NodeAgeSource::Ages(ages) => ages.to_vec(),
    };
    if let Some(&bad) = ages.iter().find(|a| !a.is_finite() || **a < 0.0) {
        return Err(BdsimError::InvalidInput(format!(
            "node ages must be finite and >= 0, got {}",
            bad
        )));
    }
    ages.sort_by(|a, b| b.total_cmp(a));

    let oldest = ages.first().copied().unwrap_or(0.0);
    let tied = ages.iter().take_while(|&&a| a >= oldest).count();
    let lo = tied + 1;
    let up = ages.len() + 1;

    // No ages, or every age tied with the oldest: no births to fit.
    if up <= lo {
        if options.fail_on_degenerate_likelihood {
            return Err(BdsimError::Likelihood(format!(
                "{} node ages leave no births to fit",
                ages.len()
            )));
        }
        return Ok(YuleFit {
            birth_rate: 0.0,
            log_likelihood: f64::NEG_INFINITY,
        });
    }

    let births = (up - lo) as f64;
    let exposure = lo as f64 * oldest + ages[tied..].iter().sum::<f64>();
    if exposure <= 0.0 {
        return Err(BdsimError::Likelihood(
            "zero total branch time with births present".into(),
        ));
    }
    let birth_rate = births / exposure;
    let log_likelihood =
        (lo..up).map(|k| (k as f64).ln()).sum::<f64>() + births * birth_rate.ln() - births;

    Ok(YuleFit {
        birth_rate,
        log_likelihood,
    })
}

/// [`fit_yule_model`] on a tree with the default options.
pub fn fit_yule_model_to_tree(tree: &PhyloTree) -> Result<YuleFit> {
    fit_yule_model(NodeAgeSource::Tree(tree), &YuleFitOptions::default())
}
