//! Structuring configuration.

/// Configuration for the structure analyzer.
///
/// The defaults structure loops and run the reduction loop until it either finishes or
/// stops making progress. Every reduction removes a node or an edge, so the loop always
/// ends; `max_passes` only matters to callers that want a tighter bound.
///
/// # Examples
///
/// ```rust
/// use dsoscope::analysis::StructureConfig;
///
/// let config = StructureConfig::bounded(32);
/// assert!(config.structure_loops);
/// assert_eq!(config.max_passes, Some(32));
///
/// assert!(!StructureConfig::acyclic().structure_loops);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructureConfig {
    /// Collapse loops into container regions
    ///
    /// When disabled only sequences and conditionals are reduced, and any function
    /// containing a loop fails with [`crate::Error::NonTerminatingStructure`].
    pub structure_loops: bool,

    /// Upper bound on the number of passes over the region graph
    pub max_passes: Option<usize>,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            structure_loops: true,
            max_passes: None,
        }
    }
}

impl StructureConfig {
    /// Sequence and conditional reduction only.
    #[must_use]
    pub fn acyclic() -> Self {
        Self {
            structure_loops: false,
            max_passes: None,
        }
    }

    /// Full structuring that gives up after `max_passes` passes.
    #[must_use]
    pub fn bounded(max_passes: usize) -> Self {
        Self {
            structure_loops: true,
            max_passes: Some(max_passes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structure_config_presets() {
        let default = StructureConfig::default();
        assert!(default.structure_loops);
        assert_eq!(default.max_passes, None);

        let acyclic = StructureConfig::acyclic();
        assert!(!acyclic.structure_loops);
        assert_eq!(acyclic.max_passes, None);

        let bounded = StructureConfig::bounded(4);
        assert!(bounded.structure_loops);
        assert_eq!(bounded.max_passes, Some(4));
    }
}
