//! Capability matrix mapping format pairs to ordered candidate engines.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::engine::Engine;
use crate::format::normalize_format;

/// Static mapping of `(input, output)` to the engines that may attempt it.
///
/// Built once from the engines' declarations. Availability is never consulted
/// here; the router re-checks it for every attempt.
#[derive(Clone)]
pub struct CapabilityMatrix {
    /// Engines in priority order, ties kept in registration order.
    engines: Vec<Arc<dyn Engine>>,
    entries: BTreeMap<(String, String), Vec<Arc<dyn Engine>>>,
}

impl CapabilityMatrix {
    /// Builds the matrix from each engine's declared formats.
    pub fn build(engines: Vec<Arc<dyn Engine>>) -> Self {
        let mut engines = engines;
        // Stable sort keeps registration order among equal ranks
        engines.sort_by_key(|e| e.priority());

        let mut entries: BTreeMap<(String, String), Vec<Arc<dyn Engine>>> = BTreeMap::new();
        for engine in &engines {
            for input in engine.supported_input_formats() {
                for output in engine.supported_output_formats() {
                    let input = normalize_format(input);
                    let output = normalize_format(output);
                    if input == output || !engine.can_convert(&input, &output) {
                        continue;
                    }
                    entries
                        .entry((input, output))
                        .or_default()
                        .push(Arc::clone(engine));
                }
            }
        }

        Self { engines, entries }
    }

    /// Engines declared for the pair, in attempt order. Possibly empty.
    pub fn lookup(&self, input: &str, output: &str) -> Vec<Arc<dyn Engine>> {
        self.entries
            .get(&(normalize_format(input), normalize_format(output)))
            .cloned()
            .unwrap_or_default()
    }

    /// Asks every engine, in priority order, whether it handles the pair.
    pub fn infer(&self, input: &str, output: &str) -> Vec<Arc<dyn Engine>> {
        let input = normalize_format(input);
        let output = normalize_format(output);
        if input == output {
            return Vec::new();
        }
        self.engines
            .iter()
            .filter(|e| e.can_convert(&input, &output))
            .cloned()
            .collect()
    }

    /// Explicit entries, or the inferred list when there are none.
    pub fn candidates(&self, input: &str, output: &str) -> Vec<Arc<dyn Engine>> {
        let found = self.lookup(input, output);
        if found.is_empty() {
            self.infer(input, output)
        } else {
            found
        }
    }

    /// Whether `candidates` has to fall back to inference for the pair.
    pub fn is_inferred(&self, input: &str, output: &str) -> bool {
        !self
            .entries
            .contains_key(&(normalize_format(input), normalize_format(output)))
    }

    /// Every explicit pair, sorted.
    pub fn pairs(&self) -> Vec<(String, String)> {
        self.entries.keys().cloned().collect()
    }

    /// Outputs reachable from `input` through explicit entries.
    pub fn outputs_for(&self, input: &str) -> Vec<String> {
        let input = normalize_format(input);
        self.entries
            .keys()
            .filter(|(i, _)| *i == input)
            .map(|(_, o)| o.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn supports_input(&self, format: &str) -> bool {
        let format = normalize_format(format);
        self.entries.keys().any(|(i, _)| *i == format)
    }

    pub fn supports_output(&self, format: &str) -> bool {
        let format = normalize_format(format);
        self.entries.keys().any(|(_, o)| *o == format)
    }

    /// All registered engines in priority order.
    pub fn engines(&self) -> &[Arc<dyn Engine>] {
        &self.engines
    }
}

impl std::fmt::Debug for CapabilityMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityMatrix")
            .field(
                "engines",
                &self.engines.iter().map(|e| e.name()).collect::<Vec<_>>(),
            )
            .field("pairs", &self.entries.len())
            .finish()
    }
}
