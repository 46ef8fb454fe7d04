//! Ordered registry of named pipeline steps.

use std::fmt;
use std::sync::Arc;

use super::step::{PlacementHint, ResourceHint, StepEntry};
use crate::error::RegistryError;
use crate::storage::ArtifactRef;

/// Reserved request name selecting every registered step.
pub const ALL_STEPS: &str = "all";

/// A registered step. Immutable once registered.
#[derive(Clone)]
pub struct Step {
    pub name: String,
    /// Position in registration order, starting at 0.
    pub ordinal: usize,
    pub resources: ResourceHint,
    pub placement: PlacementHint,
    pub entry: Arc<dyn StepEntry>,
}

impl Step {
    /// Artifact produced by this step.
    pub fn declared_output(&self) -> Option<ArtifactRef> {
        self.entry.declared_output()
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("ordinal", &self.ordinal)
            .field("resources", &self.resources)
            .field("placement", &self.placement)
            .finish_non_exhaustive()
    }
}

/// Declares the steps of a pipeline in execution order.
///
/// Registration only records declarations; nothing is executed.
#[derive(Debug, Default, Clone)]
pub struct StepRegistry {
    steps: Vec<Step>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a step.
    ///
    /// # Errors
    ///
    /// - `DuplicateStep` if `name` is already registered.
    /// - `InvalidName` if `name` is empty, contains whitespace, or is the
    ///   reserved [`ALL_STEPS`] selector.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        entry: Arc<dyn StepEntry>,
        resources: ResourceHint,
        placement: PlacementHint,
    ) -> Result<&Step, RegistryError> {
        let name = name.into();
        if name.is_empty() || name.chars().any(char::is_whitespace) || name == ALL_STEPS {
            return Err(RegistryError::InvalidName(name));
        }
        if self.contains(&name) {
            return Err(RegistryError::DuplicateStep(name));
        }

        let ordinal = self.steps.len();
        self.steps.push(Step {
            name,
            ordinal,
            resources,
            placement,
            entry,
        });
        Ok(&self.steps[ordinal])
    }

    /// Steps in registration order. Each call starts a fresh iteration.
    pub fn ordered(&self) -> std::slice::Iter<'_, Step> {
        self.steps.iter()
    }

    /// Looks up a step. Fails with `UnknownStep` if absent.
    pub fn by_name(&self, name: &str) -> Result<&Step, RegistryError> {
        self.steps
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| RegistryError::UnknownStep(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.steps.iter().any(|s| s.name == name)
    }

    /// The step registered immediately before `step`.
    pub fn predecessor(&self, step: &Step) -> Option<&Step> {
        step.ordinal
            .checked_sub(1)
            .and_then(|i| self.steps.get(i))
    }

    /// Input handed to `step`: the declared output of its predecessor.
    pub fn input_of(&self, step: &Step) -> Option<ArtifactRef> {
        self.predecessor(step).and_then(Step::declared_output)
    }

    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::step::StepContext;
    use async_trait::async_trait;

    struct Noop(Option<ArtifactRef>);

    #[async_trait]
    impl StepEntry for Noop {
        fn declared_output(&self) -> Option<ArtifactRef> {
            self.0.clone()
        }

        async fn execute(
            &self,
            _ctx: &StepContext<'_>,
            _input: Option<&ArtifactRef>,
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn hints() -> (ResourceHint, PlacementHint) {
        (
            ResourceHint::new("1", "1", "2000Mi", "3500Mi"),
            PlacementHint::new("t3.medium"),
        )
    }

    fn register(registry: &mut StepRegistry, name: &str) -> Result<(), RegistryError> {
        let (resources, placement) = hints();
        registry
            .register(name, Arc::new(Noop(None)), resources, placement)
            .map(|_| ())
    }

    #[test]
    fn test_register_preserves_order() {
        let mut registry = StepRegistry::new();
        for name in ["make_data", "feat_data", "train_model", "predict"] {
            register(&mut registry, name).unwrap();
        }

        assert_eq!(
            registry.names(),
            vec!["make_data", "feat_data", "train_model", "predict"]
        );
        let ordinals: Vec<usize> = registry.ordered().map(|s| s.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2, 3]);
        // restartable
        assert_eq!(registry.ordered().count(), 4);
    }

    #[test]
    fn test_register_duplicate() {
        let mut registry = StepRegistry::new();
        register(&mut registry, "make_data").unwrap();
        let result = register(&mut registry, "make_data");
        assert!(matches!(result, Err(RegistryError::DuplicateStep(name)) if name == "make_data"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_invalid_names() {
        let mut registry = StepRegistry::new();
        for name in ["", "all", "make data"] {
            assert!(matches!(
                register(&mut registry, name),
                Err(RegistryError::InvalidName(_))
            ));
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_by_name() {
        let mut registry = StepRegistry::new();
        register(&mut registry, "make_data").unwrap();

        assert_eq!(registry.by_name("make_data").unwrap().ordinal, 0);
        assert!(matches!(
            registry.by_name("pred_data"),
            Err(RegistryError::UnknownStep(name)) if name == "pred_data"
        ));
    }

    #[test]
    fn test_input_of_uses_predecessor_output() {
        let mut registry = StepRegistry::new();
        let (resources, placement) = hints();
        registry
            .register(
                "make_data",
                Arc::new(Noop(Some(ArtifactRef::data("processed_data")))),
                resources.clone(),
                placement.clone(),
            )
            .unwrap();
        registry
            .register("feat_data", Arc::new(Noop(None)), resources, placement)
            .unwrap();

        let first = registry.by_name("make_data").unwrap();
        let second = registry.by_name("feat_data").unwrap();
        assert_eq!(registry.input_of(first), None);
        assert_eq!(
            registry.input_of(second),
            Some(ArtifactRef::data("processed_data"))
        );
    }
}
