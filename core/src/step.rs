use crate::action::Action;
use std::time::Duration;

/// Delay before releasing the non-first children of a staggered parallel
/// group, when no explicit stagger is configured.
pub const DEFAULT_STAGGER: Duration = Duration::from_millis(350);

#[derive(Debug)]
pub enum StepNode {
    Leaf(Action),
    Sequential(SequentialGroup),
    Parallel(ParallelGroup),
}

impl StepNode {
    pub fn name(&self) -> &str {
        match self {
            StepNode::Leaf(action) => &action.name,
            StepNode::Sequential(group) => &group.name,
            StepNode::Parallel(group) => &group.name,
        }
    }
}

impl From<Action> for StepNode {
    fn from(action: Action) -> Self {
        StepNode::Leaf(action)
    }
}

impl From<SequentialGroup> for StepNode {
    fn from(group: SequentialGroup) -> Self {
        StepNode::Sequential(group)
    }
}

impl From<ParallelGroup> for StepNode {
    fn from(group: ParallelGroup) -> Self {
        StepNode::Parallel(group)
    }
}

#[derive(Debug, Default)]
pub struct SequentialGroup {
    pub name: String,
    pub children: Vec<StepNode>,
}

impl SequentialGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    pub fn step(mut self, node: impl Into<StepNode>) -> Self {
        self.children.push(node.into());
        self
    }
}

#[derive(Debug)]
pub struct ParallelGroup {
    pub name: String,
    pub children: Vec<StepNode>,
    pub first_index: Option<usize>,
    pub stagger: Duration,
}

impl ParallelGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
            first_index: None,
            stagger: DEFAULT_STAGGER,
        }
    }

    pub fn step(mut self, node: impl Into<StepNode>) -> Self {
        self.children.push(node.into());
        self
    }

    /// Designates the child (by position) that starts alone; the remaining
    /// children are released once the stagger delay has elapsed.
    pub fn start_first(mut self, index: usize) -> Self {
        self.first_index = Some(index);
        self
    }

    pub fn stagger(mut self, delay: Duration) -> Self {
        self.stagger = delay;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_compose_nested_trees() {
        let tree = SequentialGroup::new("bring up link")
            .step(Action::new("power on", || Ok(())))
            .step(
                ParallelGroup::new("dual traffic")
                    .step(Action::new("uplink", || Ok(())))
                    .step(Action::new("downlink", || Ok(())))
                    .start_first(0)
                    .stagger(Duration::from_millis(100)),
            );

        assert_eq!(tree.name, "bring up link");
        assert_eq!(tree.children.len(), 2);
        match &tree.children[1] {
            StepNode::Parallel(group) => {
                assert_eq!(group.first_index, Some(0));
                assert_eq!(group.stagger, Duration::from_millis(100));
                assert_eq!(group.children.len(), 2);
            }
            other => panic!("expected parallel group, got {}", other.name()),
        }
    }

    #[test]
    fn parallel_group_defaults_to_simultaneous_start() {
        let group = ParallelGroup::new("pair");
        assert_eq!(group.first_index, None);
        assert_eq!(group.stagger, DEFAULT_STAGGER);
    }
}
