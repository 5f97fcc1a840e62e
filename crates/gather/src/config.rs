/// The operator-level flags a planner picks for a Gather node.
///
/// Built once and handed to `GatherCore::init`; nothing in the operator
/// mutates it afterward.
#[derive(Debug, Clone, Copy)]
pub struct GatherConfig {
    pub num_workers_requested: u32,
    pub single_copy: bool,
    pub parallel_send: bool,
    pub statistics_enabled: bool,
}

impl GatherConfig {
    #[must_use]
    pub fn parallel(num_workers_requested: u32) -> Self {
        Self {
            num_workers_requested,
            single_copy: false,
            parallel_send: false,
            statistics_enabled: false,
        }
    }

    #[must_use]
    pub fn single_copy() -> Self {
        Self {
            num_workers_requested: 1,
            single_copy: true,
            parallel_send: false,
            statistics_enabled: false,
        }
    }

    #[must_use]
    pub fn with_statistics(mut self, enabled: bool) -> Self {
        self.statistics_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_parallel_send(mut self, enabled: bool) -> Self {
        self.parallel_send = enabled;
        self
    }
}
