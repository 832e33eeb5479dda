use std::time::Duration;

use courier_core::PipelineConfig;
use serde::Deserialize;

/// Mediator-level configuration.
///
/// Describes the pipeline used by `Mediator::send` when the caller gives no
/// explicit `PipelineConfig`, plus the dispatch timeout applied by the tower
/// stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MediatorConfig {
    /// Groups enabled for every default dispatch.
    pub default_groups: Vec<String>,
    /// Restrict default dispatches to `default_groups`.
    pub only_groups: bool,
    /// Drop global and open-generic behaviors from default dispatches.
    pub skip_global: bool,
    /// Timeout applied by `build_dispatch_stack`. `None` disables it.
    pub dispatch_timeout_ms: Option<u64>,
}

impl MediatorConfig {
    /// The pipeline configuration used when callers do not supply one.
    #[must_use]
    pub fn default_pipeline(&self) -> PipelineConfig {
        self.default_groups.iter().fold(
            PipelineConfig::new()
                .only_groups(self.only_groups)
                .skip_global(self.skip_global),
            |config, group| config.with_group(group.as_str()),
        )
    }

    #[must_use]
    pub fn dispatch_timeout(&self) -> Option<Duration> {
        self.dispatch_timeout_ms.map(Duration::from_millis)
    }
}
