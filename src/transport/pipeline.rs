//! Channel pipeline description
//!
//! Endpoint variants (key-value, management, query, ...) differ only in the
//! stages appended to the pipeline. The variant supplies a
//! [`PipelineCustomizer`] at construction; the connector installs the
//! resulting stages on every new channel.

use std::sync::Arc;

/// One named pipeline stage, installed by the connector
pub trait Stage: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;
}

/// Appends variant-specific stages to a pipeline
pub trait PipelineCustomizer: Send + Sync {
    fn custom_stages(&self, pipeline: &mut Pipeline);
}

/// Variants without stages of their own
impl PipelineCustomizer for () {
    fn custom_stages(&self, _pipeline: &mut Pipeline) {}
}

/// Wire-level trace logging, added when trace logging is enabled
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingStage;

impl Stage for LoggingStage {
    fn name(&self) -> &str {
        "logging"
    }
}

/// Ordered list of stages
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_last(&mut self, stage: Arc<dyn Stage>) {
        self.stages.push(stage);
    }

    pub fn stages(&self) -> &[Arc<dyn Stage>] {
        &self.stages
    }

    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Named(&'static str);

    impl Stage for Named {
        fn name(&self) -> &str {
            self.0
        }
    }

    struct KvStages;

    impl PipelineCustomizer for KvStages {
        fn custom_stages(&self, pipeline: &mut Pipeline) {
            pipeline.add_last(Arc::new(Named("kv-codec")));
            pipeline.add_last(Arc::new(Named("kv-auth")));
        }
    }

    #[test]
    fn test_customizer_appends_in_order() {
        let mut pipeline = Pipeline::new();
        pipeline.add_last(Arc::new(LoggingStage));
        KvStages.custom_stages(&mut pipeline);

        assert_eq!(pipeline.names(), vec!["logging", "kv-codec", "kv-auth"]);
    }

    #[test]
    fn test_unit_customizer_adds_nothing() {
        let mut pipeline = Pipeline::new();
        ().custom_stages(&mut pipeline);
        assert!(pipeline.is_empty());
    }
}
