use grounded_core::PipelineSettings;
use std::time::Duration;

/// Resolved settings for one orchestrator instance.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub top_k: usize,
    pub confidence_threshold: f32,
    pub min_relevance_score: f32,
    pub generation_timeout: Duration,
    /// Overall budget for retrieval plus generation
    pub query_deadline: Option<Duration>,
    pub audit_timeout: Duration,
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub prompt_id: String,
}

impl PipelineConfig {
    pub fn from_settings(
        settings: &PipelineSettings,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            top_k: settings.top_k,
            confidence_threshold: settings.confidence_threshold,
            min_relevance_score: settings.min_relevance_score,
            generation_timeout: Duration::from_secs(settings.generation_timeout_secs),
            query_deadline: settings.query_deadline_secs.map(Duration::from_secs),
            audit_timeout: Duration::from_millis(settings.audit_timeout_ms),
            provider: provider.into(),
            model: model.into(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            prompt_id: settings.prompt_id.clone(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_settings(&PipelineSettings::default(), "ollama", "llama3.2")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_settings() {
        let settings = PipelineSettings {
            top_k: 3,
            query_deadline_secs: None,
            audit_timeout_ms: 250,
            ..Default::default()
        };
        let config = PipelineConfig::from_settings(&settings, "ollama", "mistral");

        assert_eq!(config.top_k, 3);
        assert_eq!(config.query_deadline, None);
        assert_eq!(config.audit_timeout, Duration::from_millis(250));
        assert_eq!(config.generation_timeout, Duration::from_secs(60));
        assert_eq!(config.model, "mistral");
    }

    #[test]
    fn test_default_threshold() {
        assert!((PipelineConfig::default().confidence_threshold - 0.7).abs() < f32::EPSILON);
    }
}
