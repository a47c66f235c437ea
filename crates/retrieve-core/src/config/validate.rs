//! Configuration validation with range checks.

use crate::error::ConfigError;
use crate::output::OutputFormat;
use crate::retrieval::Metric;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.processing.parallel_workers == 0 {
            return Err(ConfigError::ValidationError(
                "processing.parallel_workers must be > 0".into(),
            ));
        }
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.limits.decode_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.decode_timeout_ms must be > 0".into(),
            ));
        }
        if self.limits.embed_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.embed_timeout_ms must be > 0".into(),
            ));
        }
        if self.embedding.image_size == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.image_size must be > 0".into(),
            ));
        }
        if !matches!(self.embedding.channels, 1 | 3) {
            return Err(ConfigError::ValidationError(format!(
                "embedding.channels must be 1 or 3, got {}",
                self.embedding.channels
            )));
        }
        if self.embedding.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.batch_size must be > 0".into(),
            ));
        }
        if !(self.retrieval.minkowski_p >= 1.0) {
            return Err(ConfigError::ValidationError(
                "retrieval.minkowski_p must be >= 1".into(),
            ));
        }
        for name in [&self.retrieval.metric, &self.retrieval.knn_metric] {
            Metric::parse(name, self.retrieval.minkowski_p)
                .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        }
        if self.retrieval.knn_neighbors == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.knn_neighbors must be > 0".into(),
            ));
        }
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be > 0".into(),
            ));
        }
        if self.retrieval.report_ks.is_empty() || self.retrieval.report_ks.contains(&0) {
            return Err(ConfigError::ValidationError(
                "retrieval.report_ks must be non-empty and contain only positive values".into(),
            ));
        }
        if self.submission.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "submission.timeout_ms must be > 0".into(),
            ));
        }
        if OutputFormat::parse(&self.output.format).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "output.format must be json or jsonl, got {:?}",
                self.output.format
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_parallel_workers() {
        let mut config = Config::default();
        config.processing.parallel_workers = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("parallel_workers"));
    }

    #[test]
    fn test_validate_rejects_bad_channels() {
        let mut config = Config::default();
        config.embedding.channels = 4;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("channels"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.limits.decode_timeout_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("decode_timeout_ms"));
    }

    #[test]
    fn test_validate_rejects_unknown_knn_metric() {
        let mut config = Config::default();
        config.retrieval.knn_metric = "jaccard".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("jaccard"));
    }

    #[test]
    fn test_validate_rejects_fractional_minkowski() {
        let mut config = Config::default();
        config.retrieval.minkowski_p = 0.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("minkowski_p"));
    }

    #[test]
    fn test_validate_rejects_nan_minkowski() {
        let mut config = Config::default();
        config.retrieval.minkowski_p = f64::NAN;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("minkowski_p"));
    }

    #[test]
    fn test_validate_rejects_zero_report_k() {
        let mut config = Config::default();
        config.retrieval.report_ks = vec![1, 0];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("report_ks"));

        config.retrieval.report_ks.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_output_format() {
        let mut config = Config::default();
        config.output.format = "csv".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("output.format"));
    }
}
