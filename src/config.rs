use crate::DowserResult;
use crate::error::DowserError;
use crate::repr::MAX_REPR_LEN;
use std::env;

pub const ENV_MAX_RESULTS: &str = "DOWSER_MAX_RESULTS";
pub const ENV_MAX_DEPTH: &str = "DOWSER_MAX_DEPTH";
pub const ENV_REPR_LIMIT: &str = "DOWSER_REPR_LIMIT";

/// Limits for one walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkConfig {
    /// 0 means unbounded.
    pub max_results: usize,
    /// `None` or `Some(0)` means unbounded.
    pub max_depth: Option<usize>,
    pub repr_limit: usize,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            max_results: 100,
            max_depth: None,
            repr_limit: MAX_REPR_LEN,
        }
    }
}

impl WalkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `DOWSER_MAX_RESULTS`, `DOWSER_MAX_DEPTH` and
    /// `DOWSER_REPR_LIMIT`.
    pub fn from_env() -> DowserResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> DowserResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_MAX_RESULTS) {
            config.max_results = parse(ENV_MAX_RESULTS, &value)?;
        }
        if let Some(value) = lookup(ENV_MAX_DEPTH) {
            config.max_depth = Some(parse(ENV_MAX_DEPTH, &value)?)
                .filter(|&depth| depth > 0);
        }
        if let Some(value) = lookup(ENV_REPR_LIMIT) {
            config.repr_limit = parse(ENV_REPR_LIMIT, &value)?;
        }

        Ok(config)
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_repr_limit(mut self, repr_limit: usize) -> Self {
        self.repr_limit = repr_limit;
        self
    }
}

fn parse(key: &'static str, value: &str) -> DowserResult<usize> {
    value.trim().parse().map_err(|_| DowserError::Config {
        key,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = WalkConfig::default();
        assert_eq!(config.max_results, 100);
        assert_eq!(config.max_depth, None);
        assert_eq!(config.repr_limit, 250);
    }

    #[test]
    fn test_overrides() {
        let config = WalkConfig::from_lookup(lookup(&[
            (ENV_MAX_RESULTS, "0"),
            (ENV_MAX_DEPTH, " 4 "),
            (ENV_REPR_LIMIT, "80"),
        ]))
        .unwrap();

        assert_eq!(config.max_results, 0);
        assert_eq!(config.max_depth, Some(4));
        assert_eq!(config.repr_limit, 80);
    }

    #[test]
    fn test_zero_depth_means_unbounded() {
        let config = WalkConfig::from_lookup(lookup(&[(ENV_MAX_DEPTH, "0")]))
            .unwrap();
        assert_eq!(config.max_depth, None);
    }

    #[test]
    fn test_invalid_value() {
        let err = WalkConfig::from_lookup(lookup(&[(ENV_MAX_RESULTS, "many")]))
            .unwrap_err();
        assert_eq!(
            err,
            DowserError::Config {
                key: ENV_MAX_RESULTS,
                value: "many".to_string(),
            }
        );
    }

    #[test]
    fn test_builders() {
        let config = WalkConfig::new()
            .with_max_results(5)
            .with_max_depth(Some(2))
            .with_repr_limit(40);
        assert_eq!(
            (config.max_results, config.max_depth, config.repr_limit),
            (5, Some(2), 40)
        );
    }
}
