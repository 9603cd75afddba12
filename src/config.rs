//!
//! Tick job configuration.
//!

/// Tunables of `AnimationJob`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AnimationConfig {
    /// Runs the per bone, per flag word and per instance passes on the rayon pool.
    pub parallel: bool,
    /// Minimum number of bones processed by one rayon task.
    pub min_bones_per_task: usize,
    /// Extracts root motion of the instances requesting it. Disabled, root bones keep their
    /// blended pose and no history is recorded.
    pub root_motion: bool,
    /// Scans clip events.
    pub emit_events: bool,
}

impl Default for AnimationConfig {
    fn default() -> AnimationConfig {
        return AnimationConfig {
            parallel: true,
            min_bones_per_task: 64,
            root_motion: true,
            emit_events: true,
        };
    }
}

impl AnimationConfig {
    /// Configuration running every pass on the calling thread.
    pub fn sequential() -> AnimationConfig {
        return AnimationConfig {
            parallel: false,
            ..Default::default()
        };
    }
}

#[cfg(all(test, feature = "serde"))]
mod config_tests {
    use super::*;

    #[test]
    fn test_serde_defaults() {
        let config: AnimationConfig = serde_json::from_str(r#"{"parallel": false}"#).unwrap();
        assert_eq!(config, AnimationConfig::sequential());

        let json = serde_json::to_string(&AnimationConfig::default()).unwrap();
        let config: AnimationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, AnimationConfig::default());
    }
}
