use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Widest number that fits an `i64`. Whether a whole row fits as well
/// depends on `questions_each_sum`, see [`Config::validate`].
pub const MAX_DIGITS: u32 = 18;

/// Drill settings. Persisted under the `config` key and copied into the
/// drill when a session starts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub total_sums: usize,
    pub questions_each_sum: usize,
    pub digits: u32,
    pub negative_percentage: f64,
    #[serde(alias = "delayBetweenQuestionsInMilliseconds")]
    pub delay_between_questions_ms: u64,
    pub playback_rate: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            total_sums: 30,
            questions_each_sum: 4,
            digits: 3,
            negative_percentage: 0.0,
            delay_between_questions_ms: 500,
            playback_rate: 1.1,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total_sums == 0 {
            return Err(ConfigError::NoSums);
        }
        if self.questions_each_sum == 0 {
            return Err(ConfigError::NoQuestions);
        }
        if self.digits == 0 || self.digits > MAX_DIGITS {
            return Err(ConfigError::Digits {
                got: self.digits,
                max: MAX_DIGITS,
            });
        }
        if !(0.0..=1.0).contains(&self.negative_percentage) {
            return Err(ConfigError::NegativePercentage(self.negative_percentage));
        }
        if !self.playback_rate.is_finite() || self.playback_rate <= 0.0 {
            return Err(ConfigError::PlaybackRate(self.playback_rate));
        }
        if self.largest_row_sum().is_none() {
            return Err(ConfigError::RowTooWide {
                digits: self.digits,
                questions: self.questions_each_sum,
            });
        }
        Ok(())
    }

    /// Total of a row made only of the widest positive numbers.
    fn largest_row_sum(&self) -> Option<i64> {
        let widest = 10i64.checked_pow(self.digits)? - 1;
        widest.checked_mul(i64::try_from(self.questions_each_sum).ok()?)
    }

    pub fn delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.delay_between_questions_ms)
    }

    /// Apply command-line overrides on top of the persisted values.
    pub fn with_overrides(mut self, o: &ConfigOverrides) -> Self {
        if let Some(v) = o.total_sums {
            self.total_sums = v;
        }
        if let Some(v) = o.questions_each_sum {
            self.questions_each_sum = v;
        }
        if let Some(v) = o.digits {
            self.digits = v;
        }
        if let Some(v) = o.negative_percentage {
            self.negative_percentage = v;
        }
        if let Some(v) = o.delay_ms {
            self.delay_between_questions_ms = v;
        }
        if let Some(v) = o.playback_rate {
            self.playback_rate = v;
        }
        self
    }
}

/// Optional per-field overrides, usually filled from the command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub total_sums: Option<usize>,
    pub questions_each_sum: Option<usize>,
    pub digits: Option<u32>,
    pub negative_percentage: Option<f64>,
    pub delay_ms: Option<u64>,
    pub playback_rate: Option<f32>,
}

impl ConfigOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn default_matches_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.total_sums, 30);
        assert_eq!(cfg.questions_each_sum, 4);
        assert_eq!(cfg.digits, 3);
        assert_eq!(cfg.negative_percentage, 0.0);
        assert_eq!(cfg.delay_between_questions_ms, 500);
        assert_eq!(cfg.playback_rate, 1.1);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert_eq!(json["totalSums"], 30);
        assert_eq!(json["questionsEachSum"], 4);
        assert_eq!(json["delayBetweenQuestionsMs"], 500);
        assert!(json.get("playbackRate").is_some());
    }

    #[test]
    fn accepts_long_delay_key() {
        let json = r#"{"totalSums":5,"questionsEachSum":3,"digits":2,"negativePercentage":0.3,
            "delayBetweenQuestionsInMilliseconds":250,"playbackRate":1.5}"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.delay_between_questions_ms, 250);
        assert_eq!(cfg.total_sums, 5);
    }

    #[test]
    fn validate_rejects_out_of_range_fields() {
        let base = Config::default();
        assert_matches!(
            Config { total_sums: 0, ..base.clone() }.validate(),
            Err(ConfigError::NoSums)
        );
        assert_matches!(
            Config { questions_each_sum: 0, ..base.clone() }.validate(),
            Err(ConfigError::NoQuestions)
        );
        assert_matches!(
            Config { digits: 0, ..base.clone() }.validate(),
            Err(ConfigError::Digits { got: 0, .. })
        );
        assert_matches!(
            Config { digits: 19, ..base.clone() }.validate(),
            Err(ConfigError::Digits { got: 19, .. })
        );
        assert_matches!(
            Config { negative_percentage: 1.5, ..base.clone() }.validate(),
            Err(ConfigError::NegativePercentage(_))
        );
        assert_matches!(
            Config { playback_rate: 0.0, ..base.clone() }.validate(),
            Err(ConfigError::PlaybackRate(_))
        );
        assert_matches!(
            Config { playback_rate: f32::NAN, ..base.clone() }.validate(),
            Err(ConfigError::PlaybackRate(_))
        );
        assert_matches!(
            Config { playback_rate: f32::INFINITY, ..base.clone() }.validate(),
            Err(ConfigError::PlaybackRate(_))
        );
        assert_matches!(
            Config { digits: 18, questions_each_sum: 20, ..base.clone() }.validate(),
            Err(ConfigError::RowTooWide { digits: 18, questions: 20 })
        );
        assert!(Config { digits: 18, questions_each_sum: 9, ..base }.validate().is_ok());
    }

    #[test]
    fn accepted_config_survives_json() {
        // json has no infinity; a rate that validates must load back unchanged
        let cfg = Config {
            playback_rate: f32::MAX,
            ..Config::default()
        };
        assert!(cfg.validate().is_ok());
        let back: Config = serde_json::from_str(&serde_json::to_string(&cfg).unwrap()).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn overrides_replace_only_given_fields() {
        let overrides = ConfigOverrides {
            digits: Some(2),
            delay_ms: Some(0),
            ..Default::default()
        };
        let cfg = Config::default().with_overrides(&overrides);
        assert_eq!(cfg.digits, 2);
        assert_eq!(cfg.delay_between_questions_ms, 0);
        assert_eq!(cfg.total_sums, 30);
        assert!(!overrides.is_empty());
        assert!(ConfigOverrides::default().is_empty());
    }
}
