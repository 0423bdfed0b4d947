use rand::Rng;
use tracing::debug;

use crate::config::Config;
use crate::error::GenerateError;

/// One sum: the numbers read out in order.
pub type QuestionRow = Vec<i64>;
/// Every row of a session.
pub type QuestionSet = Vec<QuestionRow>;

/// Builds the rows of a drill.
///
/// By default a row keeps drawing until it is full, which never returns for
/// configurations with fewer valid numbers than `questions_each_sum`
/// (e.g. one digit and twenty questions). `with_max_draws` turns that hang
/// into a `GenerateError::Exhausted`.
#[derive(Debug, Clone, Default)]
pub struct QuestionSetGenerator {
    max_draws_per_row: Option<u64>,
}

impl QuestionSetGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_draws(mut self, max_draws_per_row: Option<u64>) -> Self {
        self.max_draws_per_row = max_draws_per_row;
        self
    }

    pub fn generate<R: Rng + ?Sized>(
        &self,
        config: &Config,
        rng: &mut R,
    ) -> Result<QuestionSet, GenerateError> {
        config.validate()?;
        let mut set = Vec::with_capacity(config.total_sums);
        while set.len() < config.total_sums {
            let row = self.generate_row(config, rng, set.len())?;
            set.push(row);
        }
        debug!(rows = set.len(), "generated question set");
        Ok(set)
    }

    fn generate_row<R: Rng + ?Sized>(
        &self,
        config: &Config,
        rng: &mut R,
        index: usize,
    ) -> Result<QuestionRow, GenerateError> {
        let mut row = Vec::with_capacity(config.questions_each_sum);
        let mut draws = 0u64;
        while row.len() < config.questions_each_sum {
            if let Some(max) = self.max_draws_per_row {
                if draws >= max {
                    return Err(GenerateError::Exhausted { row: index, draws });
                }
            }
            draws += 1;
            let candidate = draw_number(config.digits, config.negative_percentage, rng);
            if accepts(&row, candidate) {
                row.push(candidate);
            }
        }
        Ok(row)
    }
}

/// Generate with the thread rng and no draw cap.
pub fn generate(config: &Config) -> Result<QuestionSet, GenerateError> {
    QuestionSetGenerator::new().generate(config, &mut rand::thread_rng())
}

/// A number of exactly `digits` digits, negated with probability
/// `negative_chance`.
pub fn draw_number<R: Rng + ?Sized>(digits: u32, negative_chance: f64, rng: &mut R) -> i64 {
    let low = 10i64.pow(digits - 1);
    let high = 10i64.pow(digits) - 1;
    let n = rng.gen_range(low..=high);
    if rng.gen_bool(negative_chance.clamp(0.0, 1.0)) {
        -n
    } else {
        n
    }
}

/// A candidate joins the row only if it is new and keeps the running total
/// positive. A total that leaves `i64` is rejected like any other bad draw.
pub fn accepts(row: &[i64], candidate: i64) -> bool {
    !row.contains(&candidate)
        && row_sum(row)
            .and_then(|total| total.checked_add(candidate))
            .is_some_and(|total| total > 0)
}

/// `None` when the total does not fit an `i64`, which only happens for rows
/// loaded from a hand-edited state file.
pub fn row_sum(row: &[i64]) -> Option<i64> {
    row.iter().try_fold(0i64, |acc, n| acc.checked_add(*n))
}
