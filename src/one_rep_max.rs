//! One-rep-max estimates and working-weight tables
//!
//! - Epley: 1RM = weight × (1 + reps/30)
//! - Brzycki: 1RM = weight × 36 / (37 - reps)
//! - NSCA: 1RM = weight × (1 + 0.033 × reps)

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Standard training percentages of 1RM
pub const TRAINING_PERCENTAGES: [u32; 8] = [50, 60, 70, 75, 80, 85, 90, 95];

/// Default plate step, kg
pub const DEFAULT_STEP: f64 = 2.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Formula {
    #[default]
    Epley,
    Brzycki,
    Nsca,
}

impl Formula {
    /// Estimated 1RM from a set of `reps` with `weight`
    pub fn estimate(self, weight: f64, reps: u32) -> f64 {
        if reps <= 1 {
            return weight;
        }
        let reps = reps as f64;
        match self {
            Formula::Epley => weight * (1.0 + reps / 30.0),
            Formula::Brzycki => {
                // formula breaks down at 37 reps
                if reps >= 37.0 {
                    weight * 2.0
                } else {
                    weight * (36.0 / (37.0 - reps))
                }
            }
            Formula::Nsca => weight * (1.0 + 0.033 * reps),
        }
    }
}

/// One row of the percentage table
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PercentWeight {
    pub percent: u32,
    /// Rounded to 0.1 kg
    pub weight: f64,
    /// Rounded to the plate step
    pub rounded_weight: f64,
}

fn round_tenth(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Weight for a percentage of 1RM, rounded to 0.1
pub fn weight_for_percent(one_rm: f64, percent: u32) -> f64 {
    round_tenth(one_rm * percent as f64 / 100.0)
}

/// Round to the nearest available load
pub fn round_to_step(weight: f64, step: f64) -> f64 {
    (weight / step).round() * step
}

/// Working weights for every training percentage
pub fn percentage_table(one_rm: f64, step: f64) -> Vec<PercentWeight> {
    TRAINING_PERCENTAGES
        .iter()
        .map(|&percent| {
            let exact = one_rm * percent as f64 / 100.0;
            PercentWeight {
                percent,
                weight: round_tenth(exact),
                rounded_weight: round_to_step(exact, step),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_single_rep_is_weight() {
        for f in [Formula::Epley, Formula::Brzycki, Formula::Nsca] {
            assert_eq!(f.estimate(100.0, 1), 100.0);
            assert_eq!(f.estimate(100.0, 0), 100.0);
        }
    }

    #[test]
    fn test_epley() {
        assert!(approx(Formula::Epley.estimate(100.0, 10), 133.33333333333334));
    }

    #[test]
    fn test_brzycki() {
        assert!(approx(Formula::Brzycki.estimate(100.0, 10), 100.0 * 36.0 / 27.0));
        assert_eq!(Formula::Brzycki.estimate(50.0, 40), 100.0);
    }

    #[test]
    fn test_nsca() {
        assert!(approx(Formula::Nsca.estimate(100.0, 5), 116.5));
    }

    #[test]
    fn test_weight_for_percent() {
        assert_eq!(weight_for_percent(123.0, 75), 92.3);
    }

    #[test]
    fn test_round_to_step() {
        assert_eq!(round_to_step(92.25, 2.5), 92.5);
        assert_eq!(round_to_step(91.0, 5.0), 90.0);
    }

    #[test]
    fn test_percentage_table() {
        let table = percentage_table(100.0, DEFAULT_STEP);
        assert_eq!(table.len(), TRAINING_PERCENTAGES.len());
        assert_eq!(table[0], PercentWeight { percent: 50, weight: 50.0, rounded_weight: 50.0 });
        assert_eq!(table[3].percent, 75);
        assert_eq!(table[3].rounded_weight, 75.0);
    }
}
