use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use log::{debug, info};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use super::engine::{apply_growth, retirement_draw, tax_profile, validate_scenario};
use super::error::{ConfigError, SimulationError};
use super::types::{
    BalancePercentiles, Scenario, SimulationSettings, SimulationSummary, SurvivalProbabilities,
    total_balance,
};

pub const SURVIVAL_CHECKPOINTS: [u32; 5] = [70, 80, 90, 95, 100];
const SIMULATION_AGE_CAP: u32 = 100;

/// Cancellation is observed between trials; a started trial always runs to completion.
#[derive(Debug, Default)]
pub struct SimulationControl {
    cancelled: AtomicBool,
    completed: AtomicU32,
    total: AtomicU32,
}

impl SimulationControl {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u32 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u32 {
        self.total.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy)]
struct TrialResult {
    final_balance: f64,
    solvent_at: [bool; SURVIVAL_CHECKPOINTS.len()],
}

pub fn simulate(
    scenario: &Scenario,
    settings: &SimulationSettings,
) -> Result<SimulationSummary, SimulationError> {
    simulate_with_control(scenario, settings, &SimulationControl::default())
}

pub fn simulate_with_control(
    scenario: &Scenario,
    settings: &SimulationSettings,
    control: &SimulationControl,
) -> Result<SimulationSummary, SimulationError> {
    validate_settings(settings)?;
    validate_scenario(scenario)?;

    control.total.store(settings.trials, Ordering::Relaxed);
    control.completed.store(0, Ordering::Relaxed);
    debug!(
        "running {} trials with volatility {:.4}, seed {}",
        settings.trials, settings.volatility, settings.seed
    );

    let results: Option<Vec<TrialResult>> = (0..settings.trials)
        .into_par_iter()
        .map(|trial_id| {
            if control.is_cancelled() {
                return None;
            }
            let mut rng = SmallRng::seed_from_u64(derive_seed(settings.seed, trial_id));
            let result = run_trial(scenario, settings.volatility, &mut rng);
            control.completed.fetch_add(1, Ordering::Relaxed);
            Some(result)
        })
        .collect();

    let Some(results) = results else {
        info!(
            "simulation cancelled after {} of {} trials",
            control.completed(),
            settings.trials
        );
        return Err(SimulationError::Cancelled);
    };

    let summary = summarize(&results);
    info!(
        "simulation complete: {} trials, median final balance {:.0}, success rate {:.3}",
        summary.total_simulations, summary.percentiles.p50, summary.success_rate
    );
    Ok(summary)
}

fn validate_settings(settings: &SimulationSettings) -> Result<(), ConfigError> {
    if settings.trials == 0 {
        return Err(ConfigError::NoTrials);
    }
    if !settings.volatility.is_finite() {
        return Err(ConfigError::NonFiniteValue {
            field: "volatility".to_string(),
        });
    }
    if settings.volatility < 0.0 {
        return Err(ConfigError::NegativeVolatility(settings.volatility));
    }
    Ok(())
}

fn run_trial<R: Rng>(scenario: &Scenario, volatility: f64, rng: &mut R) -> TrialResult {
    let profile = tax_profile(scenario);
    let mut accounts = scenario.accounts.clone();
    let last_age = scenario.max_age.min(SIMULATION_AGE_CAP);

    // Latest age whose post-growth, pre-withdrawal balance was positive.
    let mut last_funded_age: Option<u32> = None;

    for age in scenario.current_age..=last_age {
        let shock = if volatility > 0.0 {
            rng.random_range(-1.0_f64..1.0) * volatility
        } else {
            0.0
        };
        apply_growth(&mut accounts, scenario.return_for_age(age) + shock);
        if total_balance(&accounts) > 0.0 {
            last_funded_age = Some(age);
        }

        let _ = retirement_draw(scenario, &mut accounts, age, profile);

        if total_balance(&accounts) <= 0.0 {
            break;
        }
    }

    let mut solvent_at = [false; SURVIVAL_CHECKPOINTS.len()];
    for (slot, checkpoint) in solvent_at.iter_mut().zip(SURVIVAL_CHECKPOINTS) {
        *slot = last_funded_age.is_some_and(|age| age >= checkpoint);
    }

    TrialResult {
        final_balance: total_balance(&accounts).max(0.0),
        solvent_at,
    }
}

fn summarize(results: &[TrialResult]) -> SimulationSummary {
    let mut balances: Vec<f64> = results.iter().map(|r| r.final_balance).collect();
    balances.sort_by(|a, b| a.total_cmp(b));

    let n = results.len();
    let survival = |idx: usize| -> f64 {
        if n == 0 {
            return 0.0;
        }
        results.iter().filter(|r| r.solvent_at[idx]).count() as f64 / n as f64
    };
    let success_rate = if n == 0 {
        0.0
    } else {
        balances.iter().filter(|b| **b > 0.0).count() as f64 / n as f64
    };

    SimulationSummary {
        percentiles: BalancePercentiles {
            p10: percentile_at(&balances, 0.10),
            p25: percentile_at(&balances, 0.25),
            p50: percentile_at(&balances, 0.50),
            p75: percentile_at(&balances, 0.75),
            p90: percentile_at(&balances, 0.90),
        },
        survival_probabilities: SurvivalProbabilities {
            age70: survival(0),
            age80: survival(1),
            age90: survival(2),
            age95: survival(3),
            age100: survival(4),
        },
        success_rate,
        total_simulations: n as u32,
    }
}

fn percentile_at(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64 * p).floor() as usize).min(sorted.len() - 1);
    sorted[idx]
}

fn derive_seed(base_seed: u64, trial_id: u32) -> u64 {
    splitmix64(base_seed ^ ((trial_id as u64) << 32) ^ trial_id as u64)
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}
