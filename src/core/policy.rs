use serde::{Deserialize, Serialize};

use super::types::{InvestmentAccount, WithdrawalMode, WithdrawalTier, total_balance};

pub const DEFAULT_WITHDRAWAL_RATE: f64 = 0.04;

pub fn target_withdrawal(
    age: u32,
    total_balance: f64,
    tiers: &[WithdrawalTier],
    mode: WithdrawalMode,
) -> f64 {
    match tiers.iter().find(|t| t.contains(age)) {
        Some(tier) => match mode {
            WithdrawalMode::Percentage => total_balance * (tier.rate / 100.0),
            WithdrawalMode::Dollar => tier.dollar_amount,
        },
        None => total_balance * DEFAULT_WITHDRAWAL_RATE,
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Preset {
    Conservative,
    Moderate,
    Aggressive,
    AgeDecreasing,
    DieWithNothing,
}

impl Preset {
    pub const ALL: [Preset; 5] = [
        Preset::Conservative,
        Preset::Moderate,
        Preset::Aggressive,
        Preset::AgeDecreasing,
        Preset::DieWithNothing,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Preset::Conservative => "Conservative",
            Preset::Moderate => "Moderate",
            Preset::Aggressive => "Aggressive",
            Preset::AgeDecreasing => "Age-Decreasing",
            Preset::DieWithNothing => "Die with Nothing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetStrategy {
    pub preset: Preset,
    pub name: &'static str,
    pub mode: WithdrawalMode,
    pub tiers: Vec<WithdrawalTier>,
}

fn tier(age_start: u32, age_end: u32, rate: f64, dollar_amount: f64) -> WithdrawalTier {
    WithdrawalTier {
        age_start,
        age_end,
        rate,
        dollar_amount,
    }
}

pub fn preset_strategy(
    preset: Preset,
    retirement_age: u32,
    max_age: u32,
    accounts: &[InvestmentAccount],
) -> PresetStrategy {
    let r = retirement_age;
    let (mode, tiers) = match preset {
        Preset::Conservative => (
            WithdrawalMode::Percentage,
            vec![tier(r, max_age, 3.5, 45_000.0)],
        ),
        Preset::Moderate => (
            WithdrawalMode::Percentage,
            vec![
                tier(r, r.saturating_add(5), 3.5, 50_000.0),
                tier(r.saturating_add(6), max_age, 4.0, 60_000.0),
            ],
        ),
        Preset::Aggressive => (
            WithdrawalMode::Percentage,
            vec![tier(r, max_age, 5.0, 75_000.0)],
        ),
        Preset::AgeDecreasing => (
            WithdrawalMode::Percentage,
            vec![
                tier(r, r.saturating_add(5), 4.5, 70_000.0),
                tier(r.saturating_add(6), r.saturating_add(15), 3.5, 55_000.0),
                tier(r.saturating_add(16), max_age, 2.5, 40_000.0),
            ],
        ),
        Preset::DieWithNothing => {
            let years_in_retirement = max_age.saturating_sub(r).max(1);
            let annual = total_balance(accounts) / years_in_retirement as f64;
            (WithdrawalMode::Dollar, vec![tier(r, max_age, 0.0, annual)])
        }
    };

    PresetStrategy {
        preset,
        name: preset.label(),
        mode,
        tiers,
    }
}

pub fn align_tiers(tiers: &[WithdrawalTier], retirement_age: u32) -> Vec<WithdrawalTier> {
    let mut aligned = tiers.to_vec();
    if let Some(first) = aligned.first_mut() {
        first.age_start = retirement_age;
    }
    for i in 1..aligned.len() {
        let min_start = aligned[i - 1].age_end.saturating_add(1);
        if aligned[i].age_start < min_start {
            aligned[i].age_start = min_start;
        }
    }
    aligned
}

pub fn next_tier(tiers: &[WithdrawalTier], max_age: u32) -> WithdrawalTier {
    let age_start = tiers.last().map(|t| t.age_end.saturating_add(1)).unwrap_or(max_age);
    tier(age_start, max_age, 4.0, 60_000.0)
}
