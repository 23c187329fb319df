use std::collections::HashSet;

use log::debug;

use super::error::ConfigError;
use super::income::{fixed_income, stream_payments};
use super::policy::target_withdrawal;
use super::tax::TaxProfile;
use super::types::{
    AccountBalance, InvestmentAccount, Scenario, WithdrawalOutcome, YearSnapshot, total_balance,
};
use super::waterfall::withdraw;

#[derive(Debug, Clone, Default)]
pub(crate) struct RetirementDraw {
    pub target: f64,
    pub outcome: WithdrawalOutcome,
}

pub const MAX_SUPPORTED_AGE: u32 = 150;

pub fn validate_scenario(scenario: &Scenario) -> Result<(), ConfigError> {
    for (field, age) in [
        ("currentAge", scenario.current_age),
        ("retirementAge", scenario.retirement_age),
        ("maxAge", scenario.max_age),
    ] {
        if age > MAX_SUPPORTED_AGE {
            return Err(ConfigError::AgeOutOfRange {
                field: field.to_string(),
                age,
                limit: MAX_SUPPORTED_AGE,
            });
        }
    }
    if scenario.current_age > scenario.retirement_age {
        return Err(ConfigError::CurrentAgeAfterRetirement {
            current_age: scenario.current_age,
            retirement_age: scenario.retirement_age,
        });
    }
    if scenario.retirement_age > scenario.max_age {
        return Err(ConfigError::RetirementAfterMaxAge {
            retirement_age: scenario.retirement_age,
            max_age: scenario.max_age,
        });
    }

    let mut finite_checks = vec![
        ("flatTaxRate".to_string(), scenario.flat_tax_rate),
        ("preRetirementReturn".to_string(), scenario.pre_retirement_return),
        ("postRetirementReturn".to_string(), scenario.post_retirement_return),
    ];
    for acc in &scenario.accounts {
        finite_checks.push((format!("accounts[{}].balance", acc.id), acc.balance));
        finite_checks.push((format!("accounts[{}].minAge", acc.id), acc.min_age));
    }
    for stream in &scenario.income_streams {
        finite_checks.push((format!("incomeStreams[{}].amount", stream.id), stream.amount));
        finite_checks.push((format!("incomeStreams[{}].cola", stream.id), stream.cola));
    }
    for (idx, tier) in scenario.withdrawal_tiers.iter().enumerate() {
        finite_checks.push((format!("withdrawalTiers[{idx}].rate"), tier.rate));
        finite_checks.push((
            format!("withdrawalTiers[{idx}].dollarAmount"),
            tier.dollar_amount,
        ));
    }
    if let Some((field, _)) = finite_checks.into_iter().find(|(_, v)| !v.is_finite()) {
        return Err(ConfigError::NonFiniteValue { field });
    }

    let mut seen = HashSet::new();
    for acc in &scenario.accounts {
        if !seen.insert(acc.id) {
            return Err(ConfigError::DuplicateAccountId(acc.id));
        }
    }

    Ok(())
}

pub(crate) fn tax_profile(scenario: &Scenario) -> TaxProfile {
    TaxProfile {
        ordinary_rate: scenario.flat_tax_rate,
        filing_status: scenario.filing_status,
    }
}

pub(crate) fn apply_growth(accounts: &mut [InvestmentAccount], rate: f64) {
    for account in accounts.iter_mut() {
        account.balance *= 1.0 + rate;
    }
}

// The waterfall drains a scratch copy; draws are subtracted from the live balances by id.
pub(crate) fn retirement_draw(
    scenario: &Scenario,
    accounts: &mut [InvestmentAccount],
    age: u32,
    profile: TaxProfile,
) -> Option<RetirementDraw> {
    let balance = total_balance(accounts);
    if age < scenario.retirement_age || balance <= 0.0 {
        return None;
    }

    let target = target_withdrawal(
        age,
        balance,
        &scenario.withdrawal_tiers,
        scenario.withdrawal_mode,
    );
    let taxable_fixed = fixed_income(&scenario.income_streams, age).taxable;

    let mut scratch = accounts.to_vec();
    let outcome = withdraw(&mut scratch, target, taxable_fixed, age, profile);
    for w in &outcome.withdrawals {
        if let Some(live) = accounts.iter_mut().find(|a| a.id == w.account_id) {
            live.balance -= w.amount;
        }
    }

    Some(RetirementDraw { target, outcome })
}

pub fn project(scenario: &Scenario) -> Result<Vec<YearSnapshot>, ConfigError> {
    validate_scenario(scenario)?;
    debug!(
        "projecting ages {}..={} across {} accounts",
        scenario.current_age,
        scenario.max_age,
        scenario.accounts.len()
    );

    let profile = tax_profile(scenario);
    let mut accounts = scenario.accounts.clone();
    let mut years = Vec::with_capacity((scenario.max_age - scenario.current_age + 1) as usize);

    for age in scenario.current_age..=scenario.max_age {
        apply_growth(&mut accounts, scenario.return_for_age(age));

        let draw = retirement_draw(scenario, &mut accounts, age, profile).unwrap_or_default();

        let income = fixed_income(&scenario.income_streams, age);
        let fixed_income_taxes = income.taxable * scenario.flat_tax_rate;
        let total_taxes = draw.outcome.total_taxes + fixed_income_taxes;
        let withdrawal = draw.outcome.actual_withdrawn;
        let ending_balance = total_balance(&accounts);

        years.push(YearSnapshot {
            age,
            year: scenario.starting_year + (age - scenario.current_age) as i32,
            balance: ending_balance.max(0.0),
            target_withdrawal: draw.target,
            withdrawal,
            gross_fixed_income: income.gross,
            total_taxes,
            total_gross_income: withdrawal + income.gross,
            total_net_income: withdrawal + income.gross - total_taxes,
            account_balances: accounts
                .iter()
                .map(|a| AccountBalance {
                    id: a.id,
                    name: a.name.clone(),
                    balance: a.balance.max(0.0),
                })
                .collect(),
            withdrawals: draw.outcome.withdrawals,
            income_streams: stream_payments(&scenario.income_streams, age),
        });

        if ending_balance <= 0.0 {
            debug!("portfolio depleted at age {age}");
            break;
        }
    }

    Ok(years)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{
        AccountType, FilingStatus, IncomeStream, WithdrawalMode, WithdrawalTier,
    };
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn account(
        id: u32,
        balance: f64,
        account_type: AccountType,
        order: u32,
        min_age: f64,
    ) -> InvestmentAccount {
        InvestmentAccount {
            id,
            name: format!("acct-{id}"),
            balance,
            account_type,
            withdrawal_order: order,
            min_age,
        }
    }

    fn single_account_scenario() -> Scenario {
        Scenario {
            starting_year: 2025,
            max_age: 95,
            current_age: 65,
            retirement_age: 65,
            flat_tax_rate: 0.22,
            filing_status: FilingStatus::MarriedJoint,
            pre_retirement_return: 0.07,
            post_retirement_return: 0.05,
            withdrawal_mode: WithdrawalMode::Percentage,
            withdrawal_tiers: vec![WithdrawalTier {
                age_start: 65,
                age_end: 95,
                rate: 4.0,
                dollar_amount: 0.0,
            }],
            accounts: vec![account(1, 100_000.0, AccountType::Traditional, 1, 0.0)],
            income_streams: Vec::new(),
        }
    }

    fn household_scenario() -> Scenario {
        Scenario {
            starting_year: 2025,
            max_age: 95,
            current_age: 55,
            retirement_age: 60,
            flat_tax_rate: 0.22,
            filing_status: FilingStatus::MarriedJoint,
            pre_retirement_return: 0.07,
            post_retirement_return: 0.05,
            withdrawal_mode: WithdrawalMode::Percentage,
            withdrawal_tiers: vec![
                WithdrawalTier {
                    age_start: 60,
                    age_end: 70,
                    rate: 4.0,
                    dollar_amount: 40_000.0,
                },
                WithdrawalTier {
                    age_start: 71,
                    age_end: 95,
                    rate: 5.0,
                    dollar_amount: 50_000.0,
                },
            ],
            accounts: vec![
                account(1, 100_000.0, AccountType::Taxable, 1, 0.0),
                account(2, 300_000.0, AccountType::Traditional, 2, 59.5),
                account(3, 150_000.0, AccountType::Roth, 3, 59.5),
            ],
            income_streams: vec![
                IncomeStream {
                    id: 1,
                    name: "Pension".to_string(),
                    amount: 2_000.0,
                    is_annual: false,
                    start_age: 62,
                    end_age: 95,
                    taxable: true,
                    cola: 2.0,
                },
                IncomeStream {
                    id: 2,
                    name: "Disability".to_string(),
                    amount: 1_000.0,
                    is_annual: false,
                    start_age: 55,
                    end_age: 95,
                    taxable: false,
                    cola: 0.0,
                },
            ],
        }
    }

    #[test]
    fn first_retirement_year_matches_hand_calculation() {
        let years = project(&single_account_scenario()).expect("valid scenario");
        let first = &years[0];

        // 100000 * 1.05 = 105000; 4% target = 4200; 22% tax = 924.
        assert_eq!(first.age, 65);
        assert_eq!(first.year, 2025);
        assert_approx(first.target_withdrawal, 4_200.0);
        assert_approx(first.withdrawal, 4_200.0);
        assert_approx(first.total_taxes, 924.0);
        assert_approx(first.total_net_income, 3_276.0);
        assert_approx(first.total_gross_income, 4_200.0);
        assert_approx(first.balance, 100_800.0);
        assert_approx(first.account_balances[0].balance, 100_800.0);
        assert_eq!(first.withdrawals.len(), 1);
    }

    #[test]
    fn runs_through_max_age_inclusive() {
        let years = project(&single_account_scenario()).expect("valid scenario");
        assert_eq!(years.len(), 31);
        assert_eq!(years.last().map(|y| y.age), Some(95));
        assert_eq!(years.last().map(|y| y.year), Some(2055));
    }

    #[test]
    fn zero_balances_without_income_stop_after_first_year() {
        let mut scenario = single_account_scenario();
        scenario.current_age = 40;
        scenario.accounts[0].balance = 0.0;

        let years = project(&scenario).expect("valid scenario");
        assert_eq!(years.len(), 1);
        assert_eq!(years[0].age, 40);
        assert_approx(years[0].balance, 0.0);
    }

    #[test]
    fn depletion_in_dollar_mode_ends_projection() {
        let mut scenario = single_account_scenario();
        scenario.withdrawal_mode = WithdrawalMode::Dollar;
        scenario.withdrawal_tiers[0].dollar_amount = 60_000.0;
        scenario.post_retirement_return = 0.0;

        let years = project(&scenario).expect("valid scenario");
        assert_eq!(years.len(), 2);
        assert_approx(years[0].balance, 40_000.0);
        // Second year is a shortfall: only the remaining 40k can be drawn.
        assert_approx(years[1].target_withdrawal, 60_000.0);
        assert_approx(years[1].withdrawal, 40_000.0);
        assert_approx(years[1].balance, 0.0);
    }

    #[test]
    fn pre_retirement_years_grow_and_report_fixed_income() {
        let years = project(&household_scenario()).expect("valid scenario");
        let first = &years[0];
        assert_eq!(first.age, 55);
        assert_approx(first.withdrawal, 0.0);
        assert_approx(first.target_withdrawal, 0.0);
        assert_approx(first.balance, 550_000.0 * 1.07);
        assert_approx(first.gross_fixed_income, 12_000.0);
        assert_approx(first.total_taxes, 0.0);
        assert_approx(first.total_net_income, 12_000.0);
        assert_eq!(first.income_streams.len(), 1);
        assert_eq!(first.income_streams[0].id, 2);
    }

    #[test]
    fn fixed_income_tax_applies_to_taxable_streams_only() {
        let years = project(&household_scenario()).expect("valid scenario");
        let at_62 = years.iter().find(|y| y.age == 62).expect("age 62 present");
        let waterfall_tax: f64 = at_62.withdrawals.iter().map(|w| w.taxes).sum();
        assert_approx(at_62.gross_fixed_income, 36_000.0);
        assert_approx(at_62.total_taxes, waterfall_tax + 24_000.0 * 0.22);
        assert_approx(
            at_62.total_net_income,
            at_62.withdrawal + at_62.gross_fixed_income - at_62.total_taxes,
        );
    }

    #[test]
    fn withdrawals_follow_priority_and_age_gates() {
        let mut scenario = household_scenario();
        scenario.current_age = 58;
        scenario.retirement_age = 58;
        scenario.withdrawal_tiers[0].age_start = 58;
        scenario.accounts[0].balance = 1_000.0;

        let years = project(&scenario).expect("valid scenario");
        // At 58 only the taxable account is eligible.
        assert_eq!(years[0].withdrawals.len(), 1);
        assert_eq!(years[0].withdrawals[0].account_id, 1);
        assert!(years[0].withdrawal < years[0].target_withdrawal);
        // From 60 the traditional account picks up the remainder.
        let at_60 = years.iter().find(|y| y.age == 60).expect("age 60 present");
        assert_eq!(at_60.withdrawals[0].account_id, 2);
        assert_approx(at_60.withdrawal, at_60.target_withdrawal);
    }

    #[test]
    fn projection_does_not_mutate_the_scenario() {
        let scenario = household_scenario();
        let before = scenario.clone();
        let _ = project(&scenario).expect("valid scenario");
        assert_eq!(scenario, before);
    }

    #[test]
    fn rejects_invalid_age_ordering() {
        let mut scenario = single_account_scenario();
        scenario.current_age = 70;
        assert_eq!(
            project(&scenario),
            Err(ConfigError::CurrentAgeAfterRetirement {
                current_age: 70,
                retirement_age: 65
            })
        );

        let mut scenario = single_account_scenario();
        scenario.max_age = 60;
        scenario.current_age = 55;
        assert!(matches!(
            project(&scenario),
            Err(ConfigError::RetirementAfterMaxAge { .. })
        ));
    }

    #[test]
    fn rejects_ages_beyond_supported_horizon() {
        let mut scenario = single_account_scenario();
        scenario.max_age = 4_000_000_000;
        assert_eq!(
            project(&scenario),
            Err(ConfigError::AgeOutOfRange {
                field: "maxAge".to_string(),
                age: 4_000_000_000,
                limit: MAX_SUPPORTED_AGE,
            })
        );

        scenario.max_age = MAX_SUPPORTED_AGE;
        let years = project(&scenario).expect("limit itself is accepted");
        assert!(years.len() <= (MAX_SUPPORTED_AGE - scenario.current_age + 1) as usize);
    }

    #[test]
    fn rejects_duplicate_account_ids_and_non_finite_values() {
        let mut scenario = household_scenario();
        scenario.accounts[2].id = 1;
        assert_eq!(project(&scenario), Err(ConfigError::DuplicateAccountId(1)));

        let mut scenario = household_scenario();
        scenario.income_streams[0].cola = f64::NAN;
        let err = project(&scenario).expect_err("NaN cola must be rejected");
        assert!(err.to_string().contains("incomeStreams[1].cola"));
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(24))]

        #[test]
        fn prop_projection_is_idempotent_and_consistent(
            current_age in 30u32..70,
            retire_offset in 0u32..15,
            horizon_offset in 0u32..30,
            balances in proptest::collection::vec(0u32..800_000, 1..5),
            rate in 0u32..10,
            post_return in -5i32..10,
            dollar_mode in proptest::bool::ANY,
        ) {
            let retirement_age = current_age + retire_offset;
            let mut scenario = household_scenario();
            scenario.current_age = current_age;
            scenario.retirement_age = retirement_age;
            scenario.max_age = retirement_age + horizon_offset;
            scenario.post_retirement_return = post_return as f64 / 100.0;
            scenario.withdrawal_mode = if dollar_mode {
                WithdrawalMode::Dollar
            } else {
                WithdrawalMode::Percentage
            };
            scenario.withdrawal_tiers = vec![WithdrawalTier {
                age_start: retirement_age,
                age_end: scenario.max_age,
                rate: rate as f64,
                dollar_amount: 30_000.0,
            }];
            scenario.accounts = balances
                .iter()
                .enumerate()
                .map(|(i, b)| account(i as u32, *b as f64, AccountType::Traditional, i as u32, 0.0))
                .collect();

            let a = project(&scenario).expect("valid scenario");
            let b = project(&scenario).expect("valid scenario");
            prop_assert_eq!(&a, &b);
            prop_assert!(!a.is_empty());
            prop_assert_eq!(a[0].age, current_age);

            for (i, year) in a.iter().enumerate() {
                prop_assert!(year.balance >= 0.0);
                prop_assert!(year.withdrawal <= year.target_withdrawal + 1e-6);
                let drawn: f64 = year.withdrawals.iter().map(|w| w.amount).sum();
                prop_assert!((drawn - year.withdrawal).abs() <= 1e-6);
                if year.age < retirement_age {
                    prop_assert!(year.withdrawal == 0.0);
                }
                if i + 1 < a.len() {
                    prop_assert!(year.balance > 0.0);
                }
            }
        }
    }
}
