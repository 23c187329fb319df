use super::tax::{TaxProfile, account_tax_rate};
use super::types::{AccountWithdrawal, InvestmentAccount, WithdrawalOutcome};

/// Mutates `accounts` in place. Each draw is taxed at the margin of `other_taxable_income` plus
/// that draw alone; earlier draws in the same pass do not raise the capital-gains base.
pub fn withdraw(
    accounts: &mut [InvestmentAccount],
    target_amount: f64,
    other_taxable_income: f64,
    current_age: u32,
    profile: TaxProfile,
) -> WithdrawalOutcome {
    let mut order: Vec<usize> = accounts
        .iter()
        .enumerate()
        .filter(|(_, acc)| current_age as f64 >= acc.min_age)
        .map(|(idx, _)| idx)
        .collect();
    order.sort_by_key(|&idx| accounts[idx].withdrawal_order);

    let mut remaining = target_amount.max(0.0);
    let mut outcome = WithdrawalOutcome::default();

    for idx in order {
        let account = &mut accounts[idx];
        if remaining <= 0.0 || account.balance <= 0.0 {
            continue;
        }

        let amount = remaining.min(account.balance);
        let rate = account_tax_rate(
            account.account_type,
            other_taxable_income + amount,
            profile,
        );
        let taxes = amount * rate;

        account.balance -= amount;
        remaining -= amount;
        outcome.total_taxes += taxes;
        outcome.withdrawals.push(AccountWithdrawal {
            account_id: account.id,
            account_name: account.name.clone(),
            amount,
            taxes,
        });
    }

    outcome.actual_withdrawn = target_amount.max(0.0) - remaining;
    outcome
}
