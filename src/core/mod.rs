mod engine;
mod error;
mod income;
mod policy;
mod simulation;
mod tax;
mod types;
mod waterfall;

pub use engine::{MAX_SUPPORTED_AGE, project, validate_scenario};
pub use error::{ConfigError, SimulationError};
pub use income::{FixedIncome, accrued_amount, fixed_income, is_active, is_taxable};
pub use policy::{
    DEFAULT_WITHDRAWAL_RATE, Preset, PresetStrategy, align_tiers, next_tier, preset_strategy,
    target_withdrawal,
};
pub use simulation::{SURVIVAL_CHECKPOINTS, SimulationControl, simulate, simulate_with_control};
pub use tax::{TaxProfile, account_tax_rate, capital_gains_rate};
pub use types::{
    AccountBalance, AccountType, AccountWithdrawal, BalancePercentiles, FilingStatus,
    IncomeStream, InvestmentAccount, Scenario, SimulationSettings, SimulationSummary,
    StreamPayment, SurvivalProbabilities, WithdrawalMode, WithdrawalOutcome, WithdrawalTier,
    YearSnapshot, total_balance,
};
pub use waterfall::withdraw;
