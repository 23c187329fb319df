use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Taxable,
    Traditional,
    Roth,
    Hsa,
}

// Unrecognised labels deserialize to MarriedJoint.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "String")]
pub enum FilingStatus {
    Single,
    MarriedJoint,
    MarriedSeparate,
    HeadOfHousehold,
}

impl FilingStatus {
    pub fn from_label(label: &str) -> Self {
        match label {
            "single" => FilingStatus::Single,
            "marriedJoint" | "married-joint" | "married_joint" => FilingStatus::MarriedJoint,
            "marriedSeparate" | "married-separate" | "married_separate" => {
                FilingStatus::MarriedSeparate
            }
            "headOfHousehold" | "head-of-household" | "head_of_household" => {
                FilingStatus::HeadOfHousehold
            }
            other => {
                log::warn!("unknown filing status {other:?}, using married-joint brackets");
                FilingStatus::MarriedJoint
            }
        }
    }
}

impl From<String> for FilingStatus {
    fn from(value: String) -> Self {
        FilingStatus::from_label(&value)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalMode {
    Percentage,
    Dollar,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentAccount {
    pub id: u32,
    pub name: String,
    pub balance: f64,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub withdrawal_order: u32,
    #[serde(default)]
    pub min_age: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeStream {
    pub id: u32,
    pub name: String,
    #[serde(rename = "monthlyAmount", alias = "amount")]
    pub amount: f64,
    #[serde(default)]
    pub is_annual: bool,
    pub start_age: u32,
    pub end_age: u32,
    pub taxable: bool,
    #[serde(default)]
    pub cola: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalTier {
    pub age_start: u32,
    pub age_end: u32,
    pub rate: f64,
    pub dollar_amount: f64,
}

impl WithdrawalTier {
    pub fn contains(&self, age: u32) -> bool {
        self.age_start <= age && age <= self.age_end
    }
}

/// Scalar rates are fractions (`0.05` is 5%); tier rates and COLA stay in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub starting_year: i32,
    pub max_age: u32,
    pub current_age: u32,
    pub retirement_age: u32,
    pub flat_tax_rate: f64,
    pub filing_status: FilingStatus,
    pub pre_retirement_return: f64,
    pub post_retirement_return: f64,
    pub withdrawal_mode: WithdrawalMode,
    pub withdrawal_tiers: Vec<WithdrawalTier>,
    pub accounts: Vec<InvestmentAccount>,
    pub income_streams: Vec<IncomeStream>,
}

impl Scenario {
    pub fn return_for_age(&self, age: u32) -> f64 {
        if age >= self.retirement_age {
            self.post_retirement_return
        } else {
            self.pre_retirement_return
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSettings {
    pub trials: u32,
    pub volatility: f64,
    pub seed: u64,
}

pub fn total_balance(accounts: &[InvestmentAccount]) -> f64 {
    accounts.iter().map(|a| a.balance).sum()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountWithdrawal {
    pub account_id: u32,
    pub account_name: String,
    pub amount: f64,
    pub taxes: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalOutcome {
    pub withdrawals: Vec<AccountWithdrawal>,
    pub total_taxes: f64,
    pub actual_withdrawn: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalance {
    pub id: u32,
    pub name: String,
    pub balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamPayment {
    pub id: u32,
    pub name: String,
    pub amount: f64,
    pub taxable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearSnapshot {
    pub age: u32,
    pub year: i32,
    pub balance: f64,
    pub target_withdrawal: f64,
    pub withdrawal: f64,
    pub gross_fixed_income: f64,
    pub total_taxes: f64,
    pub total_gross_income: f64,
    pub total_net_income: f64,
    pub account_balances: Vec<AccountBalance>,
    pub withdrawals: Vec<AccountWithdrawal>,
    pub income_streams: Vec<StreamPayment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalancePercentiles {
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SurvivalProbabilities {
    pub age70: f64,
    pub age80: f64,
    pub age90: f64,
    pub age95: f64,
    pub age100: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSummary {
    pub percentiles: BalancePercentiles,
    pub survival_probabilities: SurvivalProbabilities,
    pub success_rate: f64,
    pub total_simulations: u32,
}
