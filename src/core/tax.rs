use super::types::{AccountType, FilingStatus};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaxProfile {
    pub ordinary_rate: f64,
    pub filing_status: FilingStatus,
}

#[derive(Debug, Clone, Copy)]
struct CapitalGainsBrackets {
    bracket0: f64,
    bracket15: f64,
}

fn brackets(filing_status: FilingStatus) -> CapitalGainsBrackets {
    match filing_status {
        FilingStatus::Single => CapitalGainsBrackets {
            bracket0: 48_350.0,
            bracket15: 533_400.0,
        },
        FilingStatus::MarriedJoint => CapitalGainsBrackets {
            bracket0: 96_700.0,
            bracket15: 600_050.0,
        },
        FilingStatus::MarriedSeparate => CapitalGainsBrackets {
            bracket0: 48_350.0,
            bracket15: 300_000.0,
        },
        FilingStatus::HeadOfHousehold => CapitalGainsBrackets {
            bracket0: 64_750.0,
            bracket15: 566_700.0,
        },
    }
}

pub fn capital_gains_rate(total_taxable_income: f64, filing_status: FilingStatus) -> f64 {
    let b = brackets(filing_status);
    if total_taxable_income <= b.bracket0 {
        0.0
    } else if total_taxable_income <= b.bracket15 {
        0.15
    } else {
        0.20
    }
}

pub fn account_tax_rate(
    account_type: AccountType,
    total_taxable_income: f64,
    profile: TaxProfile,
) -> f64 {
    match account_type {
        AccountType::Roth | AccountType::Hsa => 0.0,
        AccountType::Traditional => profile.ordinary_rate,
        AccountType::Taxable => capital_gains_rate(total_taxable_income, profile.filing_status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(status: FilingStatus) -> TaxProfile {
        TaxProfile {
            ordinary_rate: 0.22,
            filing_status: status,
        }
    }

    #[test]
    fn capital_gains_breakpoints_are_inclusive() {
        assert_eq!(capital_gains_rate(96_700.0, FilingStatus::MarriedJoint), 0.0);
        assert_eq!(capital_gains_rate(96_700.01, FilingStatus::MarriedJoint), 0.15);
        assert_eq!(capital_gains_rate(600_050.0, FilingStatus::MarriedJoint), 0.15);
        assert_eq!(capital_gains_rate(600_050.01, FilingStatus::MarriedJoint), 0.20);
    }

    #[test]
    fn capital_gains_brackets_differ_by_filing_status() {
        let income = 50_000.0;
        assert_eq!(capital_gains_rate(income, FilingStatus::Single), 0.15);
        assert_eq!(capital_gains_rate(income, FilingStatus::MarriedSeparate), 0.15);
        assert_eq!(capital_gains_rate(income, FilingStatus::HeadOfHousehold), 0.0);
        assert_eq!(capital_gains_rate(income, FilingStatus::MarriedJoint), 0.0);

        assert_eq!(capital_gains_rate(400_000.0, FilingStatus::MarriedSeparate), 0.20);
        assert_eq!(capital_gains_rate(400_000.0, FilingStatus::Single), 0.15);
    }

    #[test]
    fn unknown_filing_status_uses_married_joint_brackets() {
        let status = FilingStatus::from_label("widowed");
        assert_eq!(status, FilingStatus::MarriedJoint);
        assert_eq!(capital_gains_rate(90_000.0, status), 0.0);
    }

    #[test]
    fn account_tax_rate_by_type() {
        let p = profile(FilingStatus::Single);
        assert_eq!(account_tax_rate(AccountType::Roth, 1e9, p), 0.0);
        assert_eq!(account_tax_rate(AccountType::Hsa, 1e9, p), 0.0);
        assert_eq!(account_tax_rate(AccountType::Traditional, 0.0, p), 0.22);
        assert_eq!(account_tax_rate(AccountType::Taxable, 10_000.0, p), 0.0);
        assert_eq!(account_tax_rate(AccountType::Taxable, 100_000.0, p), 0.15);
        assert_eq!(account_tax_rate(AccountType::Taxable, 1_000_000.0, p), 0.20);
    }
}
