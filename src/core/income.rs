use super::types::{IncomeStream, StreamPayment};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FixedIncome {
    pub gross: f64,
    pub taxable: f64,
}

pub fn is_active(stream: &IncomeStream, age: u32) -> bool {
    stream.start_age <= age && age <= stream.end_age
}

pub fn is_taxable(stream: &IncomeStream) -> bool {
    stream.taxable
}

pub fn annual_base_amount(stream: &IncomeStream) -> f64 {
    if stream.is_annual {
        stream.amount
    } else {
        stream.amount * 12.0
    }
}

pub fn accrued_amount(stream: &IncomeStream, age: u32) -> f64 {
    if !is_active(stream, age) {
        return 0.0;
    }
    let years_from_start = (age - stream.start_age) as i32;
    annual_base_amount(stream) * (1.0 + stream.cola / 100.0).powi(years_from_start)
}

pub fn fixed_income(streams: &[IncomeStream], age: u32) -> FixedIncome {
    streams
        .iter()
        .filter(|s| is_active(s, age))
        .fold(FixedIncome::default(), |mut acc, stream| {
            let amount = accrued_amount(stream, age);
            acc.gross += amount;
            if is_taxable(stream) {
                acc.taxable += amount;
            }
            acc
        })
}

pub fn stream_payments(streams: &[IncomeStream], age: u32) -> Vec<StreamPayment> {
    streams
        .iter()
        .filter(|s| is_active(s, age))
        .map(|s| StreamPayment {
            id: s.id,
            name: s.name.clone(),
            amount: accrued_amount(s, age),
            taxable: s.taxable,
        })
        .collect()
}
