use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("current age {current_age} must be <= retirement age {retirement_age}")]
    CurrentAgeAfterRetirement { current_age: u32, retirement_age: u32 },

    #[error("retirement age {retirement_age} must be <= max age {max_age}")]
    RetirementAfterMaxAge { retirement_age: u32, max_age: u32 },

    #[error("{field} {age} exceeds the supported maximum of {limit}")]
    AgeOutOfRange { field: String, age: u32, limit: u32 },

    #[error("trial count must be > 0")]
    NoTrials,

    #[error("volatility must be >= 0, got {0}")]
    NegativeVolatility(f64),

    #[error("account id {0} is used more than once")]
    DuplicateAccountId(u32),

    #[error("{field} must be a finite number")]
    NonFiniteValue { field: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("simulation cancelled before all trials completed")]
    Cancelled,
}
