use axum::{
    Router,
    extract::{Json, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::net::TcpListener;

use crate::core::{
    AccountType, ConfigError, FilingStatus, IncomeStream, InvestmentAccount, Preset,
    PresetStrategy, Scenario, SimulationControl, SimulationError, SimulationSettings,
    MAX_SUPPORTED_AGE, SimulationSummary, WithdrawalMode, WithdrawalTier, YearSnapshot,
    align_tiers, preset_strategy, project, simulate_with_control, validate_scenario,
};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid scenario JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("trial count {trials} exceeds the per-request limit of {limit}")]
    TooManyTrials { trials: u32, limit: u32 },
}

const MAX_TRIALS_PER_REQUEST: u32 = 100_000;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliFilingStatus {
    Single,
    MarriedJoint,
    MarriedSeparate,
    HeadOfHousehold,
}

impl From<CliFilingStatus> for FilingStatus {
    fn from(value: CliFilingStatus) -> Self {
        match value {
            CliFilingStatus::Single => FilingStatus::Single,
            CliFilingStatus::MarriedJoint => FilingStatus::MarriedJoint,
            CliFilingStatus::MarriedSeparate => FilingStatus::MarriedSeparate,
            CliFilingStatus::HeadOfHousehold => FilingStatus::HeadOfHousehold,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliWithdrawalMode {
    Percentage,
    Dollar,
}

impl From<CliWithdrawalMode> for WithdrawalMode {
    fn from(value: CliWithdrawalMode) -> Self {
        match value {
            CliWithdrawalMode::Percentage => WithdrawalMode::Percentage,
            CliWithdrawalMode::Dollar => WithdrawalMode::Dollar,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliPreset {
    Conservative,
    Moderate,
    Aggressive,
    AgeDecreasing,
    DieWithNothing,
}

impl From<CliPreset> for Preset {
    fn from(value: CliPreset) -> Self {
        match value {
            CliPreset::Conservative => Preset::Conservative,
            CliPreset::Moderate => Preset::Moderate,
            CliPreset::Aggressive => Preset::Aggressive,
            CliPreset::AgeDecreasing => Preset::AgeDecreasing,
            CliPreset::DieWithNothing => Preset::DieWithNothing,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "nestegg",
    about = "Retirement drawdown projector (tax-aware account waterfall + Monte Carlo risk)"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the JSON API over HTTP.
    Serve {
        #[arg(default_value_t = 8080)]
        port: u16,
    },
    /// Print the deterministic year-by-year projection as JSON.
    Project(ScenarioArgs),
    /// Run the Monte Carlo simulation and print its summary as JSON.
    Simulate {
        #[command(flatten)]
        scenario: ScenarioArgs,
        #[command(flatten)]
        simulation: SimulationArgs,
    },
    /// Print every preset withdrawal strategy for the scenario.
    Presets(ScenarioArgs),
}

#[derive(Args, Debug, Clone, Default)]
struct ScenarioArgs {
    #[arg(
        long,
        help = "Scenario JSON file; omitted fields fall back to the sample household"
    )]
    scenario: Option<PathBuf>,
    #[arg(long)]
    starting_year: Option<i32>,
    #[arg(long)]
    current_age: Option<u32>,
    #[arg(long)]
    retirement_age: Option<u32>,
    #[arg(long)]
    max_age: Option<u32>,
    #[arg(long, help = "Flat ordinary income tax rate in percent, e.g. 22")]
    tax_rate: Option<f64>,
    #[arg(long, value_enum)]
    filing_status: Option<CliFilingStatus>,
    #[arg(long, help = "Expected annual return before retirement in percent")]
    pre_retirement_return: Option<f64>,
    #[arg(long, help = "Expected annual return from retirement onwards in percent")]
    post_retirement_return: Option<f64>,
    #[arg(long, value_enum)]
    withdrawal_mode: Option<CliWithdrawalMode>,
    #[arg(
        long,
        value_enum,
        help = "Replace the withdrawal tiers with a preset strategy"
    )]
    preset: Option<CliPreset>,
}

#[derive(Args, Debug, Clone)]
struct SimulationArgs {
    #[arg(long, default_value_t = 1000)]
    trials: u32,
    #[arg(
        long,
        default_value_t = 15.0,
        help = "Annual return volatility in percent (uniform +/- band)"
    )]
    volatility: f64,
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ScenarioPayload {
    starting_year: Option<i32>,
    max_age: Option<u32>,
    current_age: Option<u32>,
    retirement_age: Option<u32>,
    tax_rate: Option<f64>,
    filing_status: Option<FilingStatus>,
    pre_retirement_return: Option<f64>,
    post_retirement_return: Option<f64>,
    #[serde(alias = "withdrawalType")]
    withdrawal_mode: Option<WithdrawalMode>,
    #[serde(alias = "withdrawalRates")]
    withdrawal_tiers: Option<Vec<WithdrawalTier>>,
    preset: Option<Preset>,
    align_tiers: Option<bool>,
    #[serde(alias = "investmentAccounts")]
    accounts: Option<Vec<InvestmentAccount>>,
    income_streams: Option<Vec<IncomeStream>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    #[serde(flatten)]
    scenario: ScenarioPayload,
    #[serde(alias = "numSimulations")]
    trials: Option<u32>,
    volatility: Option<f64>,
    seed: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PresetQuery {
    retirement_age: Option<u32>,
    max_age: Option<u32>,
}

// Percent units, before conversion to a Scenario.
#[derive(Debug, Clone)]
struct ScenarioInputs {
    starting_year: i32,
    max_age: u32,
    current_age: u32,
    retirement_age: u32,
    tax_rate: f64,
    filing_status: FilingStatus,
    pre_retirement_return: f64,
    post_retirement_return: f64,
    withdrawal_mode: WithdrawalMode,
    withdrawal_tiers: Vec<WithdrawalTier>,
    preset: Option<Preset>,
    align_tiers: bool,
    accounts: Vec<InvestmentAccount>,
    income_streams: Vec<IncomeStream>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectResponse {
    depleted_at_age: Option<u32>,
    years: Vec<YearSnapshot>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProgressResponse {
    completed: u32,
    total: u32,
    cancelled: bool,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Default)]
struct AppState {
    latest_simulation: Mutex<Option<Arc<SimulationControl>>>,
}

impl AppState {
    fn begin_simulation(&self) -> Arc<SimulationControl> {
        let control = SimulationControl::new();
        let mut latest = self
            .latest_simulation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = latest.replace(Arc::clone(&control)) {
            previous.cancel();
        }
        control
    }

    fn latest(&self) -> Option<Arc<SimulationControl>> {
        self.latest_simulation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

fn tier(age_start: u32, age_end: u32, rate: f64, dollar_amount: f64) -> WithdrawalTier {
    WithdrawalTier {
        age_start,
        age_end,
        rate,
        dollar_amount,
    }
}

fn account(
    id: u32,
    name: &str,
    balance: f64,
    account_type: AccountType,
    withdrawal_order: u32,
    min_age: f64,
) -> InvestmentAccount {
    InvestmentAccount {
        id,
        name: name.to_string(),
        balance,
        account_type,
        withdrawal_order,
        min_age,
    }
}

fn monthly_stream(
    id: u32,
    name: &str,
    amount: f64,
    start_age: u32,
    end_age: u32,
    taxable: bool,
    cola: f64,
) -> IncomeStream {
    IncomeStream {
        id,
        name: name.to_string(),
        amount,
        is_annual: false,
        start_age,
        end_age,
        taxable,
        cola,
    }
}

fn default_inputs() -> ScenarioInputs {
    ScenarioInputs {
        starting_year: 2025,
        max_age: 95,
        current_age: 35,
        retirement_age: 65,
        tax_rate: 22.0,
        filing_status: FilingStatus::MarriedJoint,
        pre_retirement_return: 7.0,
        post_retirement_return: 5.0,
        withdrawal_mode: WithdrawalMode::Percentage,
        withdrawal_tiers: vec![
            tier(65, 70, 3.5, 50_000.0),
            tier(71, 80, 4.0, 60_000.0),
            tier(81, 95, 5.0, 70_000.0),
        ],
        preset: None,
        align_tiers: false,
        accounts: vec![
            account(1, "Taxable Brokerage", 100_000.0, AccountType::Taxable, 1, 0.0),
            account(2, "Military TSP", 200_000.0, AccountType::Traditional, 2, 59.5),
            account(3, "Roth TSP", 100_000.0, AccountType::Roth, 3, 59.5),
            account(4, "401k/403b", 150_000.0, AccountType::Traditional, 4, 59.5),
            account(5, "Roth IRA", 75_000.0, AccountType::Roth, 5, 59.5),
            account(6, "HSA", 25_000.0, AccountType::Hsa, 6, 65.0),
        ],
        income_streams: vec![
            monthly_stream(1, "Military Pension", 3_500.0, 45, 95, true, 2.5),
            monthly_stream(2, "Federal Pension", 2_200.0, 62, 95, true, 1.5),
            monthly_stream(3, "VA Disability", 3_100.0, 35, 95, false, 2.0),
            monthly_stream(4, "SS Supplement", 1_400.0, 57, 61, true, 0.0),
            monthly_stream(5, "Social Security (Primary)", 2_800.0, 67, 95, true, 2.5),
            monthly_stream(6, "Social Security (Spouse)", 1_900.0, 67, 95, true, 2.5),
        ],
    }
}

fn apply_payload(inputs: &mut ScenarioInputs, payload: ScenarioPayload) {
    if let Some(v) = payload.starting_year {
        inputs.starting_year = v;
    }
    if let Some(v) = payload.max_age {
        inputs.max_age = v;
    }
    if let Some(v) = payload.current_age {
        inputs.current_age = v;
    }
    if let Some(v) = payload.retirement_age {
        inputs.retirement_age = v;
    }
    if let Some(v) = payload.tax_rate {
        inputs.tax_rate = v;
    }
    if let Some(v) = payload.filing_status {
        inputs.filing_status = v;
    }
    if let Some(v) = payload.pre_retirement_return {
        inputs.pre_retirement_return = v;
    }
    if let Some(v) = payload.post_retirement_return {
        inputs.post_retirement_return = v;
    }
    if let Some(v) = payload.withdrawal_mode {
        inputs.withdrawal_mode = v;
    }
    if let Some(v) = payload.withdrawal_tiers {
        inputs.withdrawal_tiers = v;
    }
    if let Some(v) = payload.preset {
        inputs.preset = Some(v);
    }
    if let Some(v) = payload.align_tiers {
        inputs.align_tiers = v;
    }
    if let Some(v) = payload.accounts {
        inputs.accounts = v;
    }
    if let Some(v) = payload.income_streams {
        inputs.income_streams = v;
    }
}

fn apply_cli_overrides(payload: &mut ScenarioPayload, args: &ScenarioArgs) {
    if let Some(v) = args.starting_year {
        payload.starting_year = Some(v);
    }
    if let Some(v) = args.current_age {
        payload.current_age = Some(v);
    }
    if let Some(v) = args.retirement_age {
        payload.retirement_age = Some(v);
    }
    if let Some(v) = args.max_age {
        payload.max_age = Some(v);
    }
    if let Some(v) = args.tax_rate {
        payload.tax_rate = Some(v);
    }
    if let Some(v) = args.filing_status {
        payload.filing_status = Some(v.into());
    }
    if let Some(v) = args.pre_retirement_return {
        payload.pre_retirement_return = Some(v);
    }
    if let Some(v) = args.post_retirement_return {
        payload.post_retirement_return = Some(v);
    }
    if let Some(v) = args.withdrawal_mode {
        payload.withdrawal_mode = Some(v.into());
    }
    if let Some(v) = args.preset {
        payload.preset = Some(v.into());
    }
}

fn build_scenario(inputs: ScenarioInputs) -> Result<Scenario, ConfigError> {
    let mut withdrawal_mode = inputs.withdrawal_mode;
    let mut withdrawal_tiers = inputs.withdrawal_tiers;

    if inputs.align_tiers {
        withdrawal_tiers = align_tiers(&withdrawal_tiers, inputs.retirement_age);
    }

    if let Some(preset) = inputs.preset {
        let strategy = preset_strategy(
            preset,
            inputs.retirement_age,
            inputs.max_age,
            &inputs.accounts,
        );
        withdrawal_mode = strategy.mode;
        withdrawal_tiers = strategy.tiers;
    }

    if withdrawal_tiers.is_empty() {
        warn!("no withdrawal tiers configured; every retirement year uses the 4% default");
    }

    let scenario = Scenario {
        starting_year: inputs.starting_year,
        max_age: inputs.max_age,
        current_age: inputs.current_age,
        retirement_age: inputs.retirement_age,
        flat_tax_rate: inputs.tax_rate / 100.0,
        filing_status: inputs.filing_status,
        pre_retirement_return: inputs.pre_retirement_return / 100.0,
        post_retirement_return: inputs.post_retirement_return / 100.0,
        withdrawal_mode,
        withdrawal_tiers,
        accounts: inputs.accounts,
        income_streams: inputs.income_streams,
    };
    validate_scenario(&scenario)?;
    Ok(scenario)
}

fn scenario_from_payload(payload: ScenarioPayload) -> Result<Scenario, ConfigError> {
    let mut inputs = default_inputs();
    apply_payload(&mut inputs, payload);
    build_scenario(inputs)
}

fn settings_from_payload(payload: &SimulatePayload) -> Result<SimulationSettings, ApiError> {
    let trials = payload.trials.unwrap_or(1000);
    if trials > MAX_TRIALS_PER_REQUEST {
        return Err(ApiError::TooManyTrials {
            trials,
            limit: MAX_TRIALS_PER_REQUEST,
        });
    }
    Ok(SimulationSettings {
        trials,
        volatility: payload.volatility.unwrap_or(15.0) / 100.0,
        seed: payload.seed.unwrap_or(42),
    })
}

fn load_payload(args: &ScenarioArgs) -> Result<ScenarioPayload, ApiError> {
    let mut payload = match &args.scenario {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            serde_json::from_str::<ScenarioPayload>(&raw)?
        }
        None => ScenarioPayload::default(),
    };
    apply_cli_overrides(&mut payload, args);
    Ok(payload)
}

fn all_presets(
    retirement_age: u32,
    max_age: u32,
    accounts: &[InvestmentAccount],
) -> Vec<PresetStrategy> {
    Preset::ALL
        .iter()
        .map(|preset| preset_strategy(*preset, retirement_age, max_age, accounts))
        .collect()
}

fn project_response(scenario: &Scenario) -> Result<ProjectResponse, ConfigError> {
    let years = project(scenario)?;
    let depleted_at_age = years
        .last()
        .filter(|y| y.balance <= 0.0)
        .map(|y| y.age);
    Ok(ProjectResponse {
        depleted_at_age,
        years,
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<(), ApiError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn run(cli: Cli) -> Result<(), ApiError> {
    match cli.command {
        Command::Serve { port } => run_http_server(port).await?,
        Command::Project(args) => {
            let scenario = scenario_from_payload(load_payload(&args)?)?;
            print_json(&project_response(&scenario)?)?;
        }
        Command::Simulate {
            scenario,
            simulation,
        } => {
            let scenario = scenario_from_payload(load_payload(&scenario)?)?;
            let settings = SimulationSettings {
                trials: simulation.trials,
                volatility: simulation.volatility / 100.0,
                seed: simulation.seed,
            };
            let summary: SimulationSummary = tokio::task::spawn_blocking(move || {
                simulate_with_control(&scenario, &settings, &SimulationControl::default())
            })
            .await
            .map_err(std::io::Error::other)??;
            print_json(&summary)?;
        }
        Command::Presets(args) => {
            let scenario = scenario_from_payload(load_payload(&args)?)?;
            print_json(&all_presets(
                scenario.retirement_age,
                scenario.max_age,
                &scenario.accounts,
            ))?;
        }
    }
    Ok(())
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("nestegg HTTP API listening on http://{addr}");
    axum::serve(listener, router()).await
}

fn router() -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/project", post(project_handler))
        .route("/api/simulate", post(simulate_handler))
        .route("/api/simulate/progress", get(progress_handler))
        .route("/api/presets", get(presets_handler))
        .fallback(not_found_handler)
        .with_state(Arc::new(AppState::default()))
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, serde_json::json!({ "status": "ok" }))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn project_handler(Json(payload): Json<ScenarioPayload>) -> Response {
    let result = scenario_from_payload(payload).and_then(|s| project_response(&s));
    match result {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(err) => error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    }
}

async fn simulate_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SimulatePayload>,
) -> Response {
    let settings = match settings_from_payload(&payload) {
        Ok(settings) => settings,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    };
    let scenario = match scenario_from_payload(payload.scenario) {
        Ok(scenario) => scenario,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    };

    let control = state.begin_simulation();
    let joined = tokio::task::spawn_blocking(move || {
        simulate_with_control(&scenario, &settings, &control)
    })
    .await;

    match joined {
        Ok(Ok(summary)) => json_response(StatusCode::OK, summary),
        Ok(Err(SimulationError::Cancelled)) => error_response(
            StatusCode::CONFLICT,
            "simulation superseded by a newer request",
        ),
        Ok(Err(err)) => error_response(StatusCode::BAD_REQUEST, &err.to_string()),
        Err(err) => {
            warn!("simulation worker failed: {err}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "simulation worker failed")
        }
    }
}

async fn progress_handler(State(state): State<Arc<AppState>>) -> Response {
    let progress = match state.latest() {
        Some(control) => ProgressResponse {
            completed: control.completed(),
            total: control.total(),
            cancelled: control.is_cancelled(),
        },
        None => ProgressResponse {
            completed: 0,
            total: 0,
            cancelled: false,
        },
    };
    json_response(StatusCode::OK, progress)
}

async fn presets_handler(Query(query): Query<PresetQuery>) -> Response {
    let defaults = default_inputs();
    let retirement_age = query.retirement_age.unwrap_or(defaults.retirement_age);
    let max_age = query.max_age.unwrap_or(defaults.max_age);
    if max_age > MAX_SUPPORTED_AGE {
        return error_response(
            StatusCode::BAD_REQUEST,
            &ConfigError::AgeOutOfRange {
                field: "maxAge".to_string(),
                age: max_age,
                limit: MAX_SUPPORTED_AGE,
            }
            .to_string(),
        );
    }
    if retirement_age > max_age {
        return error_response(
            StatusCode::BAD_REQUEST,
            &ConfigError::RetirementAfterMaxAge {
                retirement_age,
                max_age,
            }
            .to_string(),
        );
    }
    json_response(
        StatusCode::OK,
        all_presets(retirement_age, max_age, &defaults.accounts),
    )
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
