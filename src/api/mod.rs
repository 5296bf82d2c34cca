use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::Parser;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;

pub use crate::core::REFERENCE_HORIZON;
use crate::core::{
    HouseholdModel, HouseholdParams, ModelError, OptimizationReport, build_report,
    discount_factors_from_rate, render_table,
};

#[derive(Parser, Debug, Default)]
#[command(
    name = "taxplan",
    about = "Minimises a household's discounted income tax over a planning horizon (MILP)"
)]
pub struct Cli {
    #[arg(
        long,
        help = "JSON parameter set; the reference household is used when omitted"
    )]
    params: Option<PathBuf>,
    #[arg(long, help = "Number of periods (reference household only)")]
    horizon: Option<usize>,
    #[arg(long, help = "Annual discount rate in percent")]
    discount_rate: Option<f64>,
    #[arg(
        long,
        help = "Percent of disposable income sent to the growth vehicle, every person and period"
    )]
    growth_allocation: Option<f64>,
    #[arg(long, help = "Big-M constant for the bracket constraints")]
    big_m: Option<f64>,
    #[arg(long, default_value_t = false, help = "Print the report as JSON")]
    json: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct Overrides {
    horizon: Option<usize>,
    discount_rate: Option<f64>,
    growth_allocation: Option<f64>,
    big_m: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct OptimizePayload {
    params: Option<HouseholdParams>,
    horizon: Option<usize>,
    discount_rate: Option<f64>,
    growth_allocation: Option<f64>,
    big_m: Option<f64>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            horizon: self.horizon,
            discount_rate: self.discount_rate,
            growth_allocation: self.growth_allocation,
            big_m: self.big_m,
        }
    }
}

fn build_params(cli: &Cli) -> Result<HouseholdParams, String> {
    let base = match &cli.params {
        None => None,
        Some(path) => {
            let raw = fs::read_to_string(path)
                .map_err(|e| format!("--params: cannot read {}: {e}", path.display()))?;
            let params = serde_json::from_str::<HouseholdParams>(&raw)
                .map_err(|e| format!("--params: invalid parameter set: {e}"))?;
            Some(params)
        }
    };
    apply_overrides(base, cli.overrides())
}

fn apply_overrides(
    base: Option<HouseholdParams>,
    overrides: Overrides,
) -> Result<HouseholdParams, String> {
    if overrides.horizon == Some(0) {
        return Err("--horizon must be > 0".to_string());
    }

    let mut params = match base {
        None => HouseholdParams::reference_household(overrides.horizon.unwrap_or(REFERENCE_HORIZON)),
        Some(params) => {
            if let Some(horizon) = overrides.horizon {
                if horizon != params.horizon {
                    return Err(format!(
                        "--horizon {horizon} conflicts with the parameter set horizon {}",
                        params.horizon
                    ));
                }
            }
            params
        }
    };

    if let Some(rate) = overrides.discount_rate {
        if !rate.is_finite() || !(0.0..100.0).contains(&rate) {
            return Err("--discount-rate must be >= 0 and < 100".to_string());
        }
        params.discount_factors = discount_factors_from_rate(rate / 100.0, params.horizon);
    }

    if let Some(pct) = overrides.growth_allocation {
        if !pct.is_finite() || !(-50.0..=150.0).contains(&pct) {
            return Err("--growth-allocation must be between -50 and 150".to_string());
        }
        let horizon = params.horizon;
        for person in &mut params.persons {
            person.allocation = vec![pct / 100.0; horizon];
        }
    }

    if let Some(big_m) = overrides.big_m {
        if !big_m.is_finite() || big_m <= 0.0 {
            return Err("--big-m must be > 0".to_string());
        }
        params.big_m = Some(big_m);
    }

    Ok(params)
}

pub fn optimize(params: &HouseholdParams) -> Result<OptimizationReport, ModelError> {
    let solution = HouseholdModel::build(params)?.solve()?;
    Ok(build_report(&solution))
}

pub fn run_cli(cli: Cli) -> Result<String, String> {
    let params = build_params(&cli)?;
    let report = optimize(&params).map_err(|e| e.to_string())?;
    if cli.json {
        serde_json::to_string_pretty(&report).map_err(|e| format!("cannot encode report: {e}"))
    } else {
        Ok(render_table(&report))
    }
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/api/reference", get(reference_handler))
        .route(
            "/api/optimize",
            get(optimize_get_handler).post(optimize_post_handler),
        )
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!("taxplan HTTP API listening on http://{addr}");
    println!("taxplan HTTP API listening on http://{addr}");

    axum::serve(listener, app).await
}

async fn reference_handler() -> Response {
    json_response(
        StatusCode::OK,
        HouseholdParams::reference_household(REFERENCE_HORIZON),
    )
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn optimize_get_handler(Query(payload): Query<OptimizePayload>) -> Response {
    optimize_handler_impl(payload).await
}

async fn optimize_post_handler(Json(payload): Json<OptimizePayload>) -> Response {
    optimize_handler_impl(payload).await
}

async fn optimize_handler_impl(payload: OptimizePayload) -> Response {
    let params = match params_from_payload(payload) {
        Ok(params) => params,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    // Branch-and-bound is CPU bound; keep it off the async workers.
    match tokio::task::spawn_blocking(move || optimize(&params)).await {
        Ok(Ok(report)) => json_response(StatusCode::OK, report),
        Ok(Err(err)) => {
            warn!("optimisation request failed: {err}");
            error_response(status_for(&err), &err.to_string())
        }
        Err(err) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("optimisation task failed: {err}"),
        ),
    }
}

fn status_for(err: &ModelError) -> StatusCode {
    match err {
        ModelError::Configuration(_)
        | ModelError::Consistency(_)
        | ModelError::DuplicateVariable(_) => StatusCode::BAD_REQUEST,
        ModelError::Infeasible | ModelError::Unbounded => StatusCode::UNPROCESSABLE_ENTITY,
        ModelError::Solver(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
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

#[cfg(test)]
fn params_from_json(json: &str) -> Result<HouseholdParams, String> {
    let payload = serde_json::from_str::<OptimizePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    params_from_payload(payload)
}

fn params_from_payload(payload: OptimizePayload) -> Result<HouseholdParams, String> {
    let overrides = Overrides {
        horizon: payload.horizon,
        discount_rate: payload.discount_rate,
        growth_allocation: payload.growth_allocation,
        big_m: payload.big_m,
    };
    apply_overrides(payload.params, overrides)
}
