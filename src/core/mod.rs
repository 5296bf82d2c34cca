mod brackets;
mod engine;
mod entities;
mod error;
mod income;
mod model;
mod recurrence;
mod report;
mod schedule;
mod solver;
mod types;

pub use brackets::{BracketLinearizer, BracketVars};
pub use engine::HouseholdModel;
pub use error::ModelError;
pub use model::{ConstraintGroup, ConstraintSet, VariableRegistry};
pub use report::{
    GroupTotals, OptimizationReport, PeriodReport, PersonPeriod, ShareReport, build_report,
    format_amount, render_table,
};
pub use solver::{HouseholdSolution, PersonSolution, VehicleSolution};
pub use types::{
    BracketSchedule, DeductionCaps, HouseholdParams, IncomeSchedule, PersonParams,
    REFERENCE_HORIZON, VehicleKind, VehicleParams, discount_factors_from_rate,
};
