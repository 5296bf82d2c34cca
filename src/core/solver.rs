use good_lp::solvers::Solver;
use good_lp::{ResolutionError, Solution, SolverModel, Variable};
use log::{info, warn};
use serde::Serialize;

use super::engine::HouseholdModel;
use super::error::ModelError;
use super::types::VehicleKind;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleSolution {
    pub kind: VehicleKind,
    pub balance: Vec<f64>,
    pub income: Vec<f64>,
    pub flow: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonSolution {
    pub name: String,
    pub is_senior: bool,
    pub home_rental_share: Option<f64>,
    pub home_rental: Vec<f64>,
    pub fixed_deduction: Vec<f64>,
    pub total_deduction: Vec<f64>,
    pub taxable: Vec<f64>,
    pub tax: Vec<f64>,
    pub expense: Vec<f64>,
    pub disposable: Vec<f64>,
    pub vehicles: Vec<VehicleSolution>,
    pub active_bracket: Vec<usize>,
    // [period][bracket], as reported by the solver
    pub indicators: Vec<Vec<f64>>,
}

impl PersonSolution {
    pub fn vehicle(&self, kind: VehicleKind) -> Option<&VehicleSolution> {
        self.vehicles.iter().find(|v| v.kind == kind)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseholdSolution {
    pub horizon: usize,
    pub objective: f64,
    pub persons: Vec<PersonSolution>,
}

impl HouseholdSolution {
    pub fn person(&self, name: &str) -> Option<&PersonSolution> {
        self.persons.iter().find(|p| p.name == name)
    }
}

impl HouseholdModel {
    // HiGHS when built with the `highs` feature, microlp otherwise.
    pub fn solve(self) -> Result<HouseholdSolution, ModelError> {
        #[cfg(feature = "highs")]
        {
            self.solve_with(good_lp::solvers::highs::highs)
        }
        #[cfg(not(feature = "highs"))]
        {
            self.solve_with(good_lp::default_solver)
        }
    }

    pub fn solve_with<S>(self, solver: S) -> Result<HouseholdSolution, ModelError>
    where
        S: Solver,
        S::Model: SolverModel<Error = ResolutionError>,
    {
        let HouseholdModel {
            params,
            entities,
            brackets,
            objective,
            variables,
            constraints,
            money_unit,
            ..
        } = self;

        let mut model = variables.minimise(objective.clone()).using(solver);
        for constraint in constraints.into_constraints() {
            model.add_constraint(constraint);
        }
        let solution = model.solve().map_err(|err| {
            warn!("household model failed to solve: {err}");
            ModelError::from(err)
        })?;

        let read = |series: &[Variable]| -> Vec<f64> {
            series.iter().map(|&v| solution.value(v)).collect()
        };
        let money = |series: &[Variable]| -> Vec<f64> {
            series.iter().map(|&v| money_unit * solution.value(v)).collect()
        };

        let mut persons = Vec::with_capacity(params.persons.len());
        for ((person, vars), cells) in params.persons.iter().zip(&entities.persons).zip(&brackets) {
            let indicators: Vec<Vec<f64>> = cells.iter().map(|cell| read(&cell.indicators)).collect();
            let active_bracket = indicators
                .iter()
                .enumerate()
                .map(|(y, values)| {
                    values.iter().position(|&b| b > 0.5).ok_or_else(|| {
                        ModelError::Solver(format!(
                            "no active bracket for `{}` in period {y}",
                            person.name
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            persons.push(PersonSolution {
                name: person.name.clone(),
                is_senior: person.is_senior,
                home_rental_share: vars.home_rental_share.map(|s| solution.value(s)),
                home_rental: money(&vars.home_rental),
                fixed_deduction: money(&vars.fixed_deduction),
                total_deduction: money(&vars.total_deduction),
                taxable: money(&vars.taxable),
                tax: money(&vars.tax),
                expense: money(&vars.expense),
                disposable: money(&vars.disposable),
                vehicles: vars
                    .vehicles
                    .iter()
                    .map(|v| VehicleSolution {
                        kind: v.kind,
                        balance: money(&v.balance),
                        income: money(&v.income),
                        flow: money(&v.flow),
                    })
                    .collect(),
                active_bracket,
                indicators,
            });
        }

        let objective = money_unit * solution.eval(objective);
        info!("household model solved: discounted liability {objective:.2}");

        Ok(HouseholdSolution {
            horizon: params.horizon,
            objective,
            persons,
        })
    }
}
