use good_lp::{Constraint, Expression, Variable};
use log::debug;

use super::entities::{EntityModel, VehicleVars};
use super::error::ModelError;
use super::model::{ConstraintGroup, ConstraintSet};
use super::types::{HouseholdParams, VehicleParams};

pub fn wire_recurrences(
    entities: &EntityModel,
    params: &HouseholdParams,
    constraints: &mut ConstraintSet,
) -> Result<(), ModelError> {
    for (person, vars) in params.persons.iter().zip(&entities.persons) {
        if vars.vehicles.is_empty() {
            return Err(ModelError::consistency(format!(
                "person `{}` holds no investment vehicles",
                person.name
            )));
        }

        for (vehicle, vehicle_vars) in person.vehicles.iter().zip(&vars.vehicles) {
            wire_vehicle(vehicle, vehicle_vars, params.horizon, constraints);
        }
    }

    debug!(
        "recurrences wired: {} pins, {} period links",
        constraints.count(ConstraintGroup::InitialPin),
        constraints.count(ConstraintGroup::Recurrence)
    );
    Ok(())
}

fn wire_vehicle(
    vehicle: &VehicleParams,
    vars: &VehicleVars,
    horizon: usize,
    constraints: &mut ConstraintSet,
) {
    constraints.push(
        ConstraintGroup::InitialPin,
        Expression::from(vars.balance[0]).eq(vehicle.initial_balance),
    );
    constraints.push(
        ConstraintGroup::InitialPin,
        accrual(vars.income[0], vars.balance[0], vehicle.rates[0]),
    );

    // I[y] = r[y-1] A[y-1]; A[y] = A[y-1] + F[y] (+ I[y] for growth). Equalities only.
    for y in 1..horizon {
        constraints.push(
            ConstraintGroup::Recurrence,
            accrual(vars.income[y], vars.balance[y - 1], vehicle.rates[y - 1]),
        );

        let mut update = Expression::from(vars.balance[y]);
        update.add_mul(-1.0, vars.balance[y - 1]);
        update.add_mul(-1.0, vars.flow[y]);
        if vehicle.kind.reinvests_income() {
            update.add_mul(-1.0, vars.income[y]);
        }
        constraints.push(ConstraintGroup::Recurrence, update.eq(0.0));
    }
}

fn accrual(income: Variable, balance: Variable, rate: f64) -> Constraint {
    let mut expr = Expression::from(income);
    expr.add_mul(-rate, balance);
    expr.eq(0.0)
}
