use good_lp::{Expression, ProblemVariables};
use log::{debug, info};

use super::brackets::{BracketLinearizer, BracketVars};
use super::entities::EntityModel;
use super::error::ModelError;
use super::income::wire_income;
use super::model::{ConstraintGroup, ConstraintSet, VariableRegistry};
use super::recurrence::wire_recurrences;
use super::schedule::Schedules;
use super::types::HouseholdParams;

// Built once, consumed by a single solve.
pub struct HouseholdModel {
    pub(crate) params: HouseholdParams,
    pub(crate) entities: EntityModel,
    // [person][period]
    pub(crate) brackets: Vec<Vec<BracketVars>>,
    pub(crate) objective: Expression,
    pub(crate) variables: ProblemVariables,
    pub(crate) constraints: ConstraintSet,
    pub(crate) money_unit: f64,
    variable_count: usize,
    big_m: f64,
}

impl HouseholdModel {
    pub fn build(params: &HouseholdParams) -> Result<Self, ModelError> {
        let resolved = Schedules::resolve(params)?;
        // Amounts enter the model in `money_unit`s; the solver sees values near 1.
        let unit = resolved.money_unit;
        let scaled = params.scaled(unit);
        let schedules = resolved.scaled();
        let linearizer =
            BracketLinearizer::new(&scaled.brackets, schedules.big_m, scaled.bracket_epsilon)?;

        // Every variable exists before the first constraint is written.
        let mut registry = VariableRegistry::new();
        let entities = EntityModel::declare(&mut registry, &scaled)?;
        let brackets = (0..scaled.persons.len())
            .map(|person| {
                (0..scaled.horizon)
                    .map(|period| linearizer.declare(&mut registry, person, period))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        let variable_count = registry.len();

        let mut constraints = ConstraintSet::default();
        wire_recurrences(&entities, &scaled, &mut constraints)?;
        wire_income(&entities, &scaled, &schedules, &mut constraints)?;
        for (person, cells) in entities.persons.iter().zip(&brackets) {
            for (y, cell) in cells.iter().enumerate() {
                linearizer.linearize(cell, person.taxable[y], person.tax[y], &mut constraints);
            }
        }
        debug!(
            "bracket constraints: {}",
            constraints.count(ConstraintGroup::Bracket)
        );

        let objective = discounted_liability(&entities, &scaled.discount_factors);

        info!(
            "household model built: {} persons, {} periods, {} variables, {} constraints, big-M {:.0}, unit {:.0}",
            params.persons.len(),
            params.horizon,
            variable_count,
            constraints.len(),
            resolved.big_m,
            unit
        );

        Ok(Self {
            params: params.clone(),
            entities,
            brackets,
            objective,
            variables: registry.into_problem(),
            variable_count,
            constraints,
            money_unit: unit,
            big_m: resolved.big_m,
        })
    }

    pub fn params(&self) -> &HouseholdParams {
        &self.params
    }

    pub fn variable_count(&self) -> usize {
        self.variable_count
    }

    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    pub fn big_m(&self) -> f64 {
        self.big_m
    }

    pub fn money_unit(&self) -> f64 {
        self.money_unit
    }
}

// sum_y discount[y] * sum_p t[p][y]
fn discounted_liability(entities: &EntityModel, discount_factors: &[f64]) -> Expression {
    let mut objective = Expression::default();
    for person in &entities.persons {
        for (tax, &factor) in person.tax.iter().zip(discount_factors) {
            objective.add_mul(factor, *tax);
        }
    }
    objective
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{BracketSchedule, DeductionCaps, VehicleKind};

    #[test]
    fn builds_reference_household_with_every_group_populated() {
        let params = HouseholdParams::reference_household(3);
        let model = HouseholdModel::build(&params).expect("build");

        let persons = 3;
        let cells = persons * 3;
        // 13 entity fields per period, 2 shares, 2 x 3 bracket vars per cell
        assert_eq!(model.variable_count(), 13 * cells + 2 + 6 * cells);
        for group in ConstraintGroup::ALL {
            assert!(model.constraints().count(group) > 0, "{group:?} is empty");
        }
        assert_eq!(model.brackets.len(), persons);
        assert!(model.brackets.iter().all(|cells| cells.len() == 3));
        assert!(model.big_m() > 1_000_000.0);
        assert_eq!(model.money_unit(), 1_000_000.0);
    }

    #[test]
    fn one_period_has_no_recurrence_constraints() {
        let params = HouseholdParams::reference_household(1);
        let model = HouseholdModel::build(&params).expect("build");
        assert_eq!(model.constraints().count(ConstraintGroup::Recurrence), 0);
        assert_eq!(model.constraints().count(ConstraintGroup::InitialPin), 12);
    }

    #[test]
    fn invalid_parameters_fail_before_any_constraint() {
        let mut params = HouseholdParams::reference_household(2);
        params.brackets = BracketSchedule {
            thresholds: vec![500_000.0],
            rates: vec![0.0, 0.2, 0.3],
            cess_rate: 0.0,
        };
        let err = HouseholdModel::build(&params).err().expect("bad brackets");
        assert!(matches!(err, ModelError::Configuration(_)));

        let mut params = HouseholdParams::reference_household(2);
        params.persons[0].deductions = DeductionCaps {
            fixed_cap: -1.0,
            discretionary_cap: 0.0,
            total_cap: 0.0,
        };
        let err = HouseholdModel::build(&params).err().expect("negative cap");
        assert!(matches!(err, ModelError::Configuration(_)));
    }

    #[test]
    fn vehicle_topology_errors_surface_from_build() {
        let mut params = HouseholdParams::reference_household(2);
        params.persons[2].vehicles.clear();
        let err = HouseholdModel::build(&params).err().expect("no vehicles");
        assert!(matches!(err, ModelError::Consistency(_)));

        let mut params = HouseholdParams::reference_household(2);
        let mut twin = params.persons[2].vehicles[0].clone();
        twin.kind = VehicleKind::Growth;
        params.persons[2].vehicles.push(twin);
        let err = HouseholdModel::build(&params).err().expect("repeated kind");
        assert!(matches!(err, ModelError::DuplicateVariable(_)));
    }
}
