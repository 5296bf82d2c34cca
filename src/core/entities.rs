use good_lp::{Variable, variable};

use super::error::ModelError;
use super::model::{Field, VarKey, VariableRegistry};
use super::types::{HouseholdParams, VehicleKind};

#[derive(Debug, Clone)]
pub struct VehicleVars {
    pub kind: VehicleKind,
    pub balance: Vec<Variable>,
    pub income: Vec<Variable>,
    /// Signed: a negative flow withdraws from the vehicle.
    pub flow: Vec<Variable>,
}

#[derive(Debug, Clone)]
pub struct PersonVars {
    pub home_rental: Vec<Variable>,
    pub tax: Vec<Variable>,
    pub taxable: Vec<Variable>,
    pub expense: Vec<Variable>,
    pub disposable: Vec<Variable>,
    pub fixed_deduction: Vec<Variable>,
    pub total_deduction: Vec<Variable>,
    pub vehicles: Vec<VehicleVars>,
    pub home_rental_share: Option<Variable>,
}

impl PersonVars {
    pub fn vehicle(&self, kind: VehicleKind) -> Option<&VehicleVars> {
        self.vehicles.iter().find(|v| v.kind == kind)
    }
}

// persons[p].series[y]
#[derive(Debug, Clone)]
pub struct EntityModel {
    pub persons: Vec<PersonVars>,
}

impl EntityModel {
    pub fn declare(
        registry: &mut VariableRegistry,
        params: &HouseholdParams,
    ) -> Result<Self, ModelError> {
        let horizon = params.horizon;
        let mut persons = Vec::with_capacity(params.persons.len());

        for (idx, person) in params.persons.iter().enumerate() {
            let caps = person.deductions;
            let non_negative = || variable().min(0.0);

            let home_rental = registry.declare_series(idx, horizon, Field::HomeRental, non_negative)?;
            let tax = registry.declare_series(idx, horizon, Field::Tax, non_negative)?;
            let taxable = registry.declare_series(idx, horizon, Field::Taxable, non_negative)?;
            let expense = registry.declare_series(idx, horizon, Field::Expense, non_negative)?;
            let disposable =
                registry.declare_series(idx, horizon, Field::Disposable, non_negative)?;
            let fixed_deduction = registry.declare_series(idx, horizon, Field::FixedDeduction, || {
                variable().min(0.0).max(caps.fixed_cap)
            })?;
            let total_deduction = registry.declare_series(idx, horizon, Field::TotalDeduction, || {
                variable().min(0.0).max(caps.total_cap)
            })?;

            let mut vehicles = Vec::with_capacity(person.vehicles.len());
            for vehicle in &person.vehicles {
                let kind = vehicle.kind;
                vehicles.push(VehicleVars {
                    kind,
                    balance: registry.declare_series(idx, horizon, Field::Balance(kind), non_negative)?,
                    income: registry.declare_series(idx, horizon, Field::Income(kind), non_negative)?,
                    flow: registry.declare_series(idx, horizon, Field::Flow(kind), variable)?,
                });
            }

            let home_rental_share = if person.is_senior {
                Some(registry.declare(
                    VarKey::fixed(idx, Field::HomeRentalShare),
                    variable().min(0.0).max(1.0),
                )?)
            } else {
                None
            };

            persons.push(PersonVars {
                home_rental,
                tax,
                taxable,
                expense,
                disposable,
                fixed_deduction,
                total_deduction,
                vehicles,
                home_rental_share,
            });
        }

        Ok(Self { persons })
    }

    pub fn senior_shares(&self) -> impl Iterator<Item = Variable> + '_ {
        self.persons.iter().filter_map(|p| p.home_rental_share)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{HouseholdParams, VehicleParams};

    #[test]
    fn declares_every_field_for_every_period() {
        let params = HouseholdParams::reference_household(3);
        let mut registry = VariableRegistry::new();
        let entities = EntityModel::declare(&mut registry, &params).expect("declare");

        assert_eq!(entities.persons.len(), 3);
        for person in &entities.persons {
            assert_eq!(person.tax.len(), 3);
            assert_eq!(person.taxable.len(), 3);
            assert_eq!(person.vehicles.len(), 2);
            for vehicle in &person.vehicles {
                assert_eq!(vehicle.balance.len(), 3);
                assert_eq!(vehicle.flow.len(), 3);
            }
        }
        assert_eq!(entities.senior_shares().count(), 2);
        assert!(entities.persons[2].home_rental_share.is_none());
        assert!(entities.persons[0].vehicle(VehicleKind::Growth).is_some());

        // 7 person fields + 3 per vehicle, per period; plus one share per senior.
        let per_person = (7 + 2 * 3) * 3;
        assert_eq!(registry.len(), per_person * 3 + 2);
    }

    #[test]
    fn repeated_vehicle_kind_is_a_duplicate_declaration() {
        let mut params = HouseholdParams::reference_household(2);
        params.persons[0].vehicles.push(VehicleParams {
            kind: VehicleKind::Growth,
            initial_balance: 1.0,
            rates: vec![0.05; 2],
        });
        let mut registry = VariableRegistry::new();
        let err = EntityModel::declare(&mut registry, &params).expect_err("duplicate kind");
        assert!(matches!(err, ModelError::DuplicateVariable(ref key) if key.starts_with("balance_growth_p0")));
    }
}
