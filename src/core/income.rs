use good_lp::Expression;
use log::debug;

use super::entities::{EntityModel, PersonVars};
use super::error::ModelError;
use super::model::{ConstraintGroup, ConstraintSet};
use super::schedule::Schedules;
use super::types::{HouseholdParams, PersonParams, VehicleKind};

pub fn wire_income(
    entities: &EntityModel,
    params: &HouseholdParams,
    schedules: &Schedules,
    constraints: &mut ConstraintSet,
) -> Result<(), ModelError> {
    let shares: Vec<_> = entities.senior_shares().collect();
    if !shares.is_empty() {
        let mut total_share = Expression::default();
        for &share in &shares {
            total_share.add_mul(1.0, share);
        }
        constraints.push(
            ConstraintGroup::HomeRental,
            total_share.leq(params.max_home_rental_fraction),
        );
    }

    for y in 0..params.horizon {
        let payer_basic = schedules
            .payer
            .map(|idx| schedules.persons[idx].basic_salary[y])
            .unwrap_or(0.0);

        for (idx, (person, vars)) in params.persons.iter().zip(&entities.persons).enumerate() {
            let schedule = &schedules.persons[idx];
            let is_payer = schedules.payer == Some(idx);
            let salary = schedule.salary[y];
            let basic = schedule.basic_salary[y];
            let shop_rent = schedule.shop_rent[y];

            // Home rental: a static share of the payer's basic salary for seniors.
            let mut home_rental = Expression::from(vars.home_rental[y]);
            if let Some(share) = vars.home_rental_share {
                home_rental.add_mul(-payer_basic, share);
            }
            constraints.push(ConstraintGroup::HomeRental, home_rental.eq(0.0));

            let mut floor = Expression::from(vars.total_deduction[y]);
            floor.add_mul(-1.0, vars.fixed_deduction[y]);
            constraints.push(ConstraintGroup::Deduction, floor.clone().geq(0.0));
            constraints.push(
                ConstraintGroup::Deduction,
                floor.leq(person.deductions.discretionary_cap),
            );

            // T = SAL + SR + HR + sum(I) - D - rent_rate * (HR + SR)
            //     - exclusions * BS - [payer] (sum(shares) - floor) * BS
            let rent_rate = params.rental_deduction_rate;
            let mut taxable = Expression::from(salary + shop_rent * (1.0 - rent_rate));
            taxable.add_mul(1.0 - rent_rate, vars.home_rental[y]);
            for vehicle in &vars.vehicles {
                taxable.add_mul(1.0, vehicle.income[y]);
            }
            taxable.add_mul(-1.0, vars.total_deduction[y]);
            taxable += -(person.salary_exclusion_rate * basic);
            if is_payer {
                for &share in &shares {
                    taxable.add_mul(-basic, share);
                }
                taxable += person.rent_exemption_floor_rate * basic;
            }
            taxable.add_mul(-1.0, vars.taxable[y]);
            constraints.push(ConstraintGroup::TaxableIncome, taxable.eq(0.0));

            constraints.push(
                ConstraintGroup::Expense,
                expense_rule(person, vars, entities, y, shop_rent, basic, is_payer),
            );

            // K = SAL + SR + HR + I_interest + DF - D - E - t
            let mut disposable = Expression::from(salary + shop_rent);
            disposable.add_mul(1.0, vars.home_rental[y]);
            if let Some(interest) = vars.vehicle(VehicleKind::InterestBearing) {
                disposable.add_mul(1.0, interest.income[y]);
            }
            disposable.add_mul(1.0, vars.fixed_deduction[y]);
            disposable.add_mul(-1.0, vars.total_deduction[y]);
            disposable.add_mul(-1.0, vars.expense[y]);
            disposable.add_mul(-1.0, vars.tax[y]);
            disposable.add_mul(-1.0, vars.disposable[y]);
            constraints.push(ConstraintGroup::Disposable, disposable.eq(0.0));

            wire_allocation(person, vars, y, constraints);
        }
    }

    debug!(
        "income wired: {} taxable, {} deduction, {} allocation constraints",
        constraints.count(ConstraintGroup::TaxableIncome),
        constraints.count(ConstraintGroup::Deduction),
        constraints.count(ConstraintGroup::Allocation)
    );
    Ok(())
}

// Seniors spend their shop rent plus the period-0 interest income. Others
// spend their basic salary plus any home rent they pay.
fn expense_rule(
    person: &PersonParams,
    vars: &PersonVars,
    entities: &EntityModel,
    y: usize,
    shop_rent: f64,
    basic: f64,
    is_payer: bool,
) -> good_lp::Constraint {
    let mut expense = Expression::from(vars.expense[y]);
    if person.is_senior {
        expense += -shop_rent;
        if let Some(interest) = vars.vehicle(VehicleKind::InterestBearing) {
            expense.add_mul(-1.0, interest.income[0]);
        }
    } else {
        expense += -basic;
        if is_payer {
            for other in &entities.persons {
                if other.home_rental_share.is_some() {
                    expense.add_mul(-1.0, other.home_rental[y]);
                }
            }
        }
    }
    expense.eq(0.0)
}

fn wire_allocation(
    person: &PersonParams,
    vars: &PersonVars,
    y: usize,
    constraints: &mut ConstraintSet,
) {
    let d = person.allocation[y];
    let growth = vars.vehicle(VehicleKind::Growth);
    let interest = vars.vehicle(VehicleKind::InterestBearing);

    let mut splits = Vec::with_capacity(2);
    match (growth, interest) {
        (Some(g), Some(i)) => {
            splits.push((g.flow[y], d));
            splits.push((i.flow[y], 1.0 - d));
        }
        (Some(only), None) | (None, Some(only)) => splits.push((only.flow[y], 1.0)),
        (None, None) => {}
    }

    for (flow, fraction) in splits {
        let mut split = Expression::from(flow);
        split.add_mul(-fraction, vars.disposable[y]);
        constraints.push(ConstraintGroup::Allocation, split.eq(0.0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::VariableRegistry;
    use crate::core::recurrence::wire_recurrences;
    use crate::core::types::HouseholdParams;

    fn wire(params: &HouseholdParams) -> ConstraintSet {
        let schedules = Schedules::resolve(params).expect("valid params");
        let mut registry = VariableRegistry::new();
        let entities = EntityModel::declare(&mut registry, params).expect("declare");
        let mut constraints = ConstraintSet::default();
        wire_recurrences(&entities, params, &mut constraints).expect("recurrences");
        wire_income(&entities, params, &schedules, &mut constraints).expect("income");
        constraints
    }

    #[test]
    fn emits_one_rule_per_person_and_period() {
        let params = HouseholdParams::reference_household(3);
        let constraints = wire(&params);
        let cells = 3 * 3;
        // one share ceiling plus one home rental definition per cell
        assert_eq!(constraints.count(ConstraintGroup::HomeRental), 1 + cells);
        assert_eq!(constraints.count(ConstraintGroup::Deduction), 2 * cells);
        assert_eq!(constraints.count(ConstraintGroup::TaxableIncome), cells);
        assert_eq!(constraints.count(ConstraintGroup::Expense), cells);
        assert_eq!(constraints.count(ConstraintGroup::Disposable), cells);
        assert_eq!(constraints.count(ConstraintGroup::Allocation), 2 * cells);
    }

    #[test]
    fn single_vehicle_takes_whole_disposable_income() {
        let mut params = HouseholdParams::reference_household(2);
        for person in &mut params.persons {
            person.vehicles.truncate(1);
        }
        let constraints = wire(&params);
        assert_eq!(constraints.count(ConstraintGroup::Allocation), 3 * 2);
    }

    #[test]
    fn household_without_seniors_has_no_share_ceiling() {
        let mut params = HouseholdParams::reference_household(2);
        params.persons.retain(|p| !p.is_senior);
        let constraints = wire(&params);
        assert_eq!(constraints.count(ConstraintGroup::HomeRental), 2);
    }
}
