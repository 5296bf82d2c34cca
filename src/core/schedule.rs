use std::collections::HashSet;

use super::error::ModelError;
use super::types::{HouseholdParams, IncomeSchedule, PersonParams};

const MIN_ALLOCATION: f64 = -0.5;
const MAX_ALLOCATION: f64 = 1.5;
// Home rental counts the payer's basic salary a second time.
const BIG_M_HEADROOM: f64 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub struct PersonSchedule {
    pub salary: Vec<f64>,
    pub basic_salary: Vec<f64>,
    pub shop_rent: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Schedules {
    pub persons: Vec<PersonSchedule>,
    pub payer: Option<usize>,
    pub big_m: f64,
    pub money_unit: f64,
}

impl Schedules {
    pub fn resolve(params: &HouseholdParams) -> Result<Self, ModelError> {
        validate_household(params)?;

        let horizon = params.horizon;
        let mut persons = Vec::with_capacity(params.persons.len());
        for person in &params.persons {
            validate_person(person, horizon)?;
            let salary = person
                .salary
                .resolve(horizon, &format!("{} salary", person.name))?;
            let basic_salary = salary
                .iter()
                .map(|s| s * person.basic_salary_fraction)
                .collect();
            let shop_rent = person
                .shop_rent
                .resolve(horizon, &format!("{} shop rent", person.name))?;
            persons.push(PersonSchedule {
                salary,
                basic_salary,
                shop_rent,
            });
        }

        let payer = match &params.home_rental_payer {
            None => None,
            Some(name) => {
                let Some(idx) = params.person_index(name) else {
                    return Err(ModelError::config(format!(
                        "home rental payer `{name}` is not a household member"
                    )));
                };
                if params.persons[idx].is_senior {
                    return Err(ModelError::config(format!(
                        "home rental payer `{name}` must not be a senior"
                    )));
                }
                Some(idx)
            }
        };

        let brackets = &params.brackets;
        let top_threshold = brackets.thresholds.last().copied().unwrap_or(0.0);
        let big_m = match params.big_m {
            Some(m) => {
                if !m.is_finite() || m <= top_threshold * (1.0 + brackets.cess_rate) {
                    return Err(ModelError::config(format!(
                        "big-M {m} must exceed the largest bracket threshold with cess"
                    )));
                }
                m
            }
            None => {
                let scale = income_scale_bound(params, &persons).max(top_threshold);
                (scale * BIG_M_HEADROOM).max(1.0)
            }
        };

        Ok(Self {
            persons,
            payer,
            big_m,
            money_unit: money_unit(top_threshold),
        })
    }

    pub fn scaled(&self) -> Self {
        let unit = self.money_unit;
        let shrink =
            |amounts: &[f64]| -> Vec<f64> { amounts.iter().map(|a| a / unit).collect() };
        Self {
            persons: self
                .persons
                .iter()
                .map(|p| PersonSchedule {
                    salary: shrink(&p.salary),
                    basic_salary: shrink(&p.basic_salary),
                    shop_rent: shrink(&p.shop_rent),
                })
                .collect(),
            payer: self.payer,
            big_m: self.big_m / unit,
            money_unit: 1.0,
        }
    }
}

impl HouseholdParams {
    pub fn scaled(&self, unit: f64) -> Self {
        let mut params = self.clone();
        for person in &mut params.persons {
            person.salary = person.salary.scaled(unit);
            person.shop_rent = person.shop_rent.scaled(unit);
            let caps = &mut person.deductions;
            caps.fixed_cap /= unit;
            caps.discretionary_cap /= unit;
            caps.total_cap /= unit;
            for vehicle in &mut person.vehicles {
                vehicle.initial_balance /= unit;
            }
        }
        for threshold in &mut params.brackets.thresholds {
            *threshold /= unit;
        }
        params.big_m = params.big_m.map(|m| m / unit);
        params.bracket_epsilon /= unit;
        params
    }
}

// Largest power of ten not above the top threshold.
fn money_unit(top_threshold: f64) -> f64 {
    let mut unit = 1.0;
    while unit * 10.0 <= top_threshold {
        unit *= 10.0;
    }
    unit
}

impl IncomeSchedule {
    fn scaled(&self, unit: f64) -> Self {
        match self {
            IncomeSchedule::None => IncomeSchedule::None,
            IncomeSchedule::Fixed { amounts } => IncomeSchedule::Fixed {
                amounts: amounts.iter().map(|a| a / unit).collect(),
            },
            IncomeSchedule::Growing {
                base,
                annual_growth,
                round_to,
            } => IncomeSchedule::Growing {
                base: base / unit,
                annual_growth: *annual_growth,
                round_to: round_to / unit,
            },
        }
    }

    pub fn resolve(&self, horizon: usize, label: &str) -> Result<Vec<f64>, ModelError> {
        match self {
            IncomeSchedule::None => Ok(vec![0.0; horizon]),
            IncomeSchedule::Fixed { amounts } => {
                if amounts.len() != horizon {
                    return Err(ModelError::config(format!(
                        "{label}: expected {horizon} amounts, got {}",
                        amounts.len()
                    )));
                }
                if amounts.iter().any(|a| !a.is_finite() || *a < 0.0) {
                    return Err(ModelError::config(format!(
                        "{label}: amounts must be finite and >= 0"
                    )));
                }
                Ok(amounts.clone())
            }
            IncomeSchedule::Growing {
                base,
                annual_growth,
                round_to,
            } => {
                if !base.is_finite() || *base < 0.0 {
                    return Err(ModelError::config(format!("{label}: base must be >= 0")));
                }
                if !annual_growth.is_finite() || *annual_growth <= -1.0 {
                    return Err(ModelError::config(format!(
                        "{label}: annual growth must be > -100%"
                    )));
                }
                if !round_to.is_finite() || *round_to < 0.0 {
                    return Err(ModelError::config(format!(
                        "{label}: rounding step must be >= 0"
                    )));
                }
                Ok((0..horizon)
                    .map(|y| {
                        let amount = base * (1.0 + annual_growth).powi(y as i32);
                        round_to_step(amount, *round_to)
                    })
                    .collect())
            }
        }
    }
}

fn round_to_step(amount: f64, step: f64) -> f64 {
    if step <= 0.0 {
        amount
    } else {
        (amount / step).round() * step
    }
}

// Upper bound on one period's household income: all wealth compounding at
// the best rate plus every salary and shop rent.
pub fn income_scale_bound(params: &HouseholdParams, schedules: &[PersonSchedule]) -> f64 {
    let max_rate = params
        .persons
        .iter()
        .flat_map(|p| p.vehicles.iter())
        .flat_map(|v| v.rates.iter().copied())
        .fold(0.0_f64, f64::max);
    let mut wealth: f64 = params
        .persons
        .iter()
        .flat_map(|p| p.vehicles.iter())
        .map(|v| v.initial_balance)
        .sum();

    let mut bound = 0.0_f64;
    for y in 0..params.horizon {
        let inflow: f64 = schedules.iter().map(|s| s.salary[y] + s.shop_rent[y]).sum();
        bound = bound.max(inflow + wealth * max_rate);
        wealth = wealth * (1.0 + max_rate) + inflow;
    }
    bound
}

fn validate_household(params: &HouseholdParams) -> Result<(), ModelError> {
    if params.horizon == 0 {
        return Err(ModelError::config("horizon must be > 0"));
    }
    if params.persons.is_empty() {
        return Err(ModelError::config("household must have at least one person"));
    }

    let mut names = HashSet::new();
    for person in &params.persons {
        if !names.insert(person.name.as_str()) {
            return Err(ModelError::config(format!(
                "person `{}` appears more than once",
                person.name
            )));
        }
    }

    // each share must stay below 1
    if !(0.0..1.0).contains(&params.max_home_rental_fraction) {
        return Err(ModelError::config(
            "max home rental fraction must be in [0, 1)",
        ));
    }
    if !(0.0..=1.0).contains(&params.rental_deduction_rate) {
        return Err(ModelError::config(
            "rental deduction rate must be between 0 and 1",
        ));
    }
    if !params.bracket_epsilon.is_finite() || params.bracket_epsilon < 0.0 {
        return Err(ModelError::config("bracket epsilon must be >= 0"));
    }

    params.brackets.validate()?;

    let factors = &params.discount_factors;
    if factors.len() != params.horizon {
        return Err(ModelError::config(format!(
            "expected {} discount factors, got {}",
            params.horizon,
            factors.len()
        )));
    }
    if (factors[0] - 1.0).abs() > 1e-12 {
        return Err(ModelError::config("discount factor for period 0 must be 1"));
    }
    if factors.iter().any(|f| !f.is_finite() || *f <= 0.0 || *f > 1.0) {
        return Err(ModelError::config("discount factors must be in (0, 1]"));
    }
    if factors.windows(2).any(|w| w[1] > w[0]) {
        return Err(ModelError::config("discount factors must be non-increasing"));
    }

    Ok(())
}

fn validate_person(person: &PersonParams, horizon: usize) -> Result<(), ModelError> {
    let name = &person.name;
    let caps = &person.deductions;
    for (label, cap) in [
        ("fixed deduction cap", caps.fixed_cap),
        ("discretionary deduction cap", caps.discretionary_cap),
        ("total deduction cap", caps.total_cap),
    ] {
        if !cap.is_finite() || cap < 0.0 {
            return Err(ModelError::config(format!("{name}: {label} must be >= 0")));
        }
    }

    for (label, rate) in [
        ("basic salary fraction", person.basic_salary_fraction),
        ("salary exclusion rate", person.salary_exclusion_rate),
        ("rent exemption floor rate", person.rent_exemption_floor_rate),
    ] {
        if !(0.0..=1.0).contains(&rate) {
            return Err(ModelError::config(format!(
                "{name}: {label} must be between 0 and 1"
            )));
        }
    }

    for vehicle in &person.vehicles {
        let kind = vehicle.kind.label();
        if !vehicle.initial_balance.is_finite() || vehicle.initial_balance < 0.0 {
            return Err(ModelError::config(format!(
                "{name}: initial {kind} balance must be >= 0"
            )));
        }
        if vehicle.rates.len() != horizon {
            return Err(ModelError::config(format!(
                "{name}: expected {horizon} {kind} rates, got {}",
                vehicle.rates.len()
            )));
        }
        if vehicle.rates.iter().any(|r| !r.is_finite() || *r < 0.0) {
            return Err(ModelError::config(format!(
                "{name}: {kind} rates must be finite and >= 0"
            )));
        }
    }

    if person.allocation.len() != horizon {
        return Err(ModelError::config(format!(
            "{name}: expected {horizon} allocation fractions, got {}",
            person.allocation.len()
        )));
    }
    if person
        .allocation
        .iter()
        .any(|d| !(MIN_ALLOCATION..=MAX_ALLOCATION).contains(d))
    {
        return Err(ModelError::config(format!(
            "{name}: allocation fractions must be between {MIN_ALLOCATION} and {MAX_ALLOCATION}"
        )));
    }

    Ok(())
}
