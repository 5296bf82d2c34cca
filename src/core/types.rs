use serde::{Deserialize, Serialize};

pub const REFERENCE_HORIZON: usize = 11;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VehicleKind {
    #[serde(alias = "interest", alias = "i")]
    InterestBearing,
    #[serde(alias = "g")]
    Growth,
}

impl VehicleKind {
    pub fn reinvests_income(self) -> bool {
        matches!(self, VehicleKind::Growth)
    }

    pub fn label(self) -> &'static str {
        match self {
            VehicleKind::InterestBearing => "interest",
            VehicleKind::Growth => "growth",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum IncomeSchedule {
    #[default]
    None,
    Fixed {
        amounts: Vec<f64>,
    },
    #[serde(rename_all = "camelCase")]
    Growing {
        base: f64,
        annual_growth: f64,
        #[serde(default = "default_round_to")]
        round_to: f64,
    },
}

fn default_round_to() -> f64 {
    100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeductionCaps {
    pub fixed_cap: f64,
    pub discretionary_cap: f64,
    pub total_cap: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleParams {
    pub kind: VehicleKind,
    pub initial_balance: f64,
    /// One rate per period; period `y` income accrues at `rates[y - 1]`.
    pub rates: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonParams {
    pub name: String,
    #[serde(default)]
    pub is_senior: bool,
    #[serde(default)]
    pub salary: IncomeSchedule,
    #[serde(default)]
    pub basic_salary_fraction: f64,
    #[serde(default)]
    pub salary_exclusion_rate: f64,
    #[serde(default)]
    pub rent_exemption_floor_rate: f64,
    #[serde(default)]
    pub shop_rent: IncomeSchedule,
    pub deductions: DeductionCaps,
    pub vehicles: Vec<VehicleParams>,
    /// Fraction of disposable income sent to the growth vehicle, per period.
    /// Fixed up front: as a decision variable it would multiply another one.
    pub allocation: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketSchedule {
    pub thresholds: Vec<f64>,
    pub rates: Vec<f64>,
    #[serde(default)]
    pub cess_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseholdParams {
    pub horizon: usize,
    pub persons: Vec<PersonParams>,
    #[serde(default)]
    pub home_rental_payer: Option<String>,
    #[serde(default = "default_max_home_rental_fraction")]
    pub max_home_rental_fraction: f64,
    #[serde(default = "default_rental_deduction_rate")]
    pub rental_deduction_rate: f64,
    pub brackets: BracketSchedule,
    pub discount_factors: Vec<f64>,
    #[serde(default)]
    pub big_m: Option<f64>,
    #[serde(default)]
    pub bracket_epsilon: f64,
}

fn default_max_home_rental_fraction() -> f64 {
    0.5
}

fn default_rental_deduction_rate() -> f64 {
    0.3
}

// (1 - rate)^y, rounded to four decimals
pub fn discount_factors_from_rate(rate: f64, horizon: usize) -> Vec<f64> {
    (0..horizon)
        .map(|y| {
            let factor = (1.0 - rate).powi(y as i32);
            (factor * 10_000.0).round() / 10_000.0
        })
        .collect()
}

impl HouseholdParams {
    pub fn reference_household(horizon: usize) -> Self {
        let growing = |base: f64| IncomeSchedule::Growing {
            base,
            annual_growth: 0.10,
            round_to: 100.0,
        };
        let vehicles = |interest: (f64, f64), growth: (f64, f64)| {
            vec![
                VehicleParams {
                    kind: VehicleKind::InterestBearing,
                    initial_balance: interest.0,
                    rates: vec![interest.1; horizon],
                },
                VehicleParams {
                    kind: VehicleKind::Growth,
                    initial_balance: growth.0,
                    rates: vec![growth.1; horizon],
                },
            ]
        };
        let senior_caps = DeductionCaps {
            fixed_cap: 50_000.0,
            discretionary_cap: 250_000.0,
            total_cap: 300_000.0,
        };

        let m = PersonParams {
            name: "m".to_string(),
            is_senior: true,
            salary: IncomeSchedule::None,
            basic_salary_fraction: 0.0,
            salary_exclusion_rate: 0.0,
            rent_exemption_floor_rate: 0.0,
            shop_rent: growing(174_000.0),
            deductions: senior_caps,
            vehicles: vehicles((2_000_000.0, 0.08887), (1_159_500.0, 0.09844)),
            allocation: vec![1.0; horizon],
        };
        let p = PersonParams {
            name: "p".to_string(),
            shop_rent: IncomeSchedule::None,
            vehicles: vehicles((1_700_000.0, 0.08626), (225_000.0, 0.07978)),
            ..m.clone()
        };
        let n = PersonParams {
            name: "n".to_string(),
            is_senior: false,
            salary: growing(3_000_000.0),
            basic_salary_fraction: 0.4,
            salary_exclusion_rate: 0.22,
            rent_exemption_floor_rate: 0.10,
            shop_rent: IncomeSchedule::None,
            deductions: DeductionCaps {
                fixed_cap: 50_000.0,
                discretionary_cap: 225_000.0,
                total_cap: 275_000.0,
            },
            vehicles: vehicles((0.0, 0.09308), (0.0, 0.09308)),
            allocation: vec![1.0; horizon],
        };

        Self {
            horizon,
            persons: vec![m, p, n],
            home_rental_payer: Some("n".to_string()),
            max_home_rental_fraction: default_max_home_rental_fraction(),
            rental_deduction_rate: default_rental_deduction_rate(),
            brackets: BracketSchedule {
                thresholds: vec![500_000.0, 1_000_000.0],
                rates: vec![0.0, 0.20, 0.30],
                cess_rate: 0.04,
            },
            discount_factors: discount_factors_from_rate(0.0, horizon),
            big_m: None,
            bracket_epsilon: 0.0,
        }
    }

    pub fn person_index(&self, name: &str) -> Option<usize> {
        self.persons.iter().position(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discount_factors_round_to_four_decimals() {
        let factors = discount_factors_from_rate(0.07, 3);
        assert_eq!(factors, vec![1.0, 0.93, 0.8649]);
        assert_eq!(discount_factors_from_rate(0.0, 2), vec![1.0, 1.0]);
    }

    #[test]
    fn reference_household_has_one_payer_and_two_seniors() {
        let params = HouseholdParams::reference_household(4);
        assert_eq!(params.persons.len(), 3);
        assert_eq!(params.persons.iter().filter(|p| p.is_senior).count(), 2);
        assert_eq!(params.person_index("n"), Some(2));
        assert_eq!(params.home_rental_payer.as_deref(), Some("n"));
        for person in &params.persons {
            assert_eq!(person.allocation.len(), 4);
            for vehicle in &person.vehicles {
                assert_eq!(vehicle.rates.len(), 4);
            }
        }
    }

    #[test]
    fn params_deserialize_with_defaults_and_aliases() {
        let json = r#"{
          "horizon": 1,
          "persons": [{
            "name": "solo",
            "deductions": {"fixedCap": 0, "discretionaryCap": 0, "totalCap": 0},
            "vehicles": [{"kind": "i", "initialBalance": 1000, "rates": [0.05]}],
            "allocation": [1.0],
            "shopRent": {"kind": "growing", "base": 1000, "annualGrowth": 0.1}
          }],
          "brackets": {"thresholds": [500000], "rates": [0.0, 0.2]},
          "discountFactors": [1.0]
        }"#;
        let params: HouseholdParams = serde_json::from_str(json).expect("json should parse");
        let person = &params.persons[0];
        assert!(!person.is_senior);
        assert_eq!(person.salary, IncomeSchedule::None);
        assert_eq!(person.vehicles[0].kind, VehicleKind::InterestBearing);
        assert_eq!(
            person.shop_rent,
            IncomeSchedule::Growing {
                base: 1000.0,
                annual_growth: 0.1,
                round_to: 100.0
            }
        );
        assert_eq!(params.max_home_rental_fraction, 0.5);
        assert_eq!(params.rental_deduction_rate, 0.3);
        assert_eq!(params.bracket_epsilon, 0.0);
        assert_eq!(params.big_m, None);
    }
}
