use std::fmt::Write as _;

use serde::Serialize;

use super::solver::{HouseholdSolution, PersonSolution};
use super::types::VehicleKind;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupTotals {
    pub interest_investment: f64,
    pub growth_investment: f64,
    pub interest_wealth: f64,
    pub growth_wealth: f64,
    pub deductions: f64,
    pub expenses: f64,
    pub interest_income: f64,
    pub growth_income: f64,
}

impl GroupTotals {
    fn add_person(&mut self, person: &PersonSolution, y: usize) {
        for vehicle in &person.vehicles {
            let (investment, wealth, income) = match vehicle.kind {
                VehicleKind::InterestBearing => (
                    &mut self.interest_investment,
                    &mut self.interest_wealth,
                    &mut self.interest_income,
                ),
                VehicleKind::Growth => (
                    &mut self.growth_investment,
                    &mut self.growth_wealth,
                    &mut self.growth_income,
                ),
            };
            *investment += vehicle.flow[y];
            *wealth += vehicle.balance[y];
            *income += vehicle.income[y];
        }
        self.deductions += person.total_deduction[y];
        self.expenses += person.expense[y];
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonPeriod {
    pub name: String,
    pub taxable: f64,
    pub tax: f64,
    pub bracket: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodReport {
    pub period: usize,
    pub seniors: GroupTotals,
    pub non_seniors: GroupTotals,
    pub taxable: f64,
    pub tax: f64,
    pub persons: Vec<PersonPeriod>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareReport {
    pub name: String,
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationReport {
    pub horizon: usize,
    pub objective: f64,
    pub periods: Vec<PeriodReport>,
    pub home_rental_shares: Vec<ShareReport>,
}

pub fn build_report(solution: &HouseholdSolution) -> OptimizationReport {
    let periods = (0..solution.horizon)
        .map(|y| {
            let mut seniors = GroupTotals::default();
            let mut non_seniors = GroupTotals::default();
            let mut persons = Vec::with_capacity(solution.persons.len());
            for person in &solution.persons {
                if person.is_senior {
                    seniors.add_person(person, y);
                } else {
                    non_seniors.add_person(person, y);
                }
                persons.push(PersonPeriod {
                    name: person.name.clone(),
                    taxable: person.taxable[y],
                    tax: person.tax[y],
                    bracket: person.active_bracket[y],
                });
            }
            PeriodReport {
                period: y,
                seniors,
                non_seniors,
                taxable: persons.iter().map(|p| p.taxable).sum(),
                tax: persons.iter().map(|p| p.tax).sum(),
                persons,
            }
        })
        .collect();

    let home_rental_shares = solution
        .persons
        .iter()
        .filter_map(|p| {
            p.home_rental_share.map(|share| ShareReport {
                name: p.name.clone(),
                share,
            })
        })
        .collect();

    OptimizationReport {
        horizon: solution.horizon,
        objective: solution.objective,
        periods,
        home_rental_shares,
    }
}

pub fn format_amount(value: f64) -> String {
    let rounded = (value / 100.0).round() * 100.0;
    let whole = rounded.abs() as u64;
    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0.0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

pub fn render_table(report: &OptimizationReport) -> String {
    let mut rows: Vec<(String, Vec<String>)> = Vec::new();
    let mut group_rows = |label: &str, pick: fn(&GroupTotals) -> f64| {
        rows.push((
            format!("{label} (seniors)"),
            report.periods.iter().map(|p| format_amount(pick(&p.seniors))).collect(),
        ));
        rows.push((
            format!("{label} (others)"),
            report
                .periods
                .iter()
                .map(|p| format_amount(pick(&p.non_seniors)))
                .collect(),
        ));
    };
    group_rows("new investment interest", |g| g.interest_investment);
    group_rows("new investment growth", |g| g.growth_investment);
    group_rows("wealth interest", |g| g.interest_wealth);
    group_rows("wealth growth", |g| g.growth_wealth);
    group_rows("deductions", |g| g.deductions);
    group_rows("expenses", |g| g.expenses);
    group_rows("interest income", |g| g.interest_income);
    group_rows("growth income", |g| g.growth_income);

    rows.push((
        "taxable income".to_string(),
        report.periods.iter().map(|p| format_amount(p.taxable)).collect(),
    ));
    rows.push((
        "tax".to_string(),
        report.periods.iter().map(|p| format_amount(p.tax)).collect(),
    ));

    let names: Vec<&str> = report
        .periods
        .first()
        .map(|p| p.persons.iter().map(|pp| pp.name.as_str()).collect())
        .unwrap_or_default();
    for (idx, name) in names.iter().enumerate() {
        rows.push((
            format!("taxable {name}"),
            report
                .periods
                .iter()
                .map(|p| format_amount(p.persons[idx].taxable))
                .collect(),
        ));
        rows.push((
            format!("tax {name}"),
            report
                .periods
                .iter()
                .map(|p| format_amount(p.persons[idx].tax))
                .collect(),
        ));
        rows.push((
            format!("bracket {name}"),
            report
                .periods
                .iter()
                .map(|p| p.persons[idx].bracket.to_string())
                .collect(),
        ));
    }

    let label_width = rows.iter().map(|(l, _)| l.len()).max().unwrap_or(0);
    let cell_width = rows
        .iter()
        .flat_map(|(_, cells)| cells.iter().map(String::len))
        .max()
        .unwrap_or(0)
        .max(6);

    let mut out = String::new();
    let _ = write!(out, "{:label_width$}", "period");
    for period in &report.periods {
        let _ = write!(out, "  {:>cell_width$}", period.period);
    }
    out.push('\n');
    for (label, cells) in &rows {
        let _ = write!(out, "{label:label_width$}");
        for cell in cells {
            let _ = write!(out, "  {cell:>cell_width$}");
        }
        out.push('\n');
    }

    out.push('\n');
    for share in &report.home_rental_shares {
        let _ = writeln!(out, "home rental share {}: {:.4}", share.name, share.share);
    }
    let _ = writeln!(out, "discounted tax: {}", format_amount(report.objective));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::solver::VehicleSolution;

    fn person(name: &str, is_senior: bool, scale: f64) -> PersonSolution {
        let series = |v: f64| vec![v * scale, 2.0 * v * scale];
        PersonSolution {
            name: name.to_string(),
            is_senior,
            home_rental_share: is_senior.then_some(0.25),
            home_rental: series(0.0),
            fixed_deduction: series(50_000.0),
            total_deduction: series(300_000.0),
            taxable: series(600_000.0),
            tax: series(20_000.0),
            expense: series(100_000.0),
            disposable: series(200_000.0),
            vehicles: vec![
                VehicleSolution {
                    kind: VehicleKind::InterestBearing,
                    balance: series(1_000_000.0),
                    income: series(80_000.0),
                    flow: series(0.0),
                },
                VehicleSolution {
                    kind: VehicleKind::Growth,
                    balance: series(500_000.0),
                    income: series(40_000.0),
                    flow: series(200_000.0),
                },
            ],
            active_bracket: vec![1, 2],
            indicators: vec![vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 1.0]],
        }
    }

    fn solution() -> HouseholdSolution {
        HouseholdSolution {
            horizon: 2,
            objective: 123_456.0,
            persons: vec![
                person("m", true, 1.0),
                person("p", true, 0.5),
                person("n", false, 2.0),
            ],
        }
    }

    #[test]
    fn splits_totals_between_seniors_and_others() {
        let report = build_report(&solution());
        assert_eq!(report.periods.len(), 2);

        let first = &report.periods[0];
        assert_eq!(first.seniors.interest_wealth, 1.5 * 1_000_000.0);
        assert_eq!(first.seniors.growth_wealth, 1.5 * 500_000.0);
        assert_eq!(first.non_seniors.interest_wealth, 2.0 * 1_000_000.0);
        assert_eq!(first.seniors.interest_income, 1.5 * 80_000.0);
        assert_eq!(first.non_seniors.growth_income, 2.0 * 40_000.0);
        assert_eq!(first.seniors.growth_investment, 1.5 * 200_000.0);
        assert_eq!(first.seniors.interest_investment, 0.0);
        assert_eq!(first.tax, 3.5 * 20_000.0);
        assert_eq!(first.persons[2].bracket, 1);

        let second = &report.periods[1];
        assert_eq!(second.taxable, 2.0 * 3.5 * 600_000.0);
        assert_eq!(second.persons[0].bracket, 2);

        assert_eq!(report.home_rental_shares.len(), 2);
        assert_eq!(report.home_rental_shares[1].name, "p");
    }

    #[test]
    fn amounts_round_to_hundreds_with_separators() {
        assert_eq!(format_amount(0.0), "0");
        assert_eq!(format_amount(49.0), "0");
        assert_eq!(format_amount(1_234_567.0), "1,234,600");
        assert_eq!(format_amount(999_950.0), "1,000,000");
        assert_eq!(format_amount(-25_049.0), "-25,000");
        assert_eq!(format_amount(100.0), "100");
    }

    #[test]
    fn table_lists_every_row_and_share() {
        let table = render_table(&build_report(&solution()));
        assert!(table.starts_with("period"));
        assert!(table.contains("wealth interest (seniors)"));
        assert!(table.contains("growth income (others)"));
        assert!(table.contains("bracket n"));
        assert!(table.contains("2,000,000"));
        assert!(table.contains("home rental share m: 0.2500"));
        assert!(table.contains("discounted tax: 123,500"));
    }

    #[test]
    fn report_serializes_camel_case() {
        let json = serde_json::to_value(build_report(&solution())).expect("serialize");
        assert!(json["homeRentalShares"].is_array());
        assert!(json["periods"][0]["nonSeniors"]["interestIncome"].is_number());
    }
}
