//! Progressive tax as an exact mixed-integer encoding.
//!
//! For each (person, period) one binary `b_k` per bracket selects the active
//! bracket and one continuous `c_k` carries that bracket's liability. With
//! `L_k = tau_{k-1}` (0 for the lowest bracket), `U_k = tau_k` (`M` for the
//! top one) and `G_k(T) = s_k T - q_k` the bracket's affine tax formula:
//!
//! ```text
//! sum_k b_k = 1
//! T <= M
//! T <= tau_k + (M - tau_k) (1 - b_k)        k < N-1
//! T >= (L_k + eps) b_k                      k > 0
//! c_k <= G_k(T) + q_k (1 - b_k)
//! c_k >= G_k(T) - G_k(M) (1 - b_k)
//! c_k <= G_k(U_k) b_k
//! t >= G_k(T)
//! t = sum_k c_k
//! ```
//!
//! `M` bounds taxable income from above. Each gated row carries the smallest
//! slack that keeps it vacuous on `[0, M]`, so no coefficient dwarfs the
//! amounts it gates. `G` is convex, so `t >= G_k(T)` holds for every `k`.

use good_lp::{Expression, Variable, variable};

use super::error::ModelError;
use super::model::{ConstraintGroup, ConstraintSet, Field, VarKey, VariableRegistry};
use super::types::BracketSchedule;

impl BracketSchedule {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.rates.is_empty() {
            return Err(ModelError::config("bracket schedule needs at least one rate"));
        }
        if self.rates.len() != self.thresholds.len() + 1 {
            return Err(ModelError::config(format!(
                "bracket schedule has {} rates for {} thresholds; expected one more rate than thresholds",
                self.rates.len(),
                self.thresholds.len()
            )));
        }
        if self
            .rates
            .iter()
            .any(|r| !r.is_finite() || !(0.0..=1.0).contains(r))
        {
            return Err(ModelError::config("bracket rates must be within [0, 1]"));
        }
        if self.rates.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ModelError::config("bracket rates must be strictly increasing"));
        }
        if self.thresholds.iter().any(|t| !t.is_finite() || *t <= 0.0) {
            return Err(ModelError::config("bracket thresholds must be > 0"));
        }
        if self.thresholds.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ModelError::config(
                "bracket thresholds must be strictly increasing",
            ));
        }
        if !self.cess_rate.is_finite() || !(0.0..=1.0).contains(&self.cess_rate) {
            return Err(ModelError::config("cess rate must be within [0, 1]"));
        }
        Ok(())
    }

    pub fn bracket_count(&self) -> usize {
        self.rates.len()
    }

    pub fn cess_multiplier(&self) -> f64 {
        1.0 + self.cess_rate
    }

    pub fn lower_bound(&self, k: usize) -> f64 {
        if k == 0 { 0.0 } else { self.thresholds[k - 1] }
    }

    /// Tax owed, before cess, on income exactly at `lower_bound(k)`.
    pub fn base_tax(&self, k: usize) -> f64 {
        (0..k)
            .map(|j| self.rates[j] * (self.thresholds[j] - self.lower_bound(j)))
            .sum()
    }

    pub fn bracket_of(&self, income: f64) -> usize {
        self.thresholds
            .iter()
            .position(|&tau| income <= tau)
            .unwrap_or(self.thresholds.len())
    }

    pub fn tax_for(&self, income: f64) -> f64 {
        let income = income.max(0.0);
        let k = self.bracket_of(income);
        self.cess_multiplier()
            * (self.base_tax(k) + self.rates[k] * (income - self.lower_bound(k)))
    }
}

#[derive(Debug, Clone)]
pub struct BracketVars {
    pub indicators: Vec<Variable>,
    pub contributions: Vec<Variable>,
}

#[derive(Debug, Clone)]
pub struct BracketLinearizer<'a> {
    schedule: &'a BracketSchedule,
    big_m: f64,
    epsilon: f64,
}

impl<'a> BracketLinearizer<'a> {
    pub fn new(schedule: &'a BracketSchedule, big_m: f64, epsilon: f64) -> Result<Self, ModelError> {
        schedule.validate()?;
        let top = schedule.thresholds.last().copied().unwrap_or(0.0);
        if !big_m.is_finite() || big_m <= 0.0 || big_m <= top * schedule.cess_multiplier() {
            return Err(ModelError::config(format!(
                "big-M {big_m} must exceed the largest bracket threshold with cess"
            )));
        }
        if !epsilon.is_finite() || epsilon < 0.0 {
            return Err(ModelError::config("bracket epsilon must be >= 0"));
        }
        Ok(Self {
            schedule,
            big_m,
            epsilon,
        })
    }

    pub fn big_m(&self) -> f64 {
        self.big_m
    }

    pub fn declare(
        &self,
        registry: &mut VariableRegistry,
        person: usize,
        period: usize,
    ) -> Result<BracketVars, ModelError> {
        let n = self.schedule.bracket_count();
        let mut indicators = Vec::with_capacity(n);
        let mut contributions = Vec::with_capacity(n);
        for k in 0..n {
            indicators.push(registry.declare(
                VarKey::at(person, period, Field::BracketIndicator(k)),
                variable().binary(),
            )?);
            contributions.push(registry.declare(
                VarKey::at(person, period, Field::BracketContribution(k)),
                variable().min(0.0),
            )?);
        }
        Ok(BracketVars {
            indicators,
            contributions,
        })
    }

    pub fn linearize(
        &self,
        vars: &BracketVars,
        taxable: Variable,
        liability: Variable,
        constraints: &mut ConstraintSet,
    ) {
        let schedule = self.schedule;
        let n = schedule.bracket_count();
        let ceiling = self.big_m;

        let selected: Expression = vars.indicators.iter().copied().sum();
        constraints.push(ConstraintGroup::Bracket, selected.eq(1.0));
        constraints.push(ConstraintGroup::Bracket, Expression::from(taxable).leq(ceiling));

        for k in 0..n {
            let b = vars.indicators[k];
            let c = vars.contributions[k];

            if k + 1 < n {
                let mut upper = Expression::from(taxable);
                upper.add_mul(ceiling - schedule.thresholds[k], b);
                constraints.push(ConstraintGroup::Bracket, upper.leq(ceiling));
            }
            if k > 0 {
                let mut lower = Expression::from(taxable);
                lower.add_mul(-(schedule.lower_bound(k) + self.epsilon), b);
                constraints.push(ConstraintGroup::Bracket, lower.geq(0.0));
            }

            if k == 0 && schedule.rates[0] == 0.0 {
                constraints.push(ConstraintGroup::Bracket, Expression::from(c).eq(0.0));
                continue;
            }

            let (slope, intercept) = self.segment(k);
            let top = schedule.thresholds.get(k).copied().unwrap_or(ceiling);
            let above = intercept.max(0.0);
            let below = (slope * ceiling - intercept).max(0.0);
            let peak = (slope * top - intercept).max(0.0);

            let mut at_most = Expression::from(c);
            at_most.add_mul(-slope, taxable);
            at_most.add_mul(above, b);
            constraints.push(ConstraintGroup::Bracket, at_most.leq(above - intercept));

            let mut at_least = Expression::from(c);
            at_least.add_mul(-slope, taxable);
            at_least.add_mul(-below, b);
            constraints.push(ConstraintGroup::Bracket, at_least.geq(-intercept - below));

            let mut gate = Expression::from(c);
            gate.add_mul(-peak, b);
            constraints.push(ConstraintGroup::Bracket, gate.leq(0.0));

            let mut floor = Expression::from(liability);
            floor.add_mul(-slope, taxable);
            constraints.push(ConstraintGroup::Bracket, floor.geq(-intercept));
        }

        let mut total = Expression::from(liability);
        for &c in &vars.contributions {
            total.add_mul(-1.0, c);
        }
        constraints.push(ConstraintGroup::Bracket, total.eq(0.0));
    }

    // G_k(T) = slope * T - intercept
    fn segment(&self, k: usize) -> (f64, f64) {
        let schedule = self.schedule;
        let cess = schedule.cess_multiplier();
        let slope = cess * schedule.rates[k];
        let intercept = cess * (schedule.rates[k] * schedule.lower_bound(k) - schedule.base_tax(k));
        (slope, intercept)
    }
}
