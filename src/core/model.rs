use std::collections::HashSet;
use std::fmt;

use good_lp::{Constraint, ProblemVariables, Variable, VariableDefinition};

use super::error::ModelError;
use super::types::VehicleKind;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Field {
    HomeRental,
    HomeRentalShare,
    Tax,
    Taxable,
    Expense,
    Disposable,
    FixedDeduction,
    TotalDeduction,
    Balance(VehicleKind),
    Income(VehicleKind),
    Flow(VehicleKind),
    BracketIndicator(usize),
    BracketContribution(usize),
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::HomeRental => write!(f, "home_rental"),
            Field::HomeRentalShare => write!(f, "home_rental_share"),
            Field::Tax => write!(f, "tax"),
            Field::Taxable => write!(f, "taxable"),
            Field::Expense => write!(f, "expense"),
            Field::Disposable => write!(f, "disposable"),
            Field::FixedDeduction => write!(f, "fixed_deduction"),
            Field::TotalDeduction => write!(f, "total_deduction"),
            Field::Balance(kind) => write!(f, "balance_{}", kind.label()),
            Field::Income(kind) => write!(f, "income_{}", kind.label()),
            Field::Flow(kind) => write!(f, "flow_{}", kind.label()),
            Field::BracketIndicator(k) => write!(f, "bracket_{k}"),
            Field::BracketContribution(k) => write!(f, "tax_part_{k}"),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct VarKey {
    pub person: usize,
    pub period: Option<usize>,
    pub field: Field,
}

impl VarKey {
    pub fn at(person: usize, period: usize, field: Field) -> Self {
        Self {
            person,
            period: Some(period),
            field,
        }
    }

    pub fn fixed(person: usize, field: Field) -> Self {
        Self {
            person,
            period: None,
            field,
        }
    }
}

impl fmt::Display for VarKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.period {
            Some(period) => write!(f, "{}_p{}_y{}", self.field, self.person, period),
            None => write!(f, "{}_p{}", self.field, self.person),
        }
    }
}

pub struct VariableRegistry {
    problem: ProblemVariables,
    declared: HashSet<VarKey>,
}

impl Default for VariableRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self {
            problem: ProblemVariables::new(),
            declared: HashSet::new(),
        }
    }

    pub fn declare(
        &mut self,
        key: VarKey,
        definition: VariableDefinition,
    ) -> Result<Variable, ModelError> {
        if !self.declared.insert(key) {
            return Err(ModelError::DuplicateVariable(key.to_string()));
        }
        Ok(self.problem.add(definition.name(key.to_string())))
    }

    pub fn declare_series(
        &mut self,
        person: usize,
        horizon: usize,
        field: Field,
        definition: impl Fn() -> VariableDefinition,
    ) -> Result<Vec<Variable>, ModelError> {
        (0..horizon)
            .map(|y| self.declare(VarKey::at(person, y, field), definition()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.declared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declared.is_empty()
    }

    pub fn into_problem(self) -> ProblemVariables {
        self.problem
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ConstraintGroup {
    InitialPin,
    Recurrence,
    HomeRental,
    Deduction,
    TaxableIncome,
    Expense,
    Disposable,
    Allocation,
    Bracket,
}

impl ConstraintGroup {
    pub const ALL: [ConstraintGroup; 9] = [
        ConstraintGroup::InitialPin,
        ConstraintGroup::Recurrence,
        ConstraintGroup::HomeRental,
        ConstraintGroup::Deduction,
        ConstraintGroup::TaxableIncome,
        ConstraintGroup::Expense,
        ConstraintGroup::Disposable,
        ConstraintGroup::Allocation,
        ConstraintGroup::Bracket,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Default)]
pub struct ConstraintSet {
    constraints: Vec<Constraint>,
    counts: [usize; ConstraintGroup::ALL.len()],
}

impl ConstraintSet {
    pub fn push(&mut self, group: ConstraintGroup, constraint: Constraint) {
        self.counts[group.index()] += 1;
        self.constraints.push(constraint);
    }

    pub fn count(&self, group: ConstraintGroup) -> usize {
        self.counts[group.index()]
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn into_constraints(self) -> Vec<Constraint> {
        self.constraints
    }
}
