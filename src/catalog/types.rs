use std::fmt;

use serde::{Deserialize, Serialize};

use crate::batch::QcResult;

/// Production shift label. Plants here run three fixed shifts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Shift {
    A,
    B,
    C,
}

impl Shift {
    pub const ALL: [Shift; 3] = [Shift::A, Shift::B, Shift::C];
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shift::A => write!(f, "A"),
            Shift::B => write!(f, "B"),
            Shift::C => write!(f, "C"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    ProductionPlanner,
    Operator,
    QaEngineer,
    PlantManager,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub role: UserRole,
    pub shift: Shift,
}

/// Inclusive acceptance range for one measured property.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpecRange {
    pub min: f64,
    pub max: f64,
}

impl SpecRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl fmt::Display for SpecRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSpecs {
    pub viscosity_index: SpecRange,
    pub tan: SpecRange,
    pub oxidation_stability: SpecRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub viscosity_grade: String,
    pub base_oil_type: String,
    pub specs: ProductSpecs,
}

impl Product {
    /// Compares lab measurements against this product's spec ranges.
    ///
    /// The result is a display aid for the QC engineer; the lifecycle engine
    /// records whatever decision the engineer makes regardless of it.
    pub fn evaluate(&self, measured: &QcMeasurements) -> SpecEvaluation {
        let checks = [
            (QcProperty::ViscosityIndex, measured.viscosity_index, self.specs.viscosity_index),
            (QcProperty::Tan, measured.tan, self.specs.tan),
            (
                QcProperty::OxidationStability,
                measured.oxidation_stability,
                self.specs.oxidation_stability,
            ),
        ]
        .into_iter()
        .map(|(property, value, range)| SpecCheck {
            property,
            measured: value,
            range,
            within: range.contains(value),
        })
        .collect();

        SpecEvaluation { checks }
    }
}

/// Lab results entered on the QC form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QcMeasurements {
    pub viscosity_index: f64,
    pub tan: f64,
    pub oxidation_stability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QcProperty {
    ViscosityIndex,
    Tan,
    OxidationStability,
}

impl fmt::Display for QcProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QcProperty::ViscosityIndex => write!(f, "Viscosity Index"),
            QcProperty::Tan => write!(f, "Total Acid Number (TAN)"),
            QcProperty::OxidationStability => write!(f, "Oxidation Stability"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecCheck {
    pub property: QcProperty,
    pub measured: f64,
    pub range: SpecRange,
    pub within: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecEvaluation {
    pub checks: Vec<SpecCheck>,
}

impl SpecEvaluation {
    pub fn all_within(&self) -> bool {
        self.checks.iter().all(|c| c.within)
    }

    pub fn out_of_spec(&self) -> impl Iterator<Item = &SpecCheck> {
        self.checks.iter().filter(|c| !c.within)
    }

    /// PASS when every property is in range, otherwise HOLD for re-test.
    /// Failing a batch outright stays an engineer's call.
    pub fn suggested_result(&self) -> QcResult {
        if self.all_within() {
            QcResult::Pass
        } else {
            QcResult::Hold
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: String,
    pub product_id: String,
    pub base_oil_pct: f64,
    pub additive_a_pct: f64,
    pub additive_b_pct: f64,
    pub tolerance_base: f64,
    pub tolerance_additive: f64,
}

impl Recipe {
    /// Component volumes needed to blend `planned_qty_kl` of product.
    pub fn targets(&self, planned_qty_kl: f64) -> ComponentTargets {
        ComponentTargets {
            base_oil_kl: self.base_oil_pct / 100.0 * planned_qty_kl,
            additive_a_kl: self.additive_a_pct / 100.0 * planned_qty_kl,
            additive_b_kl: self.additive_b_pct / 100.0 * planned_qty_kl,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentTargets {
    pub base_oil_kl: f64,
    pub additive_a_kl: f64,
    pub additive_b_kl: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TankStatus {
    Empty,
    Idle,
    InUse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tank {
    pub id: String,
    pub name: String,
    pub capacity_kl: f64,
    pub current_level_kl: f64,
    pub status: TankStatus,
}

impl Tank {
    pub fn fill_pct(&self) -> f64 {
        if self.capacity_kl > 0.0 {
            self.current_level_kl / self.capacity_kl * 100.0
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStatus {
    Idle,
    Filling,
    Maintenance,
}

impl fmt::Display for LineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineStatus::Idle => write!(f, "idle"),
            LineStatus::Filling => write!(f, "filling"),
            LineStatus::Maintenance => write!(f, "maintenance"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillingLine {
    pub id: String,
    pub name: String,
    pub status: LineStatus,
}

impl FillingLine {
    pub fn is_available(&self) -> bool {
        self.status != LineStatus::Maintenance
    }
}
