//! Reference data the lifecycle engine reads but never writes: products and
//! their spec ranges, recipes, tanks, filling lines and plant users.
//!
//! The engine only depends on the [`ReferenceCatalog`] trait. [`StaticCatalog`]
//! is the in-memory implementation, seeded with the demo plant by default or
//! loaded from a TOML file.

mod types;

pub use types::{
    ComponentTargets, FillingLine, LineStatus, Product, ProductSpecs, QcMeasurements, QcProperty,
    Recipe, Shift, SpecCheck, SpecEvaluation, SpecRange, Tank, TankStatus, User, UserRole,
};

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Read-only lookups into plant reference data.
pub trait ReferenceCatalog: Send + Sync {
    fn product(&self, id: &str) -> Option<&Product>;
    fn recipe_for(&self, product_id: &str) -> Option<&Recipe>;
    fn user(&self, id: &str) -> Option<&User>;
    fn filling_lines(&self) -> &[FillingLine];
    fn tanks(&self) -> &[Tank];

    fn filling_line(&self, id: &str) -> Option<&FillingLine> {
        self.filling_lines().iter().find(|l| l.id == id)
    }
}

/// Filling lines a caller may offer for `start_filling`.
///
/// The engine accepts any known line; filtering out lines under
/// maintenance is the caller's job.
pub fn available_lines(catalog: &dyn ReferenceCatalog) -> Vec<&FillingLine> {
    catalog
        .filling_lines()
        .iter()
        .filter(|l| l.is_available())
        .collect()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaticCatalog {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub recipes: Vec<Recipe>,
    #[serde(default)]
    pub tanks: Vec<Tank>,
    #[serde(default)]
    pub filling_lines: Vec<FillingLine>,
    #[serde(default)]
    pub users: Vec<User>,
}

impl StaticCatalog {
    /// Loads a catalog from a TOML file with `[[products]]`, `[[recipes]]`,
    /// `[[tanks]]`, `[[filling_lines]]` and `[[users]]` tables.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog {}", path.display()))?;
        let catalog = toml::from_str::<StaticCatalog>(&contents)
            .with_context(|| format!("failed to parse catalog {}", path.display()))?;
        Ok(catalog)
    }

    /// The demo blending plant: three lubricants, four tanks, three filling
    /// lines (one down for maintenance) and one user per role.
    pub fn demo() -> Self {
        Self {
            products: vec![
                product("prod_1", "Mobil 1 5W-30", "5W-30", "Synthetic PAO", (95.0, 105.0), (0.5, 1.2), (900.0, 1100.0)),
                product("prod_2", "Mobil 1 10W-40", "10W-40", "Synthetic PAO", (95.0, 110.0), (0.6, 1.3), (850.0, 1050.0)),
                product("prod_3", "Mobil DTE 10 Excel", "46", "Mineral", (80.0, 100.0), (0.3, 0.8), (500.0, 700.0)),
            ],
            recipes: vec![
                recipe("rec_1", "prod_1", 85.0, 10.0, 5.0),
                recipe("rec_2", "prod_2", 80.0, 12.0, 8.0),
                recipe("rec_3", "prod_3", 90.0, 7.0, 3.0),
            ],
            tanks: vec![
                tank("tank_1", "Storage Tank A1", 100.0, 85.0, TankStatus::Idle),
                tank("tank_2", "Storage Tank A2", 100.0, 60.0, TankStatus::Idle),
                tank("tank_3", "Blend Tank B1", 50.0, 0.0, TankStatus::Empty),
                tank("tank_4", "Blend Tank B2", 50.0, 35.0, TankStatus::Idle),
            ],
            filling_lines: vec![
                line("line_1", "Filling Line 01", LineStatus::Idle),
                line("line_2", "Filling Line 02", LineStatus::Idle),
                line("line_3", "Filling Line 03", LineStatus::Maintenance),
            ],
            users: vec![
                user("user_1", "John Planner", UserRole::ProductionPlanner),
                user("user_2", "Ahmed Operator", UserRole::Operator),
                user("user_3", "Sarah QA", UserRole::QaEngineer),
                user("user_4", "Michael VP", UserRole::PlantManager),
            ],
        }
    }
}

impl ReferenceCatalog for StaticCatalog {
    fn product(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    fn recipe_for(&self, product_id: &str) -> Option<&Recipe> {
        self.recipes.iter().find(|r| r.product_id == product_id)
    }

    fn user(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    fn filling_lines(&self) -> &[FillingLine] {
        &self.filling_lines
    }

    fn tanks(&self) -> &[Tank] {
        &self.tanks
    }
}

fn product(
    id: &str,
    name: &str,
    grade: &str,
    base_oil: &str,
    vi: (f64, f64),
    tan: (f64, f64),
    oxidation: (f64, f64),
) -> Product {
    let range = |(min, max): (f64, f64)| SpecRange { min, max };
    Product {
        id: id.into(),
        name: name.into(),
        viscosity_grade: grade.into(),
        base_oil_type: base_oil.into(),
        specs: ProductSpecs {
            viscosity_index: range(vi),
            tan: range(tan),
            oxidation_stability: range(oxidation),
        },
    }
}

fn recipe(id: &str, product_id: &str, base: f64, add_a: f64, add_b: f64) -> Recipe {
    Recipe {
        id: id.into(),
        product_id: product_id.into(),
        base_oil_pct: base,
        additive_a_pct: add_a,
        additive_b_pct: add_b,
        tolerance_base: 2.0,
        tolerance_additive: 1.0,
    }
}

fn tank(id: &str, name: &str, capacity: f64, level: f64, status: TankStatus) -> Tank {
    Tank {
        id: id.into(),
        name: name.into(),
        capacity_kl: capacity,
        current_level_kl: level,
        status,
    }
}

fn line(id: &str, name: &str, status: LineStatus) -> FillingLine {
    FillingLine {
        id: id.into(),
        name: name.into(),
        status,
    }
}

fn user(id: &str, name: &str, role: UserRole) -> User {
    User {
        id: id.into(),
        name: name.into(),
        role,
        shift: Shift::A,
    }
}
