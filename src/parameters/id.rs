//! Parameter identifiers
//!
//! Every quantity the forward models understand is named by a [`ParamId`]
//! rather than a free-form string. The id carries the persisted symbol, the
//! human-readable display name and unit, and the flags the optimizer needs
//! (linear-only perturbation, derived value).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a symbol does not name a known parameter
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Unknown parameter symbol '{0}'")]
pub struct UnknownParamId(pub String);

/// Identifier of a well-test model parameter.
///
/// The declaration order is the canonical iteration order used by parameter
/// maps and the store. Sweep-parameter selection instead follows the
/// case-sensitive order of [`symbol`](ParamId::symbol).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParamId {
    /// Permeability `k`
    K,
    /// Effective thickness `h`
    H,
    /// Porosity `phi`
    Phi,
    /// Fluid viscosity `mu`
    Mu,
    /// Formation volume factor `B`
    B,
    /// Total compressibility `Ct`
    Ct,
    /// Wellbore radius `rw`
    Rw,
    /// Test flow rate `q`
    Q,
    /// Wellbore storage coefficient `C`
    C,
    /// Dimensionless wellbore storage `cD`
    CD,
    /// Skin factor `S`
    S,
    /// Horizontal well length `L`
    L,
    /// Fracture half-length `Lf`
    Lf,
    /// Fracture count `nf`
    Nf,
    /// Fracture permeability `kf`
    Kf,
    /// Matrix permeability `km`
    Km,
    /// Dimensionless drainage radius `reD`
    ReD,
    /// Interporosity flow coefficient `lambda1`
    Lambda1,
    /// Storativity ratio `omega1`
    Omega1,
    /// Storativity ratio `omega2`
    Omega2,
    /// Dimensionless permeability modulus `gamaD`
    GamaD,
    /// Dimensionless inner radius `rmD`
    RmD,
    /// Dimensionless fracture length `LfD = Lf / L`
    LfD,
}

impl ParamId {
    /// All parameter ids in canonical order
    pub const ALL: [ParamId; 23] = [
        ParamId::K,
        ParamId::H,
        ParamId::Phi,
        ParamId::Mu,
        ParamId::B,
        ParamId::Ct,
        ParamId::Rw,
        ParamId::Q,
        ParamId::C,
        ParamId::CD,
        ParamId::S,
        ParamId::L,
        ParamId::Lf,
        ParamId::Nf,
        ParamId::Kf,
        ParamId::Km,
        ParamId::ReD,
        ParamId::Lambda1,
        ParamId::Omega1,
        ParamId::Omega2,
        ParamId::GamaD,
        ParamId::RmD,
        ParamId::LfD,
    ];

    /// The persisted symbol of the parameter
    pub fn symbol(self) -> &'static str {
        match self {
            ParamId::K => "k",
            ParamId::H => "h",
            ParamId::Phi => "phi",
            ParamId::Mu => "mu",
            ParamId::B => "B",
            ParamId::Ct => "Ct",
            ParamId::Rw => "rw",
            ParamId::Q => "q",
            ParamId::C => "C",
            ParamId::CD => "cD",
            ParamId::S => "S",
            ParamId::L => "L",
            ParamId::Lf => "Lf",
            ParamId::Nf => "nf",
            ParamId::Kf => "kf",
            ParamId::Km => "km",
            ParamId::ReD => "reD",
            ParamId::Lambda1 => "lambda1",
            ParamId::Omega1 => "omega1",
            ParamId::Omega2 => "omega2",
            ParamId::GamaD => "gamaD",
            ParamId::RmD => "rmD",
            ParamId::LfD => "LfD",
        }
    }

    /// Human-readable name shown next to the value
    pub fn display_name(self) -> &'static str {
        match self {
            ParamId::K => "Permeability",
            ParamId::H => "Effective thickness",
            ParamId::Phi => "Porosity",
            ParamId::Mu => "Fluid viscosity",
            ParamId::B => "Formation volume factor",
            ParamId::Ct => "Total compressibility",
            ParamId::Rw => "Wellbore radius",
            ParamId::Q => "Test flow rate",
            ParamId::C => "Wellbore storage",
            ParamId::CD => "Dimensionless wellbore storage",
            ParamId::S => "Skin factor",
            ParamId::L => "Horizontal well length",
            ParamId::Lf => "Fracture half-length",
            ParamId::Nf => "Fracture count",
            ParamId::Kf => "Fracture permeability",
            ParamId::Km => "Matrix permeability",
            ParamId::ReD => "Dimensionless drainage radius",
            ParamId::Lambda1 => "Interporosity flow coefficient",
            ParamId::Omega1 => "Storativity ratio 1",
            ParamId::Omega2 => "Storativity ratio 2",
            ParamId::GamaD => "Permeability modulus",
            ParamId::RmD => "Dimensionless inner radius",
            ParamId::LfD => "Dimensionless fracture length",
        }
    }

    /// Unit string; empty for dimensionless quantities and fractions.
    /// The fracture count is reported in `count`.
    pub fn unit(self) -> &'static str {
        match self {
            ParamId::K | ParamId::Kf | ParamId::Km => "mD",
            ParamId::H | ParamId::Rw | ParamId::L | ParamId::Lf => "m",
            ParamId::Mu => "mPa·s",
            ParamId::Ct => "MPa⁻¹",
            ParamId::Q => "m³/d",
            ParamId::C => "m³/MPa",
            ParamId::Nf => "count",
            _ => "",
        }
    }

    /// Parameters that are always perturbed and updated additively.
    ///
    /// Skin can be negative and the fracture count is an integer-like quantity,
    /// so neither is moved in log space.
    pub fn is_linear_only(self) -> bool {
        matches!(self, ParamId::S | ParamId::Nf)
    }

    /// Whether the value is computed from other parameters
    pub fn is_derived(self) -> bool {
        super::derived::rule_for(self).is_some()
    }

    /// Default UI increment for a parameter created with `value`
    pub fn default_step(self, value: f64) -> f64 {
        match self {
            ParamId::K | ParamId::Kf | ParamId::Km => 1.0,
            ParamId::S => 0.1,
            ParamId::C | ParamId::CD | ParamId::Phi => 0.01,
            _ if value != 0.0 => (value * 0.1).abs(),
            _ => 0.1,
        }
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for ParamId {
    type Err = UnknownParamId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ParamId::ALL
            .iter()
            .copied()
            .find(|id| id.symbol() == s)
            .ok_or_else(|| UnknownParamId(s.to_string()))
    }
}

impl Serialize for ParamId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.symbol())
    }
}

impl<'de> Deserialize<'de> for ParamId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let symbol = String::deserialize(deserializer)?;
        symbol.parse().map_err(serde::de::Error::custom)
    }
}
