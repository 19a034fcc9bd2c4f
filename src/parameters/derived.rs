//! Derived parameters
//!
//! Some parameters are never edited directly: their value is a function of
//! other parameters. The relationships are listed once in [`DERIVED_RULES`] and
//! every mutation path (store edits, optimizer trial steps, Jacobian
//! perturbations, sensitivity substitutions, state loading) calls
//! [`recompute_derived`] afterwards.

use super::id::ParamId;
use super::ParameterMap;

/// Smallest primary length for which the fracture length ratio is defined
pub const MIN_PRIMARY_LENGTH: f64 = 1e-9;

/// A derived parameter: `target = formula(inputs)`
#[derive(Debug)]
pub struct DerivedRule {
    /// The parameter whose value is computed
    pub target: ParamId,

    /// The parameters the formula reads
    pub inputs: &'static [ParamId],

    /// Returns `None` when the inputs are missing or outside the formula's domain
    formula: fn(&ParameterMap) -> Option<f64>,
}

impl DerivedRule {
    /// Evaluate the rule against a map without modifying it
    pub fn evaluate(&self, map: &ParameterMap) -> Option<f64> {
        (self.formula)(map)
    }
}

/// All derived parameters, evaluated in order
pub static DERIVED_RULES: &[DerivedRule] = &[DerivedRule {
    target: ParamId::LfD,
    inputs: &[ParamId::Lf, ParamId::L],
    formula: fracture_length_ratio,
}];

fn fracture_length_ratio(map: &ParameterMap) -> Option<f64> {
    let lf = *map.get(&ParamId::Lf)?;
    let l = *map.get(&ParamId::L)?;
    (l > MIN_PRIMARY_LENGTH).then(|| lf / l)
}

/// The rule computing `id`, if `id` is derived
pub fn rule_for(id: ParamId) -> Option<&'static DerivedRule> {
    DERIVED_RULES.iter().find(|rule| rule.target == id)
}

/// Whether changing `id` invalidates some derived value
pub fn feeds_derived(id: ParamId) -> bool {
    DERIVED_RULES.iter().any(|rule| rule.inputs.contains(&id))
}

/// Recompute every derived parameter in place.
///
/// A rule that cannot be evaluated leaves its target untouched.
pub fn recompute_derived(map: &mut ParameterMap) {
    for rule in DERIVED_RULES {
        if let Some(value) = rule.evaluate(map) {
            map.insert(rule.target, value);
        }
    }
}
