//! Threshold catalog for monitored parameters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::parameter::Parameter;

// ------------------------------------------------------------------ //
//  Types                                                              //
// ------------------------------------------------------------------ //

/// Which side of the thresholds is unhealthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Directionality {
    HigherIsWorse,
    LowerIsWorse,
}

/// Safe/warning thresholds for a single monitored parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub parameter: Parameter,
    pub directionality: Directionality,
    pub safe_threshold: f64,
    pub warning_threshold: f64,
}

/// A `{safe, warning}` override as it appears in settings. A missing side
/// keeps the catalog's current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSetting {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<f64>,
}

impl ThresholdSetting {
    pub fn new(safe: f64, warning: f64) -> Self {
        Self { safe: Some(safe), warning: Some(warning) }
    }
}

impl ParameterSpec {
    pub fn new(
        parameter: Parameter,
        directionality: Directionality,
        safe_threshold: f64,
        warning_threshold: f64,
    ) -> Self {
        Self { parameter, directionality, safe_threshold, warning_threshold }
    }

    pub fn key(&self) -> &'static str {
        self.parameter.key()
    }

    pub fn unit(&self) -> &'static str {
        self.parameter.unit()
    }

    /// Check finiteness and ordering for the directionality.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let (safe, warning) = (self.safe_threshold, self.warning_threshold);
        if !safe.is_finite() || !warning.is_finite() {
            return Err(CatalogError::NonFinite { key: self.key().to_string(), safe, warning });
        }
        let ordered = match self.directionality {
            Directionality::HigherIsWorse => safe < warning,
            Directionality::LowerIsWorse => safe > warning,
        };
        if !ordered {
            return Err(CatalogError::Inverted {
                key: self.key().to_string(),
                direction: self.directionality,
                safe,
                warning,
            });
        }
        Ok(())
    }
}

// ------------------------------------------------------------------ //
//  Catalog                                                            //
// ------------------------------------------------------------------ //

/// A validated set of parameter thresholds.
///
/// Construction is the only place validation happens; a `Catalog` value is
/// always consistent.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    specs: BTreeMap<Parameter, ParameterSpec>,
}

impl Catalog {
    pub fn new(specs: impl IntoIterator<Item = ParameterSpec>) -> Result<Self, CatalogError> {
        let mut map = BTreeMap::new();
        for spec in specs {
            spec.validate()?;
            map.insert(spec.parameter, spec);
        }
        Ok(Self { specs: map })
    }

    /// Apply `{safe, warning}` overrides keyed by parameter key.
    ///
    /// Directionality is fixed by the catalog; only catalogued parameters
    /// can be overridden. The merged pair is validated as a whole.
    pub fn with_overrides<'a>(
        mut self,
        overrides: impl IntoIterator<Item = (&'a String, &'a ThresholdSetting)>,
    ) -> Result<Self, CatalogError> {
        for (key, setting) in overrides {
            let parameter = Parameter::from_key(key)
                .ok_or_else(|| CatalogError::UnknownParameter(key.clone()))?;
            let spec = self
                .specs
                .get_mut(&parameter)
                .ok_or_else(|| CatalogError::NotMonitored(key.clone()))?;
            let updated = ParameterSpec {
                safe_threshold: setting.safe.unwrap_or(spec.safe_threshold),
                warning_threshold: setting.warning.unwrap_or(spec.warning_threshold),
                ..*spec
            };
            updated.validate()?;
            *spec = updated;
        }
        Ok(self)
    }

    pub fn get(&self, parameter: Parameter) -> Option<&ParameterSpec> {
        self.specs.get(&parameter)
    }

    /// Specs in parameter declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.specs.values()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        use Directionality::{HigherIsWorse, LowerIsWorse};
        let specs = [
            ParameterSpec::new(Parameter::Temperature, HigherIsWorse, 20.0, 22.0),
            ParameterSpec::new(Parameter::Ph, HigherIsWorse, 7.5, 8.0),
            ParameterSpec::new(Parameter::DissolvedOxygen, LowerIsWorse, 7.0, 6.5),
            ParameterSpec::new(Parameter::Ammonia, HigherIsWorse, 0.5, 1.0),
            ParameterSpec::new(Parameter::Nitrite, HigherIsWorse, 0.2, 0.5),
            ParameterSpec::new(Parameter::Nitrate, HigherIsWorse, 20.0, 30.0),
            ParameterSpec::new(Parameter::WaterLevel, LowerIsWorse, 90.0, 85.0),
            ParameterSpec::new(Parameter::Turbidity, HigherIsWorse, 5.0, 8.0),
        ];
        Self { specs: specs.into_iter().map(|s| (s.parameter, s)).collect() }
    }
}

// ------------------------------------------------------------------ //
//  Tests                                                              //
// ------------------------------------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_catalog_is_valid() {
        let catalog = Catalog::default();
        assert_eq!(catalog.len(), 8);
        for spec in catalog.iter() {
            assert_eq!(spec.validate(), Ok(()), "{} should be valid", spec.key());
        }
    }

    #[test]
    fn default_catalog_directions() {
        let catalog = Catalog::default();
        let dir = |p| catalog.get(p).unwrap().directionality;
        assert_eq!(dir(Parameter::DissolvedOxygen), Directionality::LowerIsWorse);
        assert_eq!(dir(Parameter::WaterLevel), Directionality::LowerIsWorse);
        assert_eq!(dir(Parameter::Temperature), Directionality::HigherIsWorse);
        assert!(catalog.get(Parameter::Plankton).is_none());
    }

    #[test]
    fn inverted_higher_is_worse_rejected() {
        let spec = ParameterSpec::new(Parameter::Temperature, Directionality::HigherIsWorse, 22.0, 20.0);
        assert!(matches!(Catalog::new([spec]), Err(CatalogError::Inverted { .. })));
    }

    #[test]
    fn equal_thresholds_rejected() {
        let spec = ParameterSpec::new(Parameter::WaterLevel, Directionality::LowerIsWorse, 85.0, 85.0);
        assert!(matches!(spec.validate(), Err(CatalogError::Inverted { .. })));
    }

    #[test]
    fn nan_threshold_rejected() {
        let spec = ParameterSpec::new(Parameter::Ph, Directionality::HigherIsWorse, f64::NAN, 8.0);
        assert!(matches!(spec.validate(), Err(CatalogError::NonFinite { .. })));
    }

    #[test]
    fn override_replaces_thresholds() {
        let mut overrides = HashMap::new();
        overrides.insert("temperature".to_string(), ThresholdSetting::new(24.0, 28.0));
        let catalog = Catalog::default().with_overrides(&overrides).unwrap();
        let spec = catalog.get(Parameter::Temperature).unwrap();
        assert_eq!(spec.safe_threshold, 24.0);
        assert_eq!(spec.warning_threshold, 28.0);
        assert_eq!(spec.directionality, Directionality::HigherIsWorse);
    }

    #[test]
    fn override_with_wrong_order_for_direction_rejected() {
        let mut overrides = HashMap::new();
        overrides.insert("dissolvedOxygen".to_string(), ThresholdSetting::new(5.0, 6.0));
        let err = Catalog::default().with_overrides(&overrides).unwrap_err();
        assert!(matches!(err, CatalogError::Inverted { .. }));
    }

    #[test]
    fn override_unknown_or_unmonitored_key_rejected() {
        let mut overrides = HashMap::new();
        overrides.insert("salinity".to_string(), ThresholdSetting::new(1.0, 2.0));
        assert_eq!(
            Catalog::default().with_overrides(&overrides).unwrap_err(),
            CatalogError::UnknownParameter("salinity".into())
        );

        let mut overrides = HashMap::new();
        overrides.insert("plankton".to_string(), ThresholdSetting::new(1.0, 2.0));
        assert_eq!(
            Catalog::default().with_overrides(&overrides).unwrap_err(),
            CatalogError::NotMonitored("plankton".into())
        );
    }

    #[test]
    fn partial_override_keeps_the_other_threshold() {
        let mut overrides = HashMap::new();
        overrides.insert("temperature".to_string(), ThresholdSetting { safe: Some(21.0), warning: None });
        overrides.insert("waterLevel".to_string(), ThresholdSetting { safe: None, warning: Some(80.0) });
        let catalog = Catalog::default().with_overrides(&overrides).unwrap();

        let temp = catalog.get(Parameter::Temperature).unwrap();
        assert_eq!((temp.safe_threshold, temp.warning_threshold), (21.0, 22.0));
        let level = catalog.get(Parameter::WaterLevel).unwrap();
        assert_eq!((level.safe_threshold, level.warning_threshold), (90.0, 80.0));
    }

    #[test]
    fn partial_override_is_validated_against_the_kept_side() {
        let mut overrides = HashMap::new();
        overrides.insert("temperature".to_string(), ThresholdSetting { safe: Some(23.0), warning: None });
        assert!(matches!(
            Catalog::default().with_overrides(&overrides),
            Err(CatalogError::Inverted { .. })
        ));
    }
}
