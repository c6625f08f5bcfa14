use displaydoc::Display;
use thiserror::Error;

/// The configuration of the CAS model.
#[derive(Clone, Debug, PartialEq)]
pub struct CasConfig {
    reg_coeff: f64,
    sat_term_weight: f64,
    use_d: bool,
    use_class: bool,
    use_geometry: bool,
    trec_style: bool,
    max_iterations: usize,
}

/// Potential errors of the CAS configuration.
#[derive(Clone, Debug, Display, Error, PartialEq)]
pub enum ConfigError {
    /// Invalid regularization coefficient, expected finite non-negative value
    RegCoeff,
    /// Invalid satisfaction term weight, expected finite non-negative value
    SatTermWeight,
    /// Invalid maximum number of iterations, expected positive value
    MaxIterations,
    /// Unknown model configuration: {0}
    UnknownName(String),
}

impl Default for CasConfig {
    fn default() -> Self {
        Self {
            reg_coeff: 1.,
            sat_term_weight: 1.,
            use_d: true,
            use_class: true,
            use_geometry: true,
            trec_style: false,
            max_iterations: 100,
        }
    }
}

fn is_non_negative(value: f64) -> bool {
    value.is_finite() && value >= 0.
}

impl CasConfig {
    /// Named configurations: `CAS` and its ablations, `CAST*` for TREC style judgments.
    pub const NAMES: [&'static str; 11] = [
        "CAS",
        "CASnod",
        "CASnosat",
        "CASnoreg",
        "CASnoclass",
        "CASnogeom",
        "CASrank",
        "CAST",
        "CASTnoreg",
        "CASTnosat",
        "CASTnosatnoreg",
    ];

    /// The configuration with the given name.
    ///
    /// # Errors
    /// Fails if the name isn't one of [`NAMES`](Self::NAMES).
    pub fn named(name: &str) -> Result<Self, ConfigError> {
        let config = Self::default();
        let trec = config.clone().with_d(false).with_trec_style(true);
        match name {
            "CAS" => Ok(config),
            "CASnod" => Ok(config.with_d(false)),
            "CASnosat" => config.with_sat_term_weight(0.),
            "CASnoreg" => config.with_reg_coeff(0.),
            "CASnoclass" => Ok(config.with_class(false)),
            "CASnogeom" => Ok(config.with_geometry(false)),
            "CASrank" => Ok(config.with_class(false).with_geometry(false)),
            "CAST" => Ok(trec),
            "CASTnoreg" => trec.with_reg_coeff(0.),
            "CASTnosat" => trec.with_sat_term_weight(0.),
            "CASTnosatnoreg" => trec.with_sat_term_weight(0.)?.with_reg_coeff(0.),
            _ => Err(ConfigError::UnknownName(name.to_owned())),
        }
    }

    /// The coefficient of the L2 regularization.
    pub fn reg_coeff(&self) -> f64 {
        self.reg_coeff
    }

    /// Sets the regularization coefficient.
    ///
    /// # Errors
    /// Fails if the coefficient is negative or not finite.
    pub fn with_reg_coeff(self, reg_coeff: f64) -> Result<Self, ConfigError> {
        if is_non_negative(reg_coeff) {
            Ok(Self { reg_coeff, ..self })
        } else {
            Err(ConfigError::RegCoeff)
        }
    }

    /// The weight of the satisfaction term in the log-likelihood, `0` disables it.
    pub fn sat_term_weight(&self) -> f64 {
        self.sat_term_weight
    }

    /// Sets the satisfaction term weight.
    ///
    /// # Errors
    /// Fails if the weight is negative or not finite.
    pub fn with_sat_term_weight(self, sat_term_weight: f64) -> Result<Self, ConfigError> {
        if is_non_negative(sat_term_weight) {
            Ok(Self {
                sat_term_weight,
                ..self
            })
        } else {
            Err(ConfigError::SatTermWeight)
        }
    }

    /// True if the satisfaction term is part of the model.
    pub fn uses_sat(&self) -> bool {
        self.sat_term_weight != 0.
    }

    /// Whether direct snippet relevance contributes to satisfaction.
    pub fn use_d(&self) -> bool {
        self.use_d
    }

    pub fn with_d(self, use_d: bool) -> Self {
        Self { use_d, ..self }
    }

    /// Whether the snippet class signature is an examination feature.
    pub fn use_class(&self) -> bool {
        self.use_class
    }

    pub fn with_class(self, use_class: bool) -> Self {
        Self { use_class, ..self }
    }

    /// Whether the snippet geometry is an examination feature.
    pub fn use_geometry(&self) -> bool {
        self.use_geometry
    }

    pub fn with_geometry(self, use_geometry: bool) -> Self {
        Self {
            use_geometry,
            ..self
        }
    }

    /// Whether judgments are TREC style, i.e. a single grade per document and no snippet
    /// features apart from the rank.
    pub fn trec_style(&self) -> bool {
        self.trec_style
    }

    pub fn with_trec_style(self, trec_style: bool) -> Self {
        Self { trec_style, ..self }
    }

    /// The iteration cap of the optimizer.
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Sets the iteration cap.
    ///
    /// # Errors
    /// Fails if the cap is zero.
    pub fn with_max_iterations(self, max_iterations: usize) -> Result<Self, ConfigError> {
        if max_iterations > 0 {
            Ok(Self {
                max_iterations,
                ..self
            })
        } else {
            Err(ConfigError::MaxIterations)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_values() {
        let config = CasConfig::default();
        assert_eq!(
            config.clone().with_reg_coeff(-1.),
            Err(ConfigError::RegCoeff)
        );
        assert_eq!(
            config.clone().with_sat_term_weight(f64::NAN),
            Err(ConfigError::SatTermWeight)
        );
        assert_eq!(
            config.with_max_iterations(0),
            Err(ConfigError::MaxIterations)
        );
    }

    #[test]
    fn test_named_configs() {
        for name in CasConfig::NAMES.iter() {
            assert!(CasConfig::named(name).is_ok(), "{}", name);
        }
        assert_eq!(CasConfig::named("CAS").unwrap(), CasConfig::default());

        let rank = CasConfig::named("CASrank").unwrap();
        assert!(!rank.use_class() && !rank.use_geometry() && rank.use_d());

        let trec = CasConfig::named("CASTnosatnoreg").unwrap();
        assert!(trec.trec_style() && !trec.use_d() && !trec.uses_sat());
        assert_eq!(trec.reg_coeff(), 0.);

        assert_eq!(
            CasConfig::named("CAS2"),
            Err(ConfigError::UnknownName("CAS2".into()))
        );
    }
}
