use thiserror::Error;

use super::config::ConfigError;
use super::scoring::ScoringError;
use crate::core::forcefield::learned::ModelLoadError;
use crate::core::forcefield::model::EnergyError;
use crate::core::forcefield::parameterization::ParameterizationError;
use crate::core::forcefield::params::ParamLoadError;
use crate::core::fragments::library::FragmentLoadError;
use crate::core::fragments::selection::UnknownFragment;
use crate::core::io::pdb::PdbError;
use crate::core::io::report::ReportError;
use crate::core::io::sdf::SdfError;
use crate::core::models::element::Element;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid attachment atom {atom}: {reason}")]
    InvalidAttachment { atom: usize, reason: String },

    #[error("Atom {atom} ({element}) has valence {valence}, more than the allowed {allowed}")]
    Valence {
        atom: usize,
        element: Element,
        valence: f64,
        allowed: u8,
    },

    #[error("Element {element} (atom {atom}) is not supported by the {model} model")]
    UnsupportedElement {
        element: Element,
        atom: usize,
        model: &'static str,
    },

    #[error("Minimization failed to converge after {iterations} iterations")]
    Convergence { iterations: usize },

    #[error("External scoring unavailable: {0}")]
    ScoringUnavailable(#[from] ScoringError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error for '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid input: {0}")]
    Format(String),

    #[error(transparent)]
    UnknownFragment(#[from] UnknownFragment),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal logic error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_string_lossy().to_string(),
            source,
        }
    }
}

impl From<EnergyError> for EngineError {
    fn from(error: EnergyError) -> Self {
        match error {
            EnergyError::UnsupportedElement {
                element,
                atom,
                model,
            } => Self::UnsupportedElement {
                element,
                atom,
                model,
            },
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<ParameterizationError> for EngineError {
    fn from(error: ParameterizationError) -> Self {
        match error {
            ParameterizationError::MissingVdwParams { element, atom, .. } => Self::UnsupportedElement {
                element,
                atom,
                model: "classical",
            },
        }
    }
}

impl From<ParamLoadError> for EngineError {
    fn from(error: ParamLoadError) -> Self {
        Self::Format(error.to_string())
    }
}

impl From<ModelLoadError> for EngineError {
    fn from(error: ModelLoadError) -> Self {
        Self::Format(error.to_string())
    }
}

impl From<FragmentLoadError> for EngineError {
    fn from(error: FragmentLoadError) -> Self {
        match error {
            FragmentLoadError::Io { path, source } => Self::Io { path, source },
            other => Self::Format(other.to_string()),
        }
    }
}

impl From<SdfError> for EngineError {
    fn from(error: SdfError) -> Self {
        Self::Format(error.to_string())
    }
}

impl From<PdbError> for EngineError {
    fn from(error: PdbError) -> Self {
        Self::Format(error.to_string())
    }
}

impl From<ReportError> for EngineError {
    fn from(error: ReportError) -> Self {
        Self::Format(error.to_string())
    }
}
