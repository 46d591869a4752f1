//! Cloud provider tags.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// A cloud provider that hosts managed Kubernetes clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Amazon Web Services (EKS).
    Aws,
    /// Microsoft Azure (AKS).
    Azure,
    /// Google Cloud Platform (GKE).
    Gcp,
}

impl Provider {
    /// All supported providers, in a stable order.
    pub const ALL: [Self; 3] = [Self::Aws, Self::Azure, Self::Gcp];

    /// The wire tag for this provider.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::Azure => "azure",
            Self::Gcp => "gcp",
        }
    }

    /// The upper-case form used in environment variable names.
    #[must_use]
    pub const fn env_prefix(self) -> &'static str {
        match self {
            Self::Aws => "AWS",
            Self::Azure => "AZURE",
            Self::Gcp => "GCP",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aws" | "eks" => Ok(Self::Aws),
            "azure" | "aks" => Ok(Self::Azure),
            "gcp" | "gke" | "google" => Ok(Self::Gcp),
            _ => Err(CoreError::UnknownProvider(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_tags() {
        assert_eq!("aws".parse::<Provider>().unwrap(), Provider::Aws);
        assert_eq!("AKS".parse::<Provider>().unwrap(), Provider::Azure);
        assert_eq!(" gke ".parse::<Provider>().unwrap(), Provider::Gcp);
    }

    #[test]
    fn parse_unknown_tag() {
        let err = "digitalocean".parse::<Provider>().unwrap_err();
        assert_eq!(err, CoreError::UnknownProvider("digitalocean".into()));
    }

    #[test]
    fn display_matches_wire_tag() {
        for provider in Provider::ALL {
            assert_eq!(provider.to_string(), provider.as_str());
            assert_eq!(provider.as_str().parse::<Provider>().unwrap(), provider);
        }
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&Provider::Gcp).unwrap();
        assert_eq!(json, "\"gcp\"");
    }
}
