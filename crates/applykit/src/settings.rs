//! Tool names and generator image used when building invocations

use serde::{Deserialize, Serialize};

/// Default container image for the Deployment Manager autogen generator
pub const DEFAULT_AUTOGEN_IMAGE: &str = "gcr.io/cloud-marketplace-tools/dm/autogen";

/// Settings consulted by resources while applying
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub tools: Tools,
    pub autogen: AutogenSettings,
}

/// External programs invoked through the executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tools {
    pub docker: String,
    pub zip: String,
    pub gsutil: String,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            docker: "docker".to_string(),
            zip: "zip".to_string(),
            gsutil: "gsutil".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutogenSettings {
    /// Image used when a template does not name one
    pub image: String,
}

impl Default for AutogenSettings {
    fn default() -> Self {
        Self {
            image: DEFAULT_AUTOGEN_IMAGE.to_string(),
        }
    }
}
