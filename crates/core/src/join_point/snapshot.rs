use crate::error::{ConfigError, WeaveResult};
use crate::pointcut::AdviceTuple;
use serde::{Deserialize, Serialize};
use weave_api::{FieldMeta, JoinPointKind, MethodMeta};

/// Serializable state of a join point or invocation.
///
/// Holds the owning system's uuid instead of any live handle; restoring
/// looks the system up again.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct JoinPointSnapshot {
    pub system: String,
    pub kind: JoinPointKind,
    pub class_name: String,
    #[serde(default)]
    pub method: Option<MethodMeta>,
    #[serde(default)]
    pub field: Option<FieldMeta>,
    pub controller: String,
    #[serde(default)]
    pub groups: Vec<AdviceGroupSnapshot>,
    #[serde(default)]
    pub non_reentrant: bool,
    #[serde(default)]
    pub cursor: usize,
}

/// Advice bound through one pointcut, identified by its qualified name.
/// Without a name the tuples are a chain that was already evaluated.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AdviceGroupSnapshot {
    #[serde(default)]
    pub pointcut: Option<String>,
    pub advice: Vec<AdviceTuple>,
}

impl JoinPointSnapshot {
    /// Every tuple in chain order.
    pub fn advice(&self) -> Vec<AdviceTuple> {
        self.groups
            .iter()
            .flat_map(|group| group.advice.iter().cloned())
            .collect()
    }

    pub fn to_json(&self) -> WeaveResult<String> {
        Ok(serde_json::to_string(self).map_err(ConfigError::from)?)
    }

    pub fn from_json(json: &str) -> WeaveResult<Self> {
        Ok(serde_json::from_str(json).map_err(ConfigError::from)?)
    }
}
