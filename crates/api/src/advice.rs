use crate::error::WeaveResult;
use crate::join_point::JoinPoint;
use crate::models::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A unit of cross-cutting behavior.
///
/// Around advice continues the chain by calling [`JoinPoint::proceed`] and may
/// skip it entirely. Pre and post advice run for their side effects; their
/// return value is ignored.
pub trait Advice: Send + Sync {
    fn execute(&self, join_point: &mut dyn JoinPoint) -> WeaveResult<Value>;
}

impl<F> Advice for F
where
    F: Fn(&mut dyn JoinPoint) -> WeaveResult<Value> + Send + Sync,
{
    fn execute(&self, join_point: &mut dyn JoinPoint) -> WeaveResult<Value> {
        self(join_point)
    }
}

/// Sharing granularity of advice instances.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub enum DeploymentModel {
    /// One instance for the whole system.
    #[default]
    PerJvm,
    /// One instance per advised class.
    PerClass,
    /// One instance per advised object.
    PerInstance,
    /// One instance per thread.
    PerThread,
}

impl fmt::Display for DeploymentModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentModel::PerJvm => "perJVM",
            DeploymentModel::PerClass => "perClass",
            DeploymentModel::PerInstance => "perInstance",
            DeploymentModel::PerThread => "perThread",
        };
        f.write_str(name)
    }
}

impl FromStr for DeploymentModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "perjvm" => Ok(DeploymentModel::PerJvm),
            "perclass" => Ok(DeploymentModel::PerClass),
            "perinstance" => Ok(DeploymentModel::PerInstance),
            "perthread" => Ok(DeploymentModel::PerThread),
            other => Err(format!("unknown deployment model: {other}")),
        }
    }
}
