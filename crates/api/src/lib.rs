pub mod advice;
pub mod error;
pub mod join_point;
pub mod models;

// Re-export commonly used types
pub use advice::{Advice, DeploymentModel};
pub use error::{WeaveError, WeaveResult};
pub use join_point::{JoinPoint, JoinPointKind};
pub use models::*;
