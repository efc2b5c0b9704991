pub mod cflow;
pub mod config;
pub mod controller;
pub mod error;
pub mod expression;
pub mod join_point;
pub mod logging;
pub mod metadata;
pub mod pattern;
pub mod pointcut;
pub mod registry;
pub mod system;

pub use config::SystemConfig;
pub use controller::{Controller, ControllerRegistry};
pub use error::Result;
pub use join_point::{
    AdviceGroupSnapshot, CallerSideJoinPoint, DetachedInvocation, FieldJoinPoint, Invocation,
    JoinPointSnapshot, MethodJoinPoint, Operation, Target, ThrowsJoinPoint,
};
pub use pointcut::{AdviceSlot, Pointcut, PointcutDefinition, PointcutKind};
pub use registry::{AdviceIndex, AdviceRegistry};
pub use system::{AspectSystem, SystemTable};
