use serde::{Deserialize, Serialize};
use std::fmt;

/// One frame of a [`Throwable`] stack trace.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub class_name: String,
    pub method_name: String,
    /// Frames added by the dispatch machinery rather than by user code.
    #[serde(default)]
    pub synthetic: bool,
}

impl StackFrame {
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
            synthetic: false,
        }
    }

    pub fn synthetic(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            synthetic: true,
            ..Self::new(class_name, method_name)
        }
    }
}

/// An exception raised by advice or by an intercepted operation.
///
/// `class_name` is the fully qualified exception type; throws pointcuts match
/// against it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Throwable {
    pub class_name: String,
    pub message: String,
    #[serde(default)]
    pub frames: Vec<StackFrame>,
    #[serde(default)]
    pub cause: Option<Box<Throwable>>,
}

impl Throwable {
    pub fn new(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            message: message.into(),
            frames: Vec::new(),
            cause: None,
        }
    }

    pub fn with_frame(mut self, frame: StackFrame) -> Self {
        self.frames.push(frame);
        self
    }

    pub fn with_cause(mut self, cause: Throwable) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn push_frame(&mut self, frame: StackFrame) {
        self.frames.push(frame);
    }

    /// Drops dispatch frames so the trace reads as if the exception escaped
    /// the unadvised call site. Applies to the whole cause chain.
    pub fn strip_synthetic_frames(&mut self) {
        self.frames.retain(|f| !f.synthetic);
        if let Some(cause) = self.cause.as_mut() {
            cause.strip_synthetic_frames();
        }
    }

    pub fn has_synthetic_frames(&self) -> bool {
        self.frames.iter().any(|f| f.synthetic)
            || self
                .cause
                .as_ref()
                .is_some_and(|c| c.has_synthetic_frames())
    }
}

impl fmt::Display for Throwable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.class_name, self.message)
    }
}

impl std::error::Error for Throwable {}
