//! Worker trait and registration types
//!
//! A worker is a polymorphic processor: it consumes a [`Work`] item and
//! produces a [`WorkResult`]. Implementations are expected to be
//! deterministic functions of the input and any worker-local immutable
//! configuration.

use crate::result::WorkResult;
use crate::work::Work;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Erased payload type tag, used only by workflow validation.
///
/// Payloads are JSON values, so the tag vocabulary mirrors the JSON value
/// kinds. `Any` is the ancestor of every tag; `Integer` promotes to `Float`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    Text,
    Integer,
    Float,
    Boolean,
    Array,
    Object,
    Any,
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Text => write!(f, "text"),
            TypeTag::Integer => write!(f, "integer"),
            TypeTag::Float => write!(f, "float"),
            TypeTag::Boolean => write!(f, "boolean"),
            TypeTag::Array => write!(f, "array"),
            TypeTag::Object => write!(f, "object"),
            TypeTag::Any => write!(f, "any"),
        }
    }
}

impl TypeTag {
    /// Whether a consumer declaring `self` accepts a producer emitting
    /// `producer`: same tag, `Any` on either side, or integer-to-float
    /// numeric promotion.
    pub fn accepts(&self, producer: TypeTag) -> bool {
        if *self == producer || *self == TypeTag::Any || producer == TypeTag::Any {
            return true;
        }
        matches!((*self, producer), (TypeTag::Float, TypeTag::Integer))
    }
}

/// Polymorphic work processor.
///
/// `process` must not panic for expected failures; return a failure
/// [`WorkResult`] instead. Unexpected panics are contained by the actor
/// and converted into error results.
#[async_trait::async_trait]
pub trait Worker: Send + Sync {
    /// Process one work item
    async fn process(&self, work: Work) -> WorkResult;

    /// Instance-level timeout override
    fn timeout(&self) -> Option<Duration> {
        None
    }
}

/// Registration type for a worker class.
///
/// Each actor owns its own worker instance produced by `create`; the
/// factory carries the class-level declarations (name, type tags, default
/// timeout) used by pools and workflow validation.
pub trait WorkerFactory: Send + Sync {
    /// Create one worker instance for an actor
    fn create(&self) -> Arc<dyn Worker>;

    /// Worker class name, used in actor names and logs
    fn worker_name(&self) -> &str;

    /// Declared input payload tag
    fn input_tag(&self) -> Option<TypeTag> {
        None
    }

    /// Declared output payload tag
    fn output_tag(&self) -> Option<TypeTag> {
        None
    }

    /// Class-level timeout; overridden by an instance timeout or a
    /// per-work timeout
    fn default_timeout(&self) -> Option<Duration> {
        None
    }
}

/// Factory handing out a shared worker instance.
///
/// Suitable for stateless workers; the instance is immutable so sharing
/// it across actors preserves isolation semantics.
pub struct SharedWorkerFactory {
    worker: Arc<dyn Worker>,
    name: String,
    input_tag: Option<TypeTag>,
    output_tag: Option<TypeTag>,
    default_timeout: Option<Duration>,
}

impl SharedWorkerFactory {
    pub fn new(name: impl Into<String>, worker: Arc<dyn Worker>) -> Self {
        Self {
            worker,
            name: name.into(),
            input_tag: None,
            output_tag: None,
            default_timeout: None,
        }
    }

    /// Declare the input payload tag
    pub fn with_input_tag(mut self, tag: TypeTag) -> Self {
        self.input_tag = Some(tag);
        self
    }

    /// Declare the output payload tag
    pub fn with_output_tag(mut self, tag: TypeTag) -> Self {
        self.output_tag = Some(tag);
        self
    }

    /// Declare the class-level timeout
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }
}

impl WorkerFactory for SharedWorkerFactory {
    fn create(&self) -> Arc<dyn Worker> {
        self.worker.clone()
    }

    fn worker_name(&self) -> &str {
        &self.name
    }

    fn input_tag(&self) -> Option<TypeTag> {
        self.input_tag
    }

    fn output_tag(&self) -> Option<TypeTag> {
        self.output_tag
    }

    fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }
}

/// A pool declaration: a worker class and how many actors should host it
#[derive(Clone)]
pub struct WorkerPool {
    /// Worker class registration
    pub factory: Arc<dyn WorkerFactory>,

    /// Number of actors; defaults to host CPU count when absent
    pub num_workers: Option<usize>,
}

impl WorkerPool {
    pub fn new(factory: Arc<dyn WorkerFactory>) -> Self {
        Self {
            factory,
            num_workers: None,
        }
    }

    pub fn with_workers(factory: Arc<dyn WorkerFactory>, num_workers: usize) -> Self {
        Self {
            factory,
            num_workers: Some(num_workers),
        }
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("worker", &self.factory.worker_name())
            .field("num_workers", &self.num_workers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::WorkError;
    use serde_json::json;

    struct Doubler;

    #[async_trait::async_trait]
    impl Worker for Doubler {
        async fn process(&self, work: Work) -> WorkResult {
            match work.input().as_i64() {
                Some(n) => WorkResult::success(work, json!(n * 2)),
                None => WorkResult::failure(
                    work,
                    WorkError::Validation("expected an integer".to_string()),
                ),
            }
        }
    }

    #[tokio::test]
    async fn test_worker_process() {
        let worker = Doubler;
        let result = worker.process(Work::new(json!(21))).await;
        assert_eq!(result.result(), Some(&json!(42)));

        let result = worker.process(Work::new(json!("nope"))).await;
        assert!(result.is_failure());
    }

    #[test]
    fn test_type_tag_compatibility() {
        assert!(TypeTag::Integer.accepts(TypeTag::Integer));
        assert!(TypeTag::Float.accepts(TypeTag::Integer)); // numeric promotion
        assert!(!TypeTag::Integer.accepts(TypeTag::Float));
        assert!(TypeTag::Any.accepts(TypeTag::Text));
        assert!(TypeTag::Text.accepts(TypeTag::Any));
        assert!(!TypeTag::Text.accepts(TypeTag::Object));
    }

    #[test]
    fn test_shared_factory_declarations() {
        let factory = SharedWorkerFactory::new("doubler", Arc::new(Doubler))
            .with_input_tag(TypeTag::Integer)
            .with_output_tag(TypeTag::Integer)
            .with_default_timeout(Duration::from_secs(10));

        assert_eq!(factory.worker_name(), "doubler");
        assert_eq!(factory.input_tag(), Some(TypeTag::Integer));
        assert_eq!(factory.output_tag(), Some(TypeTag::Integer));
        assert_eq!(factory.default_timeout(), Some(Duration::from_secs(10)));
    }
}
