//! Type-erased message payloads.
//!
//! Agents are defined over arbitrary message types unknown to the runtime
//! at compile time, so payloads cross the dispatcher as `AnyMessage`: a
//! boxed `dyn Any` plus a cached type name for logging. This is the same
//! tradeoff nautilus-core's message bus makes for its `Any`-keyed routing
//! path — flexibility over static dispatch, in exchange for a downcast at
//! the consuming end.

use std::any::Any;
use std::fmt;

/// A type-erased message payload.
pub struct AnyMessage {
    value: Box<dyn Any>,
    type_name: &'static str,
}

impl AnyMessage {
    pub fn new<T: Any>(value: T) -> Self {
        Self {
            value: Box::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    pub fn downcast<T: Any>(self) -> Result<T, Self> {
        let type_name = self.type_name;
        match self.value.downcast::<T>() {
            Ok(boxed) => Ok(*boxed),
            Err(value) => Err(Self { value, type_name }),
        }
    }
}

impl fmt::Debug for AnyMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyMessage")
            .field("type_name", &self.type_name)
            .finish()
    }
}
