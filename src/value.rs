// Nexus Core: reactive value-synchronization library
//
// SPDX-License-Identifier: Apache-2.0
//
// Copyright (C) 2025-2026 the nexus-core contributors.
// All rights under the above copyright are reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except
// in compliance with the License. You may obtain a copy of the License at
//
//        http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software distributed under the License
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express
// or implied. See the License for the specific language governing permissions and limitations under
// the License.

//! The payload stored by a nexus.
//!
//! A nexus is type-erased internally (`Box<dyn Value>`) so that one [`crate::NexusManager`] can
//! coordinate hooks of unrelated concrete types; [`crate::Hook<V>`] recovers the concrete type at
//! its public boundary via [`core::any::Any::downcast_ref`].

use core::any::Any;
use core::fmt::Debug;

/// Contract required of anything that can live inside a nexus.
///
/// Only equality and cloning are load-bearing for the core (§6 "Collaborator interfaces"):
/// equality drives the phase 1 short-circuit and the phase 3 conflict check, cloning is what lets
/// [`crate::Hook::isolate`] and [`crate::Hook::snapshot`] hand out values that are independent of
/// the nexus's stored copy. `Debug` is required only so that error messages and `#[derive(Debug)]`
/// on internal state can format a candidate without a further bound.
///
/// Blanket-implemented for every `'static + Clone + PartialEq + Debug + Send + Sync` type; there
/// is ordinarily no reason to implement it by hand.
pub trait Value: Any + Debug + Send + Sync {
    /// Structural equality against another type-erased value.
    ///
    /// Returns `false`, rather than panicking, when `other` is a different concrete type: two
    /// hooks of unrelated types are never considered to hold equal values.
    fn value_eq(&self, other: &dyn Value) -> bool;

    /// An independent clone, safe to store in a nexus of its own (used by isolation) or to hand
    /// back to a caller (used by `snapshot`).
    fn value_clone(&self) -> Box<dyn Value>;

    /// Upcast for [`core::any::Any::downcast_ref`].
    fn as_any(&self) -> &dyn Any;
}

impl<T> Value for T
where T: Any + Clone + PartialEq + Debug + Send + Sync
{
    fn value_eq(&self, other: &dyn Value) -> bool {
        match other.as_any().downcast_ref::<T>() {
            Some(other) => self == other,
            None => false,
        }
    }

    fn value_clone(&self) -> Box<dyn Value> { Box::new(self.clone()) }

    fn as_any(&self) -> &dyn Any { self }
}

impl dyn Value {
    /// Downcasts a type-erased value back to its concrete type.
    ///
    /// # Panics
    ///
    /// Panics if `V` is not the concrete type the value was stored as. Every call site in this
    /// crate downcasts using the same `V` the nexus was created or last committed with, so this
    /// can only fire on an internal bookkeeping bug, never from caller-supplied input.
    pub(crate) fn downcast<V: Value + Clone>(&self) -> V {
        self.as_any()
            .downcast_ref::<V>()
            .expect("nexus value type mismatch: hook and nexus disagree on the stored type")
            .clone()
    }
}

pub(crate) fn boxed_eq(a: &dyn Value, b: &dyn Value) -> bool { a.value_eq(b) }
