// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Compound types bound to multi-field definitions.
//!
//! A [`SimStruct`] exposes a static table of [`FieldSpec`]s. Binding
//! validates each field's Rust type against its declared data type, orders
//! the fields by explicit order then declaration order, and registers them
//! all under one definition. The binding is cached per type.
//!
//! The [`sim_struct!`](crate::sim_struct) macro generates the type and its
//! field table:
//!
//! ```rust
//! use simlink::sim_struct;
//! use simlink::binder::SimStruct;
//!
//! sim_struct! {
//!     #[derive(Debug, Clone, PartialEq)]
//!     pub struct Position {
//!         #[sim("PLANE LATITUDE", "degrees", Float64, order = 1)]
//!         pub latitude: f64,
//!         #[sim("PLANE LONGITUDE", "degrees", Float64, order = 0)]
//!         pub longitude: f64,
//!         #[sim("TITLE", "", FixedString(128))]
//!         pub title: String,
//!     }
//! }
//!
//! assert_eq!(Position::fields().len(), 3);
//! assert_eq!(Position::fields()[0].order, Some(1));
//! ```

use crate::codec::{self, SimType, SimValue};
use crate::error::{Result, SimError};
use crate::layout;
use crate::logging::Logger;
use crate::native::NativeService;
use crate::schema::{DataType, FieldSchema, HostType};
use crate::DefinitionId;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::any::TypeId;
use std::ops::Range;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Static description of one field of a compound type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Simulator variable name.
    pub name: &'static str,
    pub unit: &'static str,
    pub data_type: DataType,
    /// Explicit position; unordered fields follow the ordered ones.
    pub order: Option<i32>,
    /// Rust type of the field.
    pub host: HostType,
    /// Rust field identifier, for diagnostics.
    pub rust_field: &'static str,
}

/// A Rust type read and written as one multi-field definition.
///
/// Values cross this trait in declaration order.
pub trait SimStruct: Sized + Send + 'static {
    const TYPE_NAME: &'static str;

    fn fields() -> &'static [FieldSpec];

    fn to_values(&self) -> Vec<SimValue>;

    fn from_values(values: Vec<SimValue>) -> Result<Self>;
}

/// Pop the next declared field from `values` as `T`.
#[doc(hidden)]
pub fn take_field<T: SimType>(values: &mut impl Iterator<Item = SimValue>) -> Result<T> {
    let value = values
        .next()
        .ok_or(SimError::Truncated { need: 1, have: 0 })?;
    T::from_value(value)
}

#[doc(hidden)]
#[macro_export]
macro_rules! __sim_order {
    () => {
        ::core::option::Option::None
    };
    ($order:expr) => {
        ::core::option::Option::Some($order)
    };
}

/// Declare a struct bound to simulator variables.
///
/// Every field carries `#[sim(name, unit, DataType $(, order = N)?)]`;
/// `DataType` is a variant of [`DataType`](crate::schema::DataType), with
/// its width for `FixedString(n)`.
#[macro_export]
macro_rules! sim_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                #[sim(
                    $fname:literal, $unit:literal, $dt:ident $(($width:expr))?
                    $(, order = $order:expr)?
                )]
                $fvis:vis $field:ident : $fty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $($fvis $field: $fty,)*
        }

        impl $crate::binder::SimStruct for $name {
            const TYPE_NAME: &'static str = stringify!($name);

            fn fields() -> &'static [$crate::binder::FieldSpec] {
                const FIELDS: &[$crate::binder::FieldSpec] = &[
                    $($crate::binder::FieldSpec {
                        name: $fname,
                        unit: $unit,
                        data_type: $crate::schema::DataType::$dt $(($width))?,
                        order: $crate::__sim_order!($($order)?),
                        host: <$fty as $crate::codec::SimType>::HOST,
                        rust_field: stringify!($field),
                    },)*
                ];
                FIELDS
            }

            fn to_values(&self) -> ::std::vec::Vec<$crate::codec::SimValue> {
                ::std::vec![$($crate::codec::SimType::to_value(&self.$field)),*]
            }

            #[allow(unused_mut, unused_variables)]
            fn from_values(
                values: ::std::vec::Vec<$crate::codec::SimValue>,
            ) -> $crate::Result<Self> {
                let mut values = values.into_iter();
                ::core::result::Result::Ok(Self {
                    $($field: $crate::binder::take_field::<$fty>(&mut values)?,)*
                })
            }
        }
    };
}

/// One field placed in a bound layout.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundField {
    /// Position in the type's declaration.
    pub declared: usize,
    pub schema: FieldSchema,
    pub host: HostType,
    /// Byte offset in the payload.
    pub offset: usize,
}

/// Registered layout of a compound type.
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundBinding {
    pub type_name: &'static str,
    pub definition: DefinitionId,
    /// Fields in payload order.
    pub fields: Vec<BoundField>,
    /// Payload size in bytes.
    pub size: usize,
}

impl CompoundBinding {
    /// Validate and order the fields of `T`. Nothing is registered.
    pub fn plan<T: SimStruct>(definition: DefinitionId) -> Result<Self> {
        let specs = T::fields();
        if specs.is_empty() {
            return Err(SimError::NoAnnotatedFields(T::TYPE_NAME));
        }

        for spec in specs {
            layout::size_of(spec.data_type)?;
            if !codec::is_exact(spec.data_type, spec.host) {
                return Err(SimError::SchemaTypeMismatch {
                    field: spec.name.to_string(),
                    expected: spec.data_type,
                    found: spec.host,
                });
            }
        }

        let mut order: Vec<usize> = (0..specs.len()).collect();
        order.sort_by_key(|&i| (specs[i].order.unwrap_or(i32::MAX), i));

        let types: Vec<DataType> = order.iter().map(|&i| specs[i].data_type).collect();
        let layout = layout::Layout::of(&types)?;

        let fields = order
            .iter()
            .zip(layout.offsets)
            .map(|(&i, offset)| {
                let spec = &specs[i];
                BoundField {
                    declared: i,
                    schema: FieldSchema::new(spec.name, spec.unit, spec.data_type),
                    host: spec.host,
                    offset,
                }
            })
            .collect();

        Ok(Self {
            type_name: T::TYPE_NAME,
            definition,
            fields,
            size: layout.size,
        })
    }

    /// Decode a payload into values in declaration order.
    pub fn decode(&self, payload: &[u8]) -> Result<Vec<SimValue>> {
        if payload.len() < self.size {
            return Err(SimError::Truncated {
                need: self.size,
                have: payload.len(),
            });
        }
        let mut slots: Vec<Option<SimValue>> = vec![None; self.fields.len()];
        for field in &self.fields {
            let value = codec::decode(payload, field.offset, field.schema.data_type, field.host)?;
            slots[field.declared] = Some(value);
        }
        Ok(slots.into_iter().flatten().collect())
    }

    /// Encode values given in declaration order into one payload.
    pub fn encode(&self, values: &[SimValue]) -> Result<Vec<u8>> {
        if values.len() != self.fields.len() {
            return Err(SimError::Truncated {
                need: self.fields.len(),
                have: values.len(),
            });
        }
        let mut out = Vec::with_capacity(self.size);
        for field in &self.fields {
            codec::encode_into(&values[field.declared], field.schema.data_type, &mut out)?;
        }
        Ok(out)
    }
}

/// Per-connection compound binding cache.
pub struct StructBinder {
    native: Arc<dyn NativeService>,
    bindings: DashMap<TypeId, Arc<CompoundBinding>>,
    slots: DashMap<TypeId, Arc<Mutex<()>>>,
    next_id: AtomicU32,
    /// First identifier outside the compound range.
    limit: u32,
    log: Logger,
}

impl StructBinder {
    /// Binder allocating compound definition IDs from `ids`.
    pub fn new(native: Arc<dyn NativeService>, ids: Range<u32>, log: Logger) -> Self {
        Self {
            native,
            bindings: DashMap::new(),
            slots: DashMap::new(),
            next_id: AtomicU32::new(ids.start),
            limit: ids.end,
            log,
        }
    }

    fn allocate(&self) -> Result<DefinitionId> {
        self.next_id
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |next| {
                (next < self.limit).then_some(next + 1)
            })
            .map(DefinitionId)
            .map_err(|next| SimError::DefinitionIdsExhausted {
                next,
                limit: self.limit,
            })
    }

    /// Binding for `T`, registering it on first use.
    pub fn bind<T: SimStruct>(&self) -> Result<Arc<CompoundBinding>> {
        let key = TypeId::of::<T>();
        if let Some(hit) = self.bindings.get(&key) {
            return Ok(Arc::clone(hit.value()));
        }

        let slot = Arc::clone(self.slots.entry(key).or_default().value());
        let _turn = slot.lock();
        if let Some(hit) = self.bindings.get(&key) {
            return Ok(Arc::clone(hit.value()));
        }

        // Validation failures cost no identifier.
        let planned = CompoundBinding::plan::<T>(DefinitionId(0))?;
        let definition = self.allocate()?;
        let binding = Arc::new(CompoundBinding {
            definition,
            ..planned
        });

        if let Err(code) = self.native.clear_definition(definition) {
            self.log.debug(format_args!(
                "clearing {} before binding {} failed: {}",
                definition, T::TYPE_NAME, code
            ));
        }
        for field in &binding.fields {
            let schema = &field.schema;
            self.native
                .add_to_definition(definition, &schema.name, &schema.unit, schema.data_type)
                .map_err(|code| SimError::native("AddToDataDefinition", code))?;
        }

        self.log.debug(format_args!(
            "bound {} as {} ({} fields, {} bytes)",
            T::TYPE_NAME,
            definition,
            binding.fields.len(),
            binding.size
        ));
        self.bindings.insert(key, Arc::clone(&binding));
        self.slots.remove(&key);
        Ok(binding)
    }

    /// Cached binding for `T`, if bound.
    pub fn get<T: SimStruct>(&self) -> Option<Arc<CompoundBinding>> {
        self.bindings
            .get(&TypeId::of::<T>())
            .map(|hit| Arc::clone(hit.value()))
    }

    /// Forget every binding (connection teardown).
    pub fn invalidate(&self) {
        self.bindings.clear();
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl std::fmt::Debug for StructBinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructBinder")
            .field("bindings", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::LatLonAlt;
    use crate::native::mock::{CallKind, MockNative, NativeCall};
    use crate::native::HResult;

    crate::sim_struct! {
        #[derive(Debug, Clone, PartialEq)]
        struct Fix {
            #[sim("PLANE LATITUDE", "degrees", Float64, order = 1)]
            latitude: f64,
            #[sim("PLANE LONGITUDE", "degrees", Float64, order = 0)]
            longitude: f64,
        }
    }

    crate::sim_struct! {
        #[derive(Debug, Clone, PartialEq)]
        struct Mixed {
            #[sim("TITLE", "", FixedString(16))]
            title: String,
            #[sim("SIM ON GROUND", "bool", Int32, order = 5)]
            on_ground: bool,
            #[sim("STRUCT LATLONALT", "", LatLonAlt)]
            position: LatLonAlt,
            #[sim("TRANSPONDER CODE", "number", Int64, order = -1)]
            squawk: i64,
        }
    }

    crate::sim_struct! {
        struct Narrowed {
            #[sim("PLANE LATITUDE", "degrees", Float64)]
            latitude: f32,
        }
    }

    crate::sim_struct! {
        struct Empty {}
    }

    fn binder(mock: &Arc<MockNative>) -> StructBinder {
        StructBinder::new(mock.clone(), 1..10_000, Logger::default())
    }

    #[test]
    fn explicit_order_sorts_fields() {
        let plan = CompoundBinding::plan::<Fix>(DefinitionId(1)).unwrap();
        let names: Vec<&str> = plan.fields.iter().map(|f| f.schema.name.as_str()).collect();
        assert_eq!(names, vec!["PLANE LONGITUDE", "PLANE LATITUDE"]);
        assert_eq!(plan.fields[1].offset, 8);
        assert_eq!(plan.size, 16);
    }

    #[test]
    fn unordered_fields_follow_ordered_in_declaration_order() {
        let plan = CompoundBinding::plan::<Mixed>(DefinitionId(1)).unwrap();
        let declared: Vec<usize> = plan.fields.iter().map(|f| f.declared).collect();
        assert_eq!(declared, vec![3, 1, 0, 2]);
        assert_eq!(plan.size, 8 + 4 + 16 + 24);
    }

    #[test]
    fn narrowed_field_rejected() {
        let err = CompoundBinding::plan::<Narrowed>(DefinitionId(1)).unwrap_err();
        match err {
            SimError::SchemaTypeMismatch {
                field,
                expected,
                found,
            } => {
                assert_eq!(field, "PLANE LATITUDE");
                assert_eq!(expected, DataType::Float64);
                assert_eq!(found, HostType::F32);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn empty_type_rejected() {
        assert!(matches!(
            CompoundBinding::plan::<Empty>(DefinitionId(1)),
            Err(SimError::NoAnnotatedFields("Empty"))
        ));
    }

    #[test]
    fn decode_and_encode_follow_binding_order() {
        let plan = CompoundBinding::plan::<Fix>(DefinitionId(1)).unwrap();
        let mut payload = Vec::new();
        payload.extend_from_slice(&(-122.3f64).to_le_bytes());
        payload.extend_from_slice(&47.6f64.to_le_bytes());

        let fix = Fix::from_values(plan.decode(&payload).unwrap()).unwrap();
        assert_eq!(
            fix,
            Fix {
                latitude: 47.6,
                longitude: -122.3
            }
        );
        assert_eq!(plan.encode(&fix.to_values()).unwrap(), payload);
    }

    #[test]
    fn short_payload_rejected() {
        let plan = CompoundBinding::plan::<Fix>(DefinitionId(1)).unwrap();
        assert!(matches!(
            plan.decode(&[0u8; 12]),
            Err(SimError::Truncated { need: 16, have: 12 })
        ));
    }

    #[test]
    fn bind_registers_once_in_order() {
        let mock = Arc::new(MockNative::new());
        let binder = binder(&mock);

        let first = binder.bind::<Fix>().unwrap();
        let second = binder.bind::<Fix>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.definition, DefinitionId(1));

        let calls = mock.calls();
        assert_eq!(calls.len(), 3);
        assert!(matches!(
            calls[0],
            NativeCall::ClearDefinition { definition } if definition == DefinitionId(1)
        ));
        let names: Vec<String> = calls[1..]
            .iter()
            .filter_map(|c| match c {
                NativeCall::AddToDefinition { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["PLANE LONGITUDE", "PLANE LATITUDE"]);
    }

    #[test]
    fn distinct_types_get_distinct_definitions() {
        let mock = Arc::new(MockNative::new());
        let binder = binder(&mock);
        let fix = binder.bind::<Fix>().unwrap();
        let mixed = binder.bind::<Mixed>().unwrap();
        assert_ne!(fix.definition, mixed.definition);
        assert_eq!(binder.len(), 2);
    }

    #[test]
    fn clear_failure_is_ignored() {
        let mock = Arc::new(MockNative::new());
        mock.fail_next(CallKind::ClearDefinition, HResult::FAIL);
        let binder = binder(&mock);
        assert!(binder.bind::<Fix>().is_ok());
    }

    #[test]
    fn registration_failure_is_not_cached() {
        let mock = Arc::new(MockNative::new());
        mock.fail_next(CallKind::AddToDefinition, HResult::FAIL);
        let binder = binder(&mock);

        assert!(matches!(
            binder.bind::<Fix>(),
            Err(SimError::NativeCallFailed { .. })
        ));
        assert!(binder.get::<Fix>().is_none());
        assert!(binder.bind::<Fix>().is_ok());
    }

    #[test]
    fn compound_ids_stop_below_scalar_range() {
        let mock = Arc::new(MockNative::new());
        let binder = StructBinder::new(mock.clone(), 9..10, Logger::default());
        assert_eq!(binder.bind::<Fix>().unwrap().definition, DefinitionId(9));

        let calls = mock.calls().len();
        assert!(matches!(
            binder.bind::<Mixed>(),
            Err(SimError::DefinitionIdsExhausted { next: 10, limit: 10 })
        ));
        assert_eq!(mock.calls().len(), calls);
        assert!(binder.bind::<Fix>().is_ok());
    }

    #[test]
    fn validation_failure_makes_no_native_call() {
        let mock = Arc::new(MockNative::new());
        let binder = binder(&mock);
        assert!(binder.bind::<Narrowed>().is_err());
        assert!(mock.calls().is_empty());
    }
}
