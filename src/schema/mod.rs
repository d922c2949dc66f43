//! Field accessor layer.
//!
//! Resource kinds describe their attributes with static [`ResourceSchema`]
//! tables. Declarations are converted into typed [`Attributes`], held in a
//! [`ResourceData`] handle during a lifecycle call, and copied into API
//! option structs by the `assign_*` helpers.

pub mod assign;
pub mod convert;
pub mod data;
pub mod field;
pub mod value;

pub use assign::{assign_enum, assign_set, assign_string};
pub use convert::{declared_attributes, field_diagnostic};
pub use data::{InstanceState, ResourceData};
pub use field::{
    FieldKind, FieldMode, FieldSchema, Operation, PORT_NUMBER, ResourceSchema, SetSchema, Timeouts,
};
pub use value::{Attributes, FieldSet, SetElement, Value};
