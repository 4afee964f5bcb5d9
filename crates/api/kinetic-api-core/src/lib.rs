//! kinetic-api-core: property values, shapes and interpolation math (engine-agnostic)

pub mod interp;
pub mod json;
pub mod shape;
pub mod value;

pub use interp::{add_values, lerp_value};
pub use shape::{ensure_same_shape, overlay, project, Field, Shape, ShapeError};
pub use value::{Value, ValueKind};
