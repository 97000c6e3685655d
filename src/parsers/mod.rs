pub mod fields;
pub mod html;

pub use fields::FieldCoercion;
