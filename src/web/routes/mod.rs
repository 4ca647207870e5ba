pub mod hugo;
pub mod index;
