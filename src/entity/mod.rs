//! SeaORM entity definitions

pub mod key;
