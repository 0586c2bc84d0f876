//! C++ binding layer: types, names and argument translation per calling convention.
pub mod cpp;
pub mod dispatcher;
pub mod native;
pub mod structured;
pub mod translate;
pub mod types;
