pub mod dispatch_key;
pub mod native_function;
pub mod schema;
pub mod types;
