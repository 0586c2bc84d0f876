pub mod native_functions;
pub mod register_dispatch_key;
