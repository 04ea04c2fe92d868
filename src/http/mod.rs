//! HTTP protocol layer module
//!
//! Response builders shared by the request pipeline and the built-in handlers.

pub mod response;

pub use response::{
    build_400_response, build_404_response, build_405_response, build_413_response,
    build_500_response, build_health_response, error_response, json_response,
};
