#[allow(clippy::module_inception)]
pub mod server;
pub mod token_routes;
