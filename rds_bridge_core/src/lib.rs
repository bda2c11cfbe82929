pub mod client;
pub mod collector;
pub mod exposition;
pub mod query;
pub mod rds;

pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_owned()
}
