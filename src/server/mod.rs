pub mod query_api;

pub use query_api::{QueryService, ViewProducer, ViewQuery};
