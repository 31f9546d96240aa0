pub mod credentials;
pub mod documents;
pub mod metrics;
pub mod retrieval;
