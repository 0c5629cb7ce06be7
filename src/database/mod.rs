pub mod retrieval;

pub use retrieval::{Retrieve, ToolRetriever};
