//! verity: a question-answering service that cross-checks a creative model
//! against a web-grounded model and synthesizes a corrected final answer.

pub mod api;
pub mod config;
pub mod domains;
pub mod error;
pub mod pipeline;
pub mod providers;
pub mod search;
pub mod service;
pub mod store;
pub mod types;

pub use config::{AppConfig, load_config};
pub use domains::DomainRegistry;
pub use error::{Result, VerityError};
pub use pipeline::Pipeline;
pub use service::QueryService;
pub use store::ChatStore;
pub use types::{Chat, Message, MessageRole, QueryResult, SearchHit};
