pub mod config;
pub mod console;
pub mod research_service;
pub mod submitter;

pub use config::Config;
pub use research_service::{
    QueryRequest, QueryResponse, RequestFailed, ResearchBackend, ResearchServiceClient,
};
pub use submitter::{QuerySubmitter, Submission, ViewState};
