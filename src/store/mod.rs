pub mod http;
pub mod local;

pub use http::HttpDocumentStore;
pub use local::SqliteDocumentStore;

use async_trait::async_trait;

use crate::{error::Result, plan::RawPlan};

/// The durable owner of plan documents and course statuses.
///
/// Implementations return plan payloads in wire form; callers normalize.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Hand raw source (a PDF) to the store for extraction.
    async fn upload_pdf(&self, file_name: &str, bytes: Vec<u8>) -> Result<RawPlan>;

    /// Store an already-structured plan, bypassing extraction.
    async fn upload_plan(&self, plan: &RawPlan) -> Result<RawPlan>;

    async fn fetch(&self, doc_id: &str) -> Result<RawPlan>;

    async fn fetch_by_name(&self, name: &str) -> Result<RawPlan>;

    async fn rename(&self, doc_id: &str, name: &str) -> Result<()>;

    /// Setting the same value twice is a no-op.
    async fn set_course_status(&self, doc_id: &str, code: &str, passed: bool) -> Result<()>;
}
