//! lix-core - Domain types and pure logic for Norwegian readability analysis.
//!
//! No I/O and no async runtime dependency: parsing, metric kernels, analyzers,
//! the recommender, and the orchestrating readability service all live here.
//! Everything that touches the outside world (HTTP, cache, pub/sub, queue)
//! lives in the `lixd` daemon binary.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::module_name_repetitions)]

pub mod alternatives;
pub mod analyzers;
pub mod error;
pub mod fingerprint;
pub mod job;
pub mod metrics;
pub mod parser;
pub mod recommend;
pub mod service;
pub mod session;
pub mod syllables;
pub mod text;
pub mod util;

pub use analyzers::{Issue, SentenceAnalysis, Severity, WordAnalysis};
pub use error::{LixError, Result};
pub use fingerprint::Fingerprint;
pub use job::{BatchItem, BatchItemResult, BatchJob, JobHandle, JobId, JobStatus};
pub use metrics::{Band, Classification, MetricBundle, MetricScore};
pub use parser::{ParsedText, TextParser};
pub use recommend::{Impact, Recommendation, RecommenderInput, UserContext};
pub use service::{AnalysisRecord, AnalyzeOptions, BasicResult, Provenance, ReadabilityService, Statistics};
pub use session::{Admission, LoadSample, Session, SessionCache, SessionId};
pub use text::{SizeClass, Text};
