//! Git access layer
//!
//! Everything that touches a repository on disk lives here. The rest of the
//! engine only sees [`HistorySource`] and the commit records it yields.
//!
//! # Example
//!
//! ```no_run
//! use gitfleet::git::{CommitParser, GitCli, HistorySource, LogRequest};
//! use std::path::Path;
//!
//! let source = GitCli::new();
//! let lines = source.open_log(Path::new("/path/to/repo"), &LogRequest::default()).unwrap();
//! for commit in CommitParser::new(lines) {
//!     println!("{:?}", commit.unwrap().hash);
//! }
//! ```

pub mod discovery;
pub mod history;
pub mod parser;

pub use discovery::{discover_repositories, RepoTarget};
pub use history::{GitCli, HeadCommit, HistorySource, LogLines, LogRequest};
pub use parser::CommitParser;
