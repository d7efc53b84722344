//! cwe-graph library - weakness graph assembly
//!
//! Turns the flat record stream produced by `cwe-fetch` into one canonical
//! node per identifier, with every relationship navigable from both ends.

pub mod assembler;
pub mod entry;
pub mod error;
pub mod fields;
pub mod output;

pub use assembler::{assemble, AssemblyStats, GraphAssembler};
pub use entry::GraphEntry;
pub use error::{GraphError, GraphResult};
pub use output::{write_graph, WriteMode, WriteSummary};

#[cfg(test)]
mod tests {
    #[test]
    fn test_build_info_is_emitted() {
        assert!(!env!("GIT_HASH").is_empty());
        assert!(env!("BUILD_TIMESTAMP").ends_with('Z'));
        assert!(!env!("BUILD_PROFILE").is_empty());
    }
}
