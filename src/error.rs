//! Error type shared by the graph builders and the layout engines.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("invalid vertex id {vertex} (graph has {vertex_count} vertices)")]
    InvalidVertex { vertex: usize, vertex_count: usize },

    #[error("position buffer holds {actual} entries but the graph has {expected} vertices")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("self-loop on vertex {vertex}")]
    SelfLoop { vertex: usize },

    #[error("edge {from}-{to} references a vertex outside 0..{vertex_count}")]
    EdgeOutOfRange {
        from: usize,
        to: usize,
        vertex_count: usize,
    },

    #[error("vertex {neighbor} is adjacent to {vertex} but not the other way around")]
    AsymmetricAdjacency { vertex: usize, neighbor: usize },

    #[error("fixed-vertex support is disabled for this engine")]
    PinningDisabled,

    #[error("unknown layout method {0:?} (expected \"force\" or \"energy\")")]
    UnknownMethod(String),

    #[error("this session runs the {running} engine")]
    WrongEngine { running: String },
}

pub type Result<T> = std::result::Result<T, Error>;
