// Streaming CommonMark-dialect block-structure parser.
//
// `parser::BlockParser` drives line-by-line continuation matching,
// container opening, and finalization over an arena-allocated tree of
// `node::AstNode`s. `parser::parse_document`/`parser::parse_file` are the
// one-shot convenience wrappers over a byte slice and a `Read` stream.

pub mod error;
pub mod headbody;
pub mod include;
pub mod inlines;
pub mod linebuffer;
pub mod node;
pub mod options;
pub mod parser;
pub mod position;
pub mod prepare;
pub mod refmap;
pub mod scanners;

pub use error::BlockTreeError;
pub use node::{
    Ast, AstNode, ListDelimiter, ListType, Node, NodeCodeBlock, NodeHeader, NodeList, NodeValue,
};
pub use options::ParserOptions;
pub use parser::{parse_document, parse_file, BlockParser};
pub use position::{Position, Range};
pub use refmap::{LinkReference, RefMap};
