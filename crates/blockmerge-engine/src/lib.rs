//! # blockmerge-engine
//!
//! Merges the top-level blocks of several VEXcode project files into one
//! destination project.
//!
//! A project file is a single-line JSON record whose `workspace` field holds
//! an XML document. The direct `block` children of that document's root (in
//! the XHTML namespace) are the units being merged; each is identified by its
//! `id` attribute.
//!
//! ## Merge rules
//!
//! 1. Blocks are gathered from every module file, in discovery order.
//! 2. A destination block whose id is supplied again by a module is removed.
//! 3. Module blocks are appended after the remaining destination blocks. When
//!    two module blocks share an id, the first one wins and the later one is
//!    reported as a dropped duplicate.
//!
//! ## Example
//!
//! ```rust
//! use blockmerge_engine::{markup, reconcile};
//!
//! let baseline = markup::extract_blocks(
//!     r#"<xml xmlns="http://www.w3.org/1999/xhtml"><block id="x" v="old"/></xml>"#,
//! ).unwrap();
//! let incoming = markup::extract_blocks(
//!     r#"<xml xmlns="http://www.w3.org/1999/xhtml"><block id="x" v="new"/></xml>"#,
//! ).unwrap();
//!
//! let outcome = reconcile::reconcile(&baseline, &incoming).unwrap();
//! let merged = outcome.merged();
//! assert_eq!(merged.len(), 1);
//! assert_eq!(merged[0].attribute("v"), Some("new"));
//! ```

pub mod block;
pub mod codec;
pub mod engine;
pub mod identity;
pub mod markup;
pub mod reconcile;

pub use block::Block;
pub use engine::{run_merge, MergeEngine, MergeOptions, MergeReport, SourceSummary};
pub use markup::{MarkupError, Workspace, XHTML_NS};
pub use reconcile::{reconcile, Reconciliation};
