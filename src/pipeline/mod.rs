//! Pipeline construction.
//!
//! Everything DAT writes to the host graph goes through a buffer of edits
//! that is committed as one version:
//!
//! ```text
//! [Variable buffer] ──materialize──► dat-var-<name>  (child of dat-vars)
//!
//! [Plot template] ─┐
//! [Variable a]  ───┼──compile──► recipe pipeline  (child of the root version)
//! [Variable b]  ───┘
//! ```
//!
//! # Design
//!
//! - **Buffered edits** - [`PipelineGenerator`] mints ids eagerly but only
//!   touches the store on commit.
//! - **Copy, never share** - plots and variables are copied into each recipe
//!   pipeline with fresh ids.
//! - **Sockets** - a plot's InputPort modules name its parameters; they are
//!   replaced by connections from the bound variables.

pub mod compiler;
pub mod generator;
pub mod recipe;

pub use compiler::RecipeCompiler;
pub use generator::PipelineGenerator;
pub use recipe::{expand_package_dir, Plot, PlotPort, Recipe};
