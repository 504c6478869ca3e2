//! Opaque API generator.
//!
//! A descriptor set plus a [`GenerateConfig`] yields a [`Surface`]: one table
//! of typed routines per message and enum (`order_get_id`,
//! `order_add_lines`, `status_from_string`, ...). The surface is rendered as
//! MySQL stored functions by [`sql`] or executed in process by
//! [`OpaqueApi`]. [`plugin`] speaks the protoc plugin protocol.

pub mod config;
pub mod error;
pub mod naming;
pub mod opaque;
pub mod plugin;
pub mod sql;
pub mod surface;

pub use config::GenerateConfig;
pub use error::{CodegenError, Result};
pub use opaque::OpaqueApi;
pub use sql::GeneratedFile;
pub use surface::Surface;

use protosql_descriptor::DescriptorIndex;

/// Builds the surface for `files` and renders it as SQL.
pub fn generate(
    index: &DescriptorIndex,
    files: &[String],
    config: &GenerateConfig,
) -> Result<Vec<GeneratedFile>> {
    let surface = Surface::build(index, files, config)?;
    sql::render(index, &surface)
}
