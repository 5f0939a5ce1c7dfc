//! Host-supplied extension points.
//!
//! Extensions are pre-constructed capability objects handed to the
//! repository at construction; there is no runtime lookup by name.

use std::sync::Arc;

use crate::error::Result;
use crate::package::{Package, PackageIndex};
use crate::space::ContentSpace;
use crate::storage::Content;

/// An observer of repository lifecycle events.
///
/// Registration is idempotent by name; the first registration sees the
/// packages installed so far through `init`, and every package that enters
/// the repository afterwards is announced through `install`.
pub trait Extension: Send + Sync {
    fn name(&self) -> &str;

    /// Called once, when the extension is first registered.
    fn init(&self, packages: &PackageIndex) -> Result<()>;

    /// Called for every package that enters the repository, whether freshly
    /// installed or loaded from storage.
    fn install(&self, packages: &PackageIndex, pkg: &Arc<Package>) -> Result<()>;
}

/// A per-package metadata sidecar contributed by an extension.
///
/// A package holds at most one sidecar per name. Sidecars get the first
/// shot at resolving an href before the package's own declared mappings.
pub trait PackageInfo: Send + Sync {
    fn name(&self) -> &str;

    /// Resolve an href in this sidecar, or report absence with `Ok(None)`.
    fn resolve(&self, href: &str, space: ContentSpace) -> Result<Option<Content>>;
}
