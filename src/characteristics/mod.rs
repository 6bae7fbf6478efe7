//! EAV characteristics: group trees, preset values, templates and the facts that attach
//! them to products.
//!
//! - [`store`] loads flat rows.
//! - [`hierarchy`] turns self-referencing rows into an ordered forest.
//! - [`resolver`] derives a display string per fact.
//! - [`aggregate`] nests resolved facts into sections and groups.
//! - [`guard`] and [`cascade`] protect the tree on re-parent and delete.

pub mod aggregate;
pub mod cascade;
pub mod guard;
pub mod hierarchy;
pub mod resolver;
pub mod store;

pub use aggregate::{by_group, by_section, GroupBucket, Section, SectionIndex};
pub use cascade::{delete_group, DeleteBlocked, DeleteOutcome, DeletePolicy};
pub use guard::{check_reparent, ReparentViolation};
pub use hierarchy::{build_forest, HierarchyNode, TreeRow};
pub use resolver::{resolve, resolve_all, FactRow, InputType, Locale, ResolvedCharacteristic};
