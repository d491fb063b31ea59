//! Tag-based deployment targeting.
//!
//! The deploy stage never holds a reference to a host. Instead:
//!
//! 1. the [`HostRegistry`] maps host id → [`TagSet`], and
//! 2. [`select_targets`] turns a [`TagSelector`] into the set of host ids
//!    that currently match it.
//!
//! Both steps are independent of provisioning and can be tested alone.

mod group;
mod registry;
mod selector;
mod tags;

pub use group::DeploymentGroup;
pub use registry::{select_targets, HostRecord, HostRegistry};
pub use selector::TagSelector;
pub use tags::TagSet;
