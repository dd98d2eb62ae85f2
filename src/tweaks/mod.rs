//! Tweak Specification Module
//!
//! A tweaks template renders to YAML of the form:
//!
//! ```yaml
//! tweaks:
//! - selector:
//!     id: "12"
//!   changes:
//!     seed: 1234
//! - selector:
//!     name: "Positive Prompt"
//!   changes:
//!     text: a castle on a hill
//! ```
//!
//! # Structure
//!
//! - [`selector`]: [`Selector`] and [`Tweak`]
//! - [`spec`]: [`Tweaks`], rendering and regeneration

pub mod selector;
pub mod spec;

pub use selector::{Selector, Tweak};
pub use spec::{Tweaks, DEFAULT_TWEAKS_NAME};
