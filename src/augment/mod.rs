//! Label-preserving substitution of words in aspect-annotated sentences.
//!
//! The pieces are small and composable: a [`SpanLocator`] finds the target
//! inside a tokenized sentence, a selector turns a policy into a
//! [`SubstitutionPlan`], the [`SubstitutionEngine`] queries a [`MaskOracle`]
//! for every predicted position and [`restore_placeholders`] puts `$T$` back.
//! [`Augmenter`] wires them together per [`Policy`].

pub mod engine;
pub mod locator;
pub mod oracle;
pub mod policy;
pub mod selector;
pub mod similarity;
pub mod span;
pub mod tagger;

pub use engine::{reassemble, restore_placeholders, SubstitutionEngine};
pub use locator::{SlidingWindowLocator, SpanLocator};
pub use oracle::{MaskOracle, MaskRequest, Prediction};
pub use policy::{Augmenter, Policy};
pub use selector::{Action, SubstitutionPlan};
pub use span::{LocatedTarget, Span};
pub use tagger::{Pos, PosTagger, Token};
