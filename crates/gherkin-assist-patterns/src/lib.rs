//! Step-definition pattern compilation for gherkin-assist.
//!
//! The crate turns the two pattern syntaxes found in glue code (regular
//! expressions and typed expressions such as `I have {int} cucumber(s)`) into
//! a common compiled form with three matchers: exact, placeholder-tolerant for
//! unresolved scenario-outline steps, and relaxed for content-assist ranking.
//! It also provides the scenario-outline placeholder helpers and the
//! specificity score used to order competing matches.

mod capture;
mod errors;
mod kind;
mod literal;
mod outline;
mod parameter;
mod pattern;
mod specificity;

pub use capture::{StepArgument, extract_arguments};
pub use errors::{ExpressionErrorInfo, PatternError};
pub use kind::PatternKind;
pub use outline::{has_placeholders, placeholder_names, substitute_placeholders};
pub use parameter::parameter_type_pattern;
pub use pattern::{
    CompiledPattern, PLACEHOLDER_TOKEN, build_regex_from_expression, tolerate_placeholders,
};
pub use specificity::SpecificityScore;
