pub mod policy_file;
pub mod safety;

pub use policy_file::{PatternRule, SafetyPolicy, SafetyPolicyError};
pub use safety::{SafetyClassifier, Severity};
