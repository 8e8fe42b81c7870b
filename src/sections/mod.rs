//! Page sections: kinds, length policies and the length validator.

pub mod policy;
pub mod validator;

pub use policy::{
    default_policies, default_policy, landing_policies, FaqEntry, HighlightBlock, SectionBody,
    SectionKey, SectionPolicy, SectionShape, DEFAULT_POLICIES, LANDING_POLICIES,
};
pub use validator::{check_body, validate, word_count, LengthCheck, LengthIssue, LengthStatus};
