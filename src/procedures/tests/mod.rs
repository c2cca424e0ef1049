mod common;

mod eligibility;
mod validity;
