pub mod calculator;
pub mod pricing;
