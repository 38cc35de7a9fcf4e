pub mod conflict;
pub mod derived;
pub mod range_expansion;
