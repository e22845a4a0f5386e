pub mod bounded;
pub mod lambda;
