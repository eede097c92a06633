pub mod check;
pub mod model;
