pub mod design;
pub mod diagnostics;
pub mod distributions;
pub mod ols;
pub mod summary;
