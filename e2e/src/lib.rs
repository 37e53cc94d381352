pub mod domain;
pub mod util;
