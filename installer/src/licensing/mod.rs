pub mod edition;
pub mod serial;
