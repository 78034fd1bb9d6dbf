mod portfolio;
mod quote;
mod sector;
mod user;

pub use portfolio::*;
pub use quote::*;
pub use sector::*;
pub use user::*;
