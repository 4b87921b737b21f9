pub mod profile;
pub mod session;
pub mod workout;

#[cfg(test)]
mod tests;

pub use profile::*;
pub use session::*;
pub use workout::*;
