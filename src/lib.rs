pub mod cpuset;
pub mod driver;
pub mod error;
pub mod process;
pub mod timerlat;
pub mod utils;

pub mod prelude {
    pub use super::cpuset::prelude::*;
    pub use super::driver::prelude::*;
    pub use super::error::LoadError;
    pub use super::process::prelude::*;
    pub use super::timerlat::prelude::*;
    pub use super::utils::prelude::*;
}
