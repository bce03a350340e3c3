pub mod prelude {
    pub use super::policy::prelude::*;
}

pub mod policy;
