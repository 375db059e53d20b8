mod impls;
pub mod traits;
mod types;

pub use traits::Invoker;
pub use types::{
    CONFIRMATION,
    WskDeploy,
};
pub use impls::interpret;
