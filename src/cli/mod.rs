mod dispatch;
mod sweep;
mod vectorize;

pub use dispatch::*;
pub use sweep::*;
pub use vectorize::*;

use crate::config::Opts;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}
