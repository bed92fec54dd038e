pub mod cpf;
pub mod logging;
pub mod retry;

pub use retry::RetryPolicy;
