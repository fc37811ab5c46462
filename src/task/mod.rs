pub mod config;
pub mod error;
pub mod interface;
pub mod lock;
pub mod manager;
pub mod record;
pub mod scheduler;
pub mod status;
pub mod types;
pub mod work;


pub use config::*;
pub use error::*;
pub use interface::*;
pub use lock::*;
pub use manager::*;
pub use record::*;
pub use scheduler::*;
pub use status::*;
pub use types::*;
pub use work::*;
