//! CLI command implementations

pub mod cache;
pub mod config;
pub mod login;
pub mod logout;
pub mod status;
pub mod trips;
pub mod whoami;

pub use cache::execute as cache;
pub use config::execute as config;
pub use login::execute as login;
pub use logout::execute as logout;
pub use status::execute as status;
pub use trips::execute as trips;
pub use whoami::execute as whoami;
