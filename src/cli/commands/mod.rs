mod init;
mod seed;
mod superuser;

pub use init::cmd_init;
pub use seed::cmd_seed;
pub use superuser::cmd_create_superuser;
