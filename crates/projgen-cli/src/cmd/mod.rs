pub mod build;
pub mod extract;
pub mod init;
pub mod projects;
pub mod serve;
