mod common;
mod session;
mod upload;
