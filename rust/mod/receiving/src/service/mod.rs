pub mod committer;
pub mod feed;
pub mod intake;
pub mod time_window;
