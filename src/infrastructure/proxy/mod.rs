pub mod file_switcher;

pub use file_switcher::FileTrafficSwitcher;
