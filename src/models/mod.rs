pub mod ai;
pub mod indicator;
pub mod news;
pub mod settings;
