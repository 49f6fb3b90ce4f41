pub mod news_cmd;
pub mod report_cmd;
