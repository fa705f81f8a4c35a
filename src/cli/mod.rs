pub mod config_cmd;
pub mod notify_cmd;
pub mod output;
pub mod renderer;
pub mod report_cmd;
pub mod serve_cmd;
pub mod update_cmd;
