pub mod config;
pub mod history;
pub mod lookup;
pub mod registry;
pub mod rows;
pub mod template;
