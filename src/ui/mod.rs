pub mod app;
pub mod draw;
pub mod edit;
pub mod panes;
pub mod search_box;
pub mod table;
