pub mod links;
pub mod ui;
