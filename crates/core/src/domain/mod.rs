pub mod document;
pub mod line_item;
pub mod order;
pub mod quote;
