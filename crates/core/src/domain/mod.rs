pub mod participant;
pub mod selection;
