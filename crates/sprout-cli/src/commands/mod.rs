pub mod fragments;
pub mod grow;
