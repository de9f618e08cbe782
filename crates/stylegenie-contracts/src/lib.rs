pub mod catalog;
pub mod endpoints;
pub mod events;
pub mod form;
pub mod outfits;
pub mod preferences;
pub mod upload;
pub mod validation;
